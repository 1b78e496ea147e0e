//! Execute Phase (spec §4.7): concurrently dispatches the plan's
//! code-mutating tasks with per-file serialization, bounded concurrency,
//! and deterministic ordering for the UI.
//!
//! Grounded on the teacher's worker-pool pattern for parallel node
//! execution (`loom/src/graph/runtime.rs`'s fan-out over ready nodes),
//! adapted to a fixed task list pulled through `futures::stream::
//! buffer_unordered` instead of a dependency-ready queue, since the
//! orchestrator's tasks (spec §9) don't yet enforce `depends_on` at
//! execution time.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;

use plan_spec::{FileAction, FileActionEvent, GitResultEvent, Task, TaskStatus, TransparencyTask};
use stream_event::{PhaseName, ProtocolEvent, TransparencyData};

use crate::executor::{Executor, ExecutorRequest};
use crate::events::EventBus;
use crate::phase::{Phase, PhaseResult};
use crate::pipeline::PipelineContext;
use crate::preflight;
use crate::subprocess::run_streaming_with_env;
use crate::PipelineError;

/// In-workspace file whose contents, if present, are injected as related-file
/// context into every code-generation call (spec §4.7/§4.8: the same file
/// Verify's design-consistency scan reads for its hex palette).
pub(crate) const THEME_FILE: &str = "design-tokens.json";

const CODE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];
const GIT_DENYLIST: &[char] = &[';', '|', '$', '<', '>'];
const SHORT_IMAGE_PROMPT_WORDS: usize = 5;
const IMAGE_QUALITY_SUFFIX: &str = ", high quality, detailed, professional, well-lit";

enum TaskOutcome {
    File(FileActionEvent),
    Git(GitResultEvent),
}

pub struct ExecutePhase;

#[async_trait]
impl Phase for ExecutePhase {
    fn name(&self) -> &str {
        "execute"
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<PhaseResult, PipelineError> {
        ctx.events.phase(PhaseName::Executing);

        let plan = ctx.plan.clone().ok_or_else(|| PipelineError::Aborted {
            phase: self.name().to_string(),
            reason: "no plan in context".to_string(),
        })?;

        let theme_content = ctx.deps.store.read_file(&ctx.session_id, THEME_FILE).await.ok();

        let transparency: Vec<TransparencyTask> = plan
            .non_chat_tasks()
            .enumerate()
            .map(|(i, (plan_index, task))| TransparencyTask::new(format!("task-{i}"), task.describe(), plan_index))
            .collect();
        ctx.events.emit(ProtocolEvent::Transparency {
            data: TransparencyData { tasks: transparency.clone() },
        });

        for task in &plan.tasks {
            if let Task::Chat { content } = task {
                ctx.events.delta(content.clone());
            }
        }

        let mutating: Vec<(String, Task)> = transparency
            .iter()
            .map(|t| t.id.clone())
            .zip(plan.non_chat_tasks().map(|(_, task)| task.clone()))
            .collect();

        for (id, task) in &mutating {
            if let Some(filepath) = task.filepath() {
                let action = placeholder_action(task);
                let prompt = task_prompt(task);
                ctx.events.emit(ProtocolEvent::FileAction(FileActionEvent::placeholder(
                    id.clone(),
                    filepath,
                    action,
                    prompt,
                )));
            }
        }

        let code_gen_total = mutating
            .iter()
            .filter(|(_, t)| matches!(t, Task::CreateFile { .. } | Task::EditFile { .. }))
            .count();

        let transparency = Arc::new(Mutex::new(transparency));
        let existing_files: HashSet<String> = ctx.existing_files.iter().cloned().collect();
        let llm = ctx.deps.llm.clone();
        let executor = Arc::new(Executor::new(ctx.deps.llm.clone(), ctx.deps.policy.executor_timeout));

        let mut code_gen_index = 0usize;
        let tasks_with_position: Vec<(String, Task, usize)> = mutating
            .into_iter()
            .map(|(id, task)| {
                let position = if matches!(task, Task::CreateFile { .. } | Task::EditFile { .. }) {
                    code_gen_index += 1;
                    code_gen_index
                } else {
                    0
                };
                (id, task, position)
            })
            .collect();

        let outcomes: Vec<Option<TaskOutcome>> = stream::iter(tasks_with_position.into_iter().map(|(id, task, position)| {
            let events = ctx.events.clone();
            let store = ctx.deps.store.clone();
            let serializer = ctx.deps.serializer.clone();
            let executor = executor.clone();
            let llm = llm.clone();
            let transparency = transparency.clone();
            let existing_files = existing_files.clone();
            let theme_content = theme_content.clone();
            let session_id = ctx.session_id.clone();
            let workspace_dir = ctx.workspace_dir.clone();
            async move {
                advance_and_emit(&transparency, &events, &id, TaskStatus::InProgress).await;
                let outcome = run_task(
                    &id,
                    &task,
                    position,
                    code_gen_total,
                    &events,
                    &store,
                    &serializer,
                    &executor,
                    &llm,
                    &existing_files,
                    theme_content.as_deref(),
                    &session_id,
                    &workspace_dir,
                )
                .await;
                advance_and_emit(&transparency, &events, &id, TaskStatus::Done).await;
                outcome
            }
        }))
        .buffer_unordered(ctx.deps.policy.execute_concurrency)
        .collect()
        .await;

        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                TaskOutcome::File(event) => ctx.completed_file_actions.push(event),
                TaskOutcome::Git(event) => ctx.completed_git_actions.push(event),
            }
        }
        ctx.transparency_tasks = Arc::try_unwrap(transparency)
            .expect("all concurrent tasks finished before this point")
            .into_inner();

        Ok(PhaseResult::Continue)
    }
}

fn placeholder_action(task: &Task) -> FileAction {
    match task {
        Task::CreateFile { .. } | Task::GenerateImage { .. } => FileAction::Created,
        Task::EditFile { .. } => FileAction::Edited,
        Task::DeleteFile { .. } => FileAction::Deleted,
        Task::Chat { .. } | Task::GitAction { .. } => unreachable!("non-chat, non-git task always has a filepath"),
    }
}

fn task_prompt(task: &Task) -> Option<String> {
    match task {
        Task::CreateFile { prompt, .. } | Task::EditFile { prompt, .. } | Task::GenerateImage { prompt, .. } => {
            Some(prompt.clone())
        }
        Task::DeleteFile { .. } | Task::Chat { .. } | Task::GitAction { .. } => None,
    }
}

/// Advances `id`'s status in the shared transparency list and re-emits the
/// whole list, still ordered by plan index (spec §5 ordering guarantees).
async fn advance_and_emit(transparency: &Arc<Mutex<Vec<TransparencyTask>>>, events: &EventBus, id: &str, status: TaskStatus) {
    let snapshot = {
        let mut tasks = transparency.lock().await;
        if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
            task.advance(status);
        }
        tasks.clone()
    };
    events.emit(ProtocolEvent::Transparency {
        data: TransparencyData { tasks: snapshot },
    });
}

#[allow(clippy::too_many_arguments)]
async fn run_task(
    id: &str,
    task: &Task,
    position: usize,
    code_gen_total: usize,
    events: &EventBus,
    store: &Arc<workspace::Store>,
    serializer: &Arc<workspace::PerFileSerializer>,
    executor: &Arc<Executor>,
    llm: &Arc<dyn crate::llm::LLMProvider>,
    existing_files: &HashSet<String>,
    theme_content: Option<&str>,
    session_id: &str,
    workspace_dir: &std::path::Path,
) -> Option<TaskOutcome> {
    match task {
        Task::CreateFile { filepath, prompt, .. } => {
            let event = serializer
                .enqueue(filepath, || {
                    run_code_gen(
                        id,
                        filepath,
                        prompt,
                        None,
                        position,
                        code_gen_total,
                        events,
                        store,
                        executor,
                        existing_files,
                        theme_content,
                        session_id,
                        FileAction::Created,
                    )
                })
                .await;
            Some(TaskOutcome::File(event))
        }
        Task::EditFile { filepath, prompt, .. } => {
            let event = serializer
                .enqueue(filepath, || {
                    run_edit(
                        id,
                        filepath,
                        prompt,
                        position,
                        code_gen_total,
                        events,
                        store,
                        executor,
                        existing_files,
                        theme_content,
                        session_id,
                    )
                })
                .await;
            Some(TaskOutcome::File(event))
        }
        Task::DeleteFile { filepath } => {
            let _ = store.delete_file(session_id, filepath).await;
            let (filename, language) = plan_spec::filename_and_language(filepath);
            let event = FileActionEvent {
                id: id.to_string(),
                filepath: filepath.clone(),
                filename,
                language,
                action: FileAction::Deleted,
                content: String::new(),
                lines_added: 0,
                lines_removed: 0,
                diff: None,
                status: plan_spec::FileActionStatus::Complete,
                prompt: None,
            };
            events.emit(ProtocolEvent::FileAction(event.clone()));
            Some(TaskOutcome::File(event))
        }
        Task::GenerateImage { filepath, prompt } => {
            let enhanced = enhance_image_prompt(prompt);
            let result = llm.generate_image(&enhanced).await.map_err(|e| e.to_string());
            let (filename, language) = plan_spec::filename_and_language(filepath);
            let event = match result {
                Ok(bytes) => {
                    let _ = store.write_bytes(session_id, filepath, &bytes).await;
                    FileActionEvent {
                        id: id.to_string(),
                        filepath: filepath.clone(),
                        filename,
                        language,
                        action: FileAction::Created,
                        content: format!("![generated image]({filepath})"),
                        lines_added: 0,
                        lines_removed: 0,
                        diff: None,
                        status: plan_spec::FileActionStatus::Complete,
                        prompt: Some(prompt.clone()),
                    }
                }
                Err(err) => FileActionEvent {
                    id: id.to_string(),
                    filepath: filepath.clone(),
                    filename,
                    language,
                    action: FileAction::Created,
                    content: format!("[Image generation failed: {err}]"),
                    lines_added: 0,
                    lines_removed: 0,
                    diff: None,
                    status: plan_spec::FileActionStatus::Complete,
                    prompt: Some(prompt.clone()),
                },
            };
            events.emit(ProtocolEvent::FileAction(event.clone()));
            Some(TaskOutcome::File(event))
        }
        Task::GitAction { command } => {
            let index = 0; // plan index is irrelevant to the subprocess call; id already keys the event.
            let event = match validate_git_command(command) {
                Err(reason) => GitResultEvent::security_error(id, index, command, &reason),
                Ok(rewritten) => run_git_action(id, index, &rewritten, workspace_dir).await,
            };
            events.emit(ProtocolEvent::GitResult(event.clone()));
            Some(TaskOutcome::Git(event))
        }
        Task::Chat { .. } => None,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_code_gen(
    id: &str,
    filepath: &str,
    prompt: &str,
    prior_content: Option<&str>,
    position: usize,
    total: usize,
    events: &EventBus,
    store: &Arc<workspace::Store>,
    executor: &Arc<Executor>,
    existing_files: &HashSet<String>,
    theme_content: Option<&str>,
    session_id: &str,
    action: FileAction,
) -> FileActionEvent {
    events.emit(ProtocolEvent::Phase {
        phase: PhaseName::Executing,
        detail: Some(format!("Building {filepath} ({position} of {total})")),
        thought: None,
        elapsed_ms: None,
        agent: None,
    });

    let mut related_files = match prior_content {
        Some(source) => resolve_related_files(store, session_id, filepath, source, existing_files).await,
        None => BTreeMap::new(),
    };
    if let Some(theme) = theme_content {
        related_files.insert(THEME_FILE.to_string(), theme.to_string());
    }

    let file_manifest: Vec<String> = existing_files.iter().cloned().collect();
    let request = ExecutorRequest {
        session_id,
        filepath,
        prompt,
        file_manifest: &file_manifest,
        prior_content,
        related_files: &related_files,
        feedback: None,
    };

    let (filename, language) = plan_spec::filename_and_language(filepath);
    match executor.generate(request).await {
        Ok(content) => {
            let prior = store.write_file(session_id, filepath, &content).await.unwrap_or(None);
            let prior_text = prior.unwrap_or_default();
            let diff = workspace::unified_diff(filepath, &prior_text, &content);
            let (added, removed) = workspace::line_counts(&prior_text, &content);
            FileActionEvent {
                id: id.to_string(),
                filepath: filepath.to_string(),
                filename,
                language,
                action,
                content,
                lines_added: added,
                lines_removed: removed,
                diff: if diff.is_empty() { None } else { Some(diff) },
                status: plan_spec::FileActionStatus::Complete,
                prompt: Some(prompt.to_string()),
            }
        }
        Err(err) => FileActionEvent {
            id: id.to_string(),
            filepath: filepath.to_string(),
            filename,
            language,
            action,
            content: format!("[Execution failed: {err}]"),
            lines_added: 0,
            lines_removed: 0,
            diff: None,
            status: plan_spec::FileActionStatus::Complete,
            prompt: Some(prompt.to_string()),
        },
    }
    .tap_emit(events)
}

#[allow(clippy::too_many_arguments)]
async fn run_edit(
    id: &str,
    filepath: &str,
    prompt: &str,
    position: usize,
    total: usize,
    events: &EventBus,
    store: &Arc<workspace::Store>,
    executor: &Arc<Executor>,
    existing_files: &HashSet<String>,
    theme_content: Option<&str>,
    session_id: &str,
) -> FileActionEvent {
    let prior_content = store.read_file(session_id, filepath).await.ok();
    run_code_gen(
        id,
        filepath,
        prompt,
        prior_content.as_deref(),
        position,
        total,
        events,
        store,
        executor,
        existing_files,
        theme_content,
        session_id,
        FileAction::Edited,
    )
    .await
}

/// Resolves `source`'s relative imports against `existing_files`, keeping
/// only code siblings (spec §4.7: "resolve siblings (ts/tsx/js/jsx)").
async fn resolve_related_files(
    store: &Arc<workspace::Store>,
    session_id: &str,
    filepath: &str,
    source: &str,
    existing_files: &HashSet<String>,
) -> BTreeMap<String, String> {
    let base_dir = match filepath.rfind('/') {
        Some(idx) => &filepath[..idx],
        None => "",
    };
    let mut related = BTreeMap::new();
    for specifier in preflight::extract_specifiers(source) {
        if !preflight::is_relative(&specifier) {
            continue;
        }
        for candidate in preflight::relative_candidates(base_dir, &specifier) {
            let is_code = candidate
                .rsplit('.')
                .next()
                .map(|ext| CODE_EXTENSIONS.contains(&ext))
                .unwrap_or(false);
            if is_code && existing_files.contains(&candidate) {
                if let Ok(content) = store.read_file(session_id, &candidate).await {
                    related.insert(candidate, content);
                }
                break;
            }
        }
    }
    related
}

/// Appends fixed quality language to short, underspecified image prompts
/// (spec §4.7).
fn enhance_image_prompt(prompt: &str) -> String {
    if prompt.split_whitespace().count() < SHORT_IMAGE_PROMPT_WORDS {
        format!("{prompt}{IMAGE_QUALITY_SUFFIX}")
    } else {
        prompt.to_string()
    }
}

/// Validates a `git_action` command (spec §4.7): must start with the `git`
/// binary and contain none of the denylisted shell metacharacters. Rewrites
/// a bare `git push` to set an upstream, since a fresh session has none.
fn validate_git_command(command: &str) -> Result<String, String> {
    let trimmed = command.trim();
    if trimmed != "git" && !trimmed.starts_with("git ") {
        return Err("command must start with the git binary".to_string());
    }
    if let Some(bad) = trimmed.chars().find(|c| GIT_DENYLIST.contains(c)) {
        return Err(format!("disallowed character '{bad}'"));
    }
    Ok(if trimmed == "git push" {
        "git push -u origin HEAD".to_string()
    } else {
        trimmed.to_string()
    })
}

async fn run_git_action(id: &str, index: usize, command: &str, workspace_dir: &std::path::Path) -> GitResultEvent {
    let parts: Vec<&str> = command.split_whitespace().collect();
    let Some((program, args)) = parts.split_first() else {
        return GitResultEvent::security_error(id, index, command, "empty command");
    };
    let ceiling = workspace_dir.parent().map(|p| p.display().to_string()).unwrap_or_default();
    let output = run_streaming_with_env(
        program,
        args,
        workspace_dir,
        &[("GIT_CEILING_DIRECTORIES", ceiling.as_str())],
        std::time::Duration::from_secs(120),
        |_line| {},
    )
    .await;
    match output {
        Ok(out) if out.success() => GitResultEvent::ok(id, index, command, out.stdout),
        Ok(out) => GitResultEvent {
            id: id.to_string(),
            index,
            command: Some(command.to_string()),
            output: None,
            error: Some(if out.timed_out { "git command timed out".to_string() } else { out.stderr }),
            action: None,
        },
        Err(err) => GitResultEvent {
            id: id.to_string(),
            index,
            command: Some(command.to_string()),
            output: None,
            error: Some(err.to_string()),
            action: None,
        },
    }
}

trait TapEmit {
    fn tap_emit(self, events: &EventBus) -> Self;
}

impl TapEmit for FileActionEvent {
    fn tap_emit(self, events: &EventBus) -> Self {
        events.emit(ProtocolEvent::FileAction(self.clone()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_prompt_gets_quality_suffix() {
        let enhanced = enhance_image_prompt("a cat");
        assert!(enhanced.contains("high quality"));
    }

    #[test]
    fn detailed_prompt_is_left_alone() {
        let prompt = "a photorealistic orange tabby cat sitting on a sunlit windowsill";
        assert_eq!(enhance_image_prompt(prompt), prompt);
    }

    #[test]
    fn git_command_must_start_with_git() {
        assert!(validate_git_command("rm -rf /").is_err());
    }

    #[test]
    fn git_command_rejects_denylisted_characters() {
        assert!(validate_git_command("git status; rm -rf /").is_err());
    }

    #[test]
    fn bare_git_push_gets_an_upstream() {
        assert_eq!(validate_git_command("git push").unwrap(), "git push -u origin HEAD");
    }

    #[test]
    fn ordinary_git_command_passes_through() {
        assert_eq!(validate_git_command("git status").unwrap(), "git status");
    }

    #[tokio::test]
    async fn resolves_code_sibling_but_not_css() {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(workspace::Store::new(root.path().to_path_buf()));
        store.ensure("s1").await.unwrap();
        store.write_file("s1", "src/Button.tsx", "export function Button() {}").await.unwrap();
        store.write_file("s1", "src/styles.css", ".btn {}").await.unwrap();
        let existing: HashSet<String> = ["src/Button.tsx".to_string(), "src/styles.css".to_string()].into_iter().collect();
        let source = "import { Button } from './Button';\nimport './styles.css';";
        let related = resolve_related_files(&store, "s1", "src/App.tsx", source, &existing).await;
        assert!(related.contains_key("src/Button.tsx"));
        assert!(!related.contains_key("src/styles.css"));
    }

    #[tokio::test]
    async fn placeholder_then_complete_share_id() {
        let (bus, mut rx) = crate::events::EventBus::new();
        let task = Task::CreateFile {
            filepath: "src/Hello.tsx".to_string(),
            prompt: "make a hello component".to_string(),
            depends_on: None,
            feeds_into: None,
        };
        let placeholder = FileActionEvent::placeholder("task-0", task.filepath().unwrap(), placeholder_action(&task), task_prompt(&task));
        bus.emit(ProtocolEvent::FileAction(placeholder.clone()));
        drop(bus);
        let first = rx.rx.recv().await.unwrap();
        match first {
            ProtocolEvent::FileAction(event) => assert_eq!(event.id, "task-0"),
            _ => panic!("expected file_action"),
        }
    }
}
