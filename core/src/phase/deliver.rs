//! Deliver Phase (spec §4.10): the terminal phase. Starts the session's
//! dev-server if anything was mutated, has the LLM summarize the turn,
//! folds the turn into project memory, and closes the stream.
//!
//! New from spec prose -- the teacher has no equivalent terminal
//! "wrap up and persist" step -- but follows `pm_analyze`/`plan`'s
//! generate-then-emit shape for the summary call.

use async_trait::async_trait;

use stream_event::{PhaseName, ProtocolEvent, Usage};
use workspace::{ARCHITECTURE, COMPONENTS, FILE_TREE};

use crate::llm::LlmMessage;
use crate::phase::{Phase, PhaseResult};
use crate::pipeline::PipelineContext;
use crate::PipelineError;

fn summary_prompt(ctx: &PipelineContext) -> String {
    let mut prompt = String::from(
        "Summarize this turn for the user in two or three sentences. Mention what changed, \
         not how it works internally.\n\n",
    );
    if !ctx.completed_file_actions.is_empty() {
        prompt.push_str("Files touched:\n");
        for action in &ctx.completed_file_actions {
            prompt.push_str(&format!("- {:?} {}\n", action.action, action.filepath));
        }
    }
    if !ctx.completed_git_actions.is_empty() {
        prompt.push_str("Terminal actions:\n");
        for action in &ctx.completed_git_actions {
            if let Some(command) = &action.command {
                prompt.push_str(&format!("- {command}\n"));
            }
        }
    }
    if ctx.repair_retry_count > 0 {
        prompt.push_str(&format!(
            "Repair ran {} time(s) to fix verification errors before this turn finished.\n",
            ctx.repair_retry_count
        ));
    }
    prompt
}

fn architecture_paragraph(ctx: &PipelineContext) -> Option<String> {
    let plan = ctx.plan.as_ref()?;
    if plan.file_touching_count() == 0 {
        return None;
    }
    let title = plan.title.clone().unwrap_or_else(|| "This project".to_string());
    Some(format!("{title}. {}", plan.reasoning))
}

pub struct DeliverPhase;

#[async_trait]
impl Phase for DeliverPhase {
    fn name(&self) -> &str {
        "deliver"
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<PhaseResult, PipelineError> {
        let mutated = ctx
            .plan
            .as_ref()
            .map(|plan| plan.file_touching_count() > 0)
            .unwrap_or(false);

        if mutated {
            let handle = ctx.deps.dev_servers.lease(&ctx.session_id);
            ctx.events.emit(ProtocolEvent::Preview {
                url: format!("http://localhost:{}", handle.port),
            });
        }

        ctx.events.phase(PhaseName::Summary);
        let system = "You write short, plain-language summaries of what an AI coding agent just did.";
        let history = vec![LlmMessage {
            role: "user".to_string(),
            content: summary_prompt(ctx),
        }];
        let summary = ctx
            .deps
            .llm
            .generate_text(system, &history)
            .await
            .map_err(|e| PipelineError::Provider(e.to_string()))?;
        ctx.events.emit(ProtocolEvent::Summary {
            text: summary.clone(),
            agent: None,
        });

        if let Some(paragraph) = architecture_paragraph(ctx) {
            ctx.memory.update(ARCHITECTURE, paragraph);
        }
        for action in &ctx.completed_file_actions {
            ctx.memory.append_line("Files Modified This Turn", &action.filepath);
        }
        if !ctx.existing_files.is_empty() {
            let mut files = ctx.existing_files.clone();
            files.sort();
            ctx.memory.update(FILE_TREE, files.join("\n"));
        }
        if ctx.memory.get(COMPONENTS).is_none() {
            ctx.memory.update(COMPONENTS, "");
        }

        let memory_path = ctx.workspace_dir.join("project_context.md");
        let _ = workspace::write_memory(memory_path, &ctx.memory).await;

        ctx.history.push(crate::pipeline::HistoryTurn {
            role: "assistant".to_string(),
            content: summary,
        });

        ctx.events.phase(PhaseName::Ready);
        ctx.events.emit(ProtocolEvent::Done {
            usage: Usage::default(),
            session_id: ctx.session_id.clone(),
        });
        ctx.events.close();

        Ok(PhaseResult::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn test_ctx(plan: Option<plan_spec::ExecutionPlan>) -> (PipelineContext, crate::events::EventBusReceiver) {
        let (bus, rx) = crate::events::EventBus::new();
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(workspace::Store::new(root.into_path()));
        let deps = crate::pipeline::PipelineDeps {
            store: store.clone(),
            serializer: Arc::new(workspace::PerFileSerializer::new()),
            llm: Arc::new(crate::llm::MockLlmProvider::with_text("Added a login form.")),
            policy: config::PolicyConfig::default(),
            dev_servers: Arc::new(crate::dev_server::DevServerRegistry::default()),
        };
        let mut ctx = PipelineContext::new(deps, bus, "s1".to_string(), store.session_dir("s1"), true, vec![]);
        ctx.plan = plan;
        (ctx, rx)
    }

    #[tokio::test]
    async fn mutated_plan_emits_preview_before_summary() {
        let (mut ctx, mut rx) = test_ctx(Some(plan_spec::ExecutionPlan {
            tasks: vec![plan_spec::Task::CreateFile {
                filepath: "src/App.tsx".to_string(),
                prompt: "make the app".to_string(),
                depends_on: None,
                feeds_into: None,
            }],
            ..Default::default()
        }));
        DeliverPhase.execute(&mut ctx).await.unwrap();
        let first = rx.rx.recv().await.unwrap();
        assert!(matches!(first, ProtocolEvent::Preview { .. }));
    }

    #[tokio::test]
    async fn chat_only_plan_skips_preview() {
        let (mut ctx, mut rx) = test_ctx(Some(plan_spec::ExecutionPlan {
            tasks: vec![plan_spec::Task::Chat { content: "hi".to_string() }],
            ..Default::default()
        }));
        DeliverPhase.execute(&mut ctx).await.unwrap();
        let first = rx.rx.recv().await.unwrap();
        assert!(matches!(first, ProtocolEvent::Phase { phase: PhaseName::Summary, .. }));
    }

    #[tokio::test]
    async fn summary_and_done_are_emitted_and_bus_closes() {
        let (mut ctx, mut rx) = test_ctx(None);
        DeliverPhase.execute(&mut ctx).await.unwrap();
        let mut saw_summary = false;
        let mut saw_done = false;
        while let Ok(event) = rx.rx.try_recv() {
            match event {
                ProtocolEvent::Summary { text, .. } => {
                    assert_eq!(text, "Added a login form.");
                    saw_summary = true;
                }
                ProtocolEvent::Done { .. } => saw_done = true,
                _ => {}
            }
        }
        assert!(saw_summary);
        assert!(saw_done);
        assert!(!ctx.events.is_active());
    }

    #[tokio::test]
    async fn repeated_lease_for_same_session_returns_same_port() {
        let (mut ctx, _rx) = test_ctx(Some(plan_spec::ExecutionPlan {
            tasks: vec![plan_spec::Task::CreateFile {
                filepath: "src/App.tsx".to_string(),
                prompt: "x".to_string(),
                depends_on: None,
                feeds_into: None,
            }],
            ..Default::default()
        }));
        let first = ctx.deps.dev_servers.lease(&ctx.session_id);
        DeliverPhase.execute(&mut ctx).await.unwrap();
        let second = ctx.deps.dev_servers.lease(&ctx.session_id);
        assert_eq!(first.port, second.port);
    }

    #[tokio::test]
    async fn final_assistant_turn_is_appended_to_history() {
        let (mut ctx, _rx) = test_ctx(None);
        let before = ctx.history.len();
        DeliverPhase.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.history.len(), before + 1);
        assert_eq!(ctx.history.last().unwrap().role, "assistant");
    }
}
