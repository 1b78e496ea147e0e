//! Understand Phase (spec §4.3): intent classification, codebase survey,
//! and the extended-thinking priming call for Plan.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use stream_event::PhaseName;

use crate::llm::LlmMessage;
use crate::phase::{Phase, PhaseResult};
use crate::pipeline::PipelineContext;
use crate::PipelineError;

pub const INTENT_KEY: &str = "_intent";
pub const CODEBASE_SUMMARY_KEY: &str = "_codebaseSummary";
pub const PROJECT_CONTEXT_KEY: &str = "_projectContext";
pub const THINKING_ANALYSIS_KEY: &str = "_thinkingAnalysis";

/// Ordered intent groups (spec §4.3): declaration order is the tie-break
/// after match count, so this order matters.
static INTENT_GROUPS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("fix", Regex::new(r"(?i)\b(fix|bug|broken|error|crash|doesn't work|isn't working)\b").unwrap()),
        ("edit", Regex::new(r"(?i)\b(edit|update|change|modify|adjust|tweak)\b").unwrap()),
        ("create", Regex::new(r"(?i)\b(create|add|build|make|generate|new)\b").unwrap()),
        ("explain", Regex::new(r"(?i)\b(explain|what (is|does|are)|how does|why)\b").unwrap()),
        ("feedback", Regex::new(r"(?i)\b(feedback|thoughts|opinion|review this|what do you think)\b").unwrap()),
        ("refactor", Regex::new(r"(?i)\b(refactor|clean up|reorganize|restructure|simplify)\b").unwrap()),
        ("delete", Regex::new(r"(?i)\b(delete|remove|drop|get rid of)\b").unwrap()),
        ("git", Regex::new(r"(?i)\b(git|commit|push|branch|pull request|pr\b)\b").unwrap()),
    ]
});

const GENERATIVE_INTENTS: &[&str] = &["create", "edit", "fix", "refactor"];

/// Classifies `text` by ordered regex groups over the whole request: ties
/// are broken by match count then declaration order; no match yields
/// `"unknown"` (spec §4.3).
pub fn classify_intent(text: &str) -> &'static str {
    let mut best: Option<(&'static str, usize, usize)> = None;
    for (order, (name, regex)) in INTENT_GROUPS.iter().enumerate() {
        let count = regex.find_iter(text).count();
        if count == 0 {
            continue;
        }
        match &best {
            Some((_, best_count, best_order)) if count < *best_count || (count == *best_count && order >= *best_order) => {}
            _ => best = Some((name, count, order)),
        }
    }
    best.map(|(name, _, _)| name).unwrap_or("unknown")
}

/// Fixed clarifying prompt (spec §4.3 clarification gate / §8 scenario 2).
pub const CLARIFYING_PROMPT: &str = "I'd love to help! Could you tell me a bit more about what you'd like to build or change?";

fn group_by_directory(files: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for file in files {
        let dir = match file.rfind('/') {
            Some(idx) => &file[..idx],
            None => "",
        };
        groups.entry(dir.to_string()).or_default().push(file.clone());
    }
    groups
}

fn render_codebase_summary(files: &[String]) -> String {
    if files.is_empty() {
        return "The workspace is empty.".to_string();
    }
    let groups = group_by_directory(files);
    let mut out = String::new();
    for (dir, entries) in groups {
        let label = if dir.is_empty() { "(root)".to_string() } else { dir };
        out.push_str(&format!("{label}: {}\n", entries.join(", ")));
    }
    out
}

const THINKING_QUESTIONS: &[&str] = &[
    "What is the user's underlying intent beyond the literal request?",
    "What architecture/components does this require?",
    "What risks or edge cases should the plan account for?",
    "What premium touches would make this feel polished?",
];

pub struct UnderstandPhase;

#[async_trait]
impl Phase for UnderstandPhase {
    fn name(&self) -> &str {
        "understand"
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<PhaseResult, PipelineError> {
        ctx.events.phase(PhaseName::Thinking);

        let request = ctx.last_user_content().to_string();
        let intent = classify_intent(&request);

        let memory_path = ctx.workspace_dir.join("project_context.md");
        if let Ok(memory) = workspace::read_memory(memory_path).await {
            ctx.memory = memory;
        }
        let project_context = ctx.memory.to_prompt_section();
        let existing_files = ctx
            .deps
            .store
            .list_files(&ctx.session_id)
            .await
            .map_err(PipelineError::Workspace)?;
        ctx.existing_files = existing_files.clone();
        let codebase_summary = render_codebase_summary(&existing_files);

        let has_attachments = ctx.messages.last().map(|m| !m.attachments.is_empty()).unwrap_or(false);

        if GENERATIVE_INTENTS.contains(&intent) {
            let system = format!(
                "Answer these four questions about the user's request concisely.\n{}",
                THINKING_QUESTIONS.join("\n")
            );
            let history = vec![LlmMessage {
                role: "user".to_string(),
                content: request.clone(),
            }];
            let analysis = ctx
                .deps
                .llm
                .generate_text(&system, &history)
                .await
                .map_err(|e| PipelineError::Provider(e.to_string()))?;
            ctx.phase_thoughts.push(("understand".to_string(), analysis.clone()));
            ctx.set_scratch(THINKING_ANALYSIS_KEY, analysis);
        }

        // Clarification gate (spec §4.3): unknown intent + short request.
        if intent == "unknown" && !has_attachments && request.split_whitespace().count() < 6 {
            ctx.events.delta(CLARIFYING_PROMPT);
            ctx.events.phase(PhaseName::Ready);
            ctx.events.emit(stream_event::ProtocolEvent::Done {
                usage: stream_event::Usage::default(),
                session_id: ctx.session_id.clone(),
            });
            ctx.events.close();
            return Ok(PhaseResult::Abort {
                phase: self.name().to_string(),
                reason: "clarification requested".to_string(),
            });
        }

        ctx.set_scratch(INTENT_KEY, intent);
        ctx.set_scratch(CODEBASE_SUMMARY_KEY, codebase_summary);
        ctx.set_scratch(PROJECT_CONTEXT_KEY, project_context);

        Ok(PhaseResult::Continue)
    }
}
