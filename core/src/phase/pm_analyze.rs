//! PM-Analyze Phase (spec §4.4): optional product-manager planning gate
//! producing a `PmSpec` ahead of the execution-plan phase.

use async_trait::async_trait;

use plan_spec::PmSpec;
use stream_event::{MetadataData, PhaseName, ProtocolEvent};

use crate::llm::LlmMessage;
use crate::parsing::parse_json_lenient;
use crate::phase::understand::{CODEBASE_SUMMARY_KEY, INTENT_KEY, PROJECT_CONTEXT_KEY, THINKING_ANALYSIS_KEY};
use crate::phase::{Phase, PhaseResult};
use crate::pipeline::PipelineContext;
use crate::PipelineError;

const CONVERSATIONAL_ONLY_INTENTS: &[&str] = &["explain", "feedback"];

fn build_system_prompt(ctx: &PipelineContext) -> String {
    let mut prompt = String::from(
        "You are a product manager. Read the user's request and respond with JSON matching \
         {title, chat_message, requirements: [string], design: {theme, layout, typography, \
         key_interactions: [string]}, scope: {this_turn: [string], next_turn: [string]}, \
         suggestions: [string]}.\n\n",
    );
    if let Some(intent) = ctx.scratch_str(INTENT_KEY) {
        prompt.push_str(&format!("Classified intent: {intent}\n"));
    }
    if let Some(summary) = ctx.scratch_str(CODEBASE_SUMMARY_KEY) {
        prompt.push_str(&format!("Codebase summary:\n{summary}\n"));
    }
    if let Some(context) = ctx.scratch_str(PROJECT_CONTEXT_KEY) {
        if !context.is_empty() {
            prompt.push_str(&format!("Project memory:\n{context}\n"));
        }
    }
    if let Some(analysis) = ctx.scratch_str(THINKING_ANALYSIS_KEY) {
        prompt.push_str(&format!("Pre-analysis:\n{analysis}\n"));
    }
    prompt
}

fn design_brief_delta(spec: &PmSpec) -> String {
    let mut out = String::new();
    if !spec.chat_message.is_empty() {
        out.push_str(&spec.chat_message);
        out.push_str("\n\n");
    }
    if !spec.design.theme.is_empty() {
        out.push_str(&format!("**Theme:** {}\n", spec.design.theme));
    }
    if !spec.design.layout.is_empty() {
        out.push_str(&format!("**Layout:** {}\n", spec.design.layout));
    }
    if !spec.design.key_interactions.is_empty() {
        out.push_str(&format!("**Interactions:** {}\n", spec.design.key_interactions.join(", ")));
    }
    if !spec.scope.this_turn.is_empty() {
        out.push_str(&format!("**This turn:** {}\n", spec.scope.this_turn.join(", ")));
    }
    if !spec.scope.next_turn.is_empty() {
        out.push_str(&format!("**Next turn:** {}\n", spec.scope.next_turn.join(", ")));
    }
    if !spec.suggestions.is_empty() {
        out.push_str(&format!("**Suggestions:** {}\n", spec.suggestions.join(", ")));
    }
    out
}

pub struct PmAnalyzePhase;

#[async_trait]
impl Phase for PmAnalyzePhase {
    fn name(&self) -> &str {
        "pm_analyze"
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<PhaseResult, PipelineError> {
        let intent = ctx.scratch_str(INTENT_KEY).unwrap_or_else(|| "unknown".to_string());
        let has_attachments = ctx.messages.last().map(|m| !m.attachments.is_empty()).unwrap_or(false);
        if CONVERSATIONAL_ONLY_INTENTS.contains(&intent.as_str()) && !has_attachments {
            return Ok(PhaseResult::Skip);
        }

        ctx.events.emit(ProtocolEvent::AgentStart {
            agent: "pm".to_string(),
            name: "Product Manager".to_string(),
        });
        ctx.events.phase(PhaseName::Thinking);

        let system = build_system_prompt(ctx);
        let history = vec![LlmMessage {
            role: "user".to_string(),
            content: ctx.last_user_content().to_string(),
        }];
        let raw = ctx
            .deps
            .llm
            .generate_json(&system, &history)
            .await
            .map_err(|e| PipelineError::Provider(e.to_string()))?;

        let spec = match parse_json_lenient(&raw).and_then(serde_json::from_value::<PmSpec>) {
            Ok(spec) => spec,
            Err(_) => {
                ctx.events.delta(raw);
                ctx.events.emit(ProtocolEvent::AgentEnd { agent: "pm".to_string() });
                return Ok(PhaseResult::Continue);
            }
        };

        ctx.events.delta(design_brief_delta(&spec));
        if let Some(title) = spec.title.clone() {
            ctx.events.emit(ProtocolEvent::Metadata {
                data: MetadataData { title: Some(title) },
            });
        }
        ctx.events.emit(ProtocolEvent::AgentEnd { agent: "pm".to_string() });

        let is_conversational_only = spec.is_effectively_empty();
        ctx.pm_spec = Some(spec);

        if is_conversational_only {
            ctx.events.phase(PhaseName::Ready);
            ctx.events.emit(ProtocolEvent::Done {
                usage: stream_event::Usage::default(),
                session_id: ctx.session_id.clone(),
            });
            ctx.events.close();
            return Ok(PhaseResult::Abort {
                phase: self.name().to_string(),
                reason: "conversational-only PM spec".to_string(),
            });
        }

        Ok(PhaseResult::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn design_brief_includes_theme_and_scope() {
        let spec = PmSpec {
            chat_message: "Here's the plan.".to_string(),
            design: plan_spec::DesignSpec {
                theme: "dark".to_string(),
                ..Default::default()
            },
            scope: plan_spec::ScopeSpec {
                this_turn: vec!["nav bar".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        let brief = design_brief_delta(&spec);
        assert!(brief.contains("Here's the plan."));
        assert!(brief.contains("dark"));
        assert!(brief.contains("nav bar"));
    }
}
