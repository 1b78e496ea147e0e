//! Plan Phase (spec §4.5): builds the execution plan by calling the LLM
//! provider in JSON mode, installing dependencies if needed first.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};

use plan_spec::ExecutionPlan;
use stream_event::{PhaseName, ProtocolEvent};

use crate::llm::LlmMessage;
use crate::parsing::parse_json_lenient;
use crate::phase::understand::{CODEBASE_SUMMARY_KEY, INTENT_KEY, PROJECT_CONTEXT_KEY, THINKING_ANALYSIS_KEY};
use crate::phase::{Phase, PhaseResult};
use crate::pipeline::PipelineContext;
use crate::subprocess::run_streaming;
use crate::PipelineError;

const ORCHESTRATOR_TEMPLATE: &str = "You are a software orchestrator. Read the user's request and the \
context below, then respond with JSON matching {title?, reasoning, assumptions?, design_decisions?, \
tasks: [ {type: \"chat\", content} | {type: \"create_file\", filepath, prompt, depends_on?, feeds_into?} | \
{type: \"edit_file\", filepath, prompt, depends_on?, feeds_into?} | {type: \"delete_file\", filepath} | \
{type: \"generate_image\", filepath, prompt} | {type: \"git_action\", command} ] }.";

fn build_system_prompt(ctx: &PipelineContext) -> String {
    let mut prompt = String::from(ORCHESTRATOR_TEMPLATE);
    prompt.push_str("\n\nExisting files:\n");
    if ctx.existing_files.is_empty() {
        prompt.push_str("(none)\n");
    } else {
        for file in &ctx.existing_files {
            prompt.push_str(&format!("- {file}\n"));
        }
    }
    if let Some(memory) = ctx.scratch_str(PROJECT_CONTEXT_KEY) {
        if !memory.is_empty() {
            prompt.push_str(&format!("\nProject memory:\n{memory}\n"));
        }
    }
    if let Some(pm_spec) = &ctx.pm_spec {
        prompt.push_str(&format!("\nPM spec:\n{}\n", serde_json::to_string(pm_spec).unwrap_or_default()));
    }
    if let Some(intent) = ctx.scratch_str(INTENT_KEY) {
        prompt.push_str(&format!("\nIntent: {intent}\n"));
    }
    if let Some(summary) = ctx.scratch_str(CODEBASE_SUMMARY_KEY) {
        prompt.push_str(&format!("\nCodebase summary:\n{summary}\n"));
    }
    if let Some(analysis) = ctx.scratch_str(THINKING_ANALYSIS_KEY) {
        prompt.push_str(&format!("\nExtended-thinking analysis:\n{analysis}\n"));
    }
    prompt
}

pub struct PlanPhase;

#[async_trait]
impl Phase for PlanPhase {
    fn name(&self) -> &str {
        "plan"
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<PhaseResult, PipelineError> {
        ctx.events.phase(PhaseName::Planning);

        // Ambient type declarations for CSS/asset imports, created once.
        let env_decl_path = "src/vite-env.d.ts";
        if !ctx.existing_files.iter().any(|f| f == env_decl_path) {
            ctx.deps
                .store
                .write_file(&ctx.session_id, env_decl_path, "/// <reference types=\"vite/client\" />\n")
                .await
                .map_err(PipelineError::Workspace)?;
        }

        if !ctx.existing_files.iter().any(|f| f.starts_with("node_modules/")) {
            ctx.events.phase(PhaseName::Installing);
            let output = run_streaming(
                "npm",
                &["install"],
                &ctx.workspace_dir,
                ctx.deps.policy.install_timeout,
                |_line| {},
            )
            .await;
            let (result_output, error) = match output {
                Ok(out) if out.success() => (Some(out.stdout), None),
                Ok(out) => (None, Some(if out.timed_out { "npm install timed out".to_string() } else { out.stderr })),
                Err(e) => (None, Some(e.to_string())),
            };
            let event = match error {
                None => plan_spec::GitResultEvent::ok("install-0", 0, "npm install", result_output.unwrap_or_default()),
                Some(err) => plan_spec::GitResultEvent {
                    id: "install-0".to_string(),
                    index: 0,
                    command: Some("npm install".to_string()),
                    output: None,
                    error: Some(err),
                    action: None,
                },
            };
            ctx.events.emit(ProtocolEvent::GitResult(event));
        }

        for (index, message) in ctx.messages.iter().enumerate() {
            for attachment in &message.attachments {
                let name = attachment.name.clone().unwrap_or_else(|| format!("attachment-{index}"));
                let rel = format!("uploads/{}-{}", ctx.elapsed_ms(), name);
                if let Ok(bytes) = STANDARD.decode(&attachment.data) {
                    let _ = ctx.deps.store.write_bytes(&ctx.session_id, &rel, &bytes).await;
                }
            }
        }

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

        let plan = match parse_json_lenient(&raw).and_then(serde_json::from_value::<ExecutionPlan>) {
            Ok(plan) => plan,
            Err(_) => {
                ctx.events.delta(raw);
                ctx.events.phase(PhaseName::Ready);
                ctx.events.emit(ProtocolEvent::Done {
                    usage: stream_event::Usage::default(),
                    session_id: ctx.session_id.clone(),
                });
                ctx.events.close();
                return Ok(PhaseResult::Abort {
                    phase: self.name().to_string(),
                    reason: "plan response was not valid JSON".to_string(),
                });
            }
        };

        if let Some(title) = plan.title.clone() {
            ctx.events.emit(ProtocolEvent::Metadata {
                data: stream_event::MetadataData { title: Some(title) },
            });
        }

        ctx.plan = Some(plan);
        Ok(PhaseResult::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_lists_existing_files() {
        let (bus, _rx) = crate::events::EventBus::new();
        let deps = crate::pipeline::PipelineDeps {
            store: std::sync::Arc::new(workspace::Store::new(std::env::temp_dir())),
            serializer: std::sync::Arc::new(workspace::PerFileSerializer::new()),
            llm: std::sync::Arc::new(crate::llm::MockLlmProvider::default()),
            policy: config::PolicyConfig::default(),
            dev_servers: std::sync::Arc::new(crate::dev_server::DevServerRegistry::default()),
        };
        let mut ctx = PipelineContext::new(deps, bus, "s1".to_string(), std::env::temp_dir(), true, vec![]);
        ctx.existing_files = vec!["src/App.tsx".to_string()];
        let prompt = build_system_prompt(&ctx);
        assert!(prompt.contains("src/App.tsx"));
    }
}
