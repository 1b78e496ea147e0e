//! Confirm Phase (spec §4.6): a low-friction, informational gate. Only
//! emits a transparency breakdown when the plan has three or more
//! file-touching tasks; otherwise skips straight through. Today this never
//! blocks (spec §9 Open Question, decided in DESIGN.md: kept as a no-op
//! informational gate).

use async_trait::async_trait;

use stream_event::{ProtocolEvent, TransparencyData};

use crate::phase::{Phase, PhaseResult};
use crate::pipeline::PipelineContext;
use crate::PipelineError;

const CONFIRM_THRESHOLD: usize = 3;

pub struct ConfirmPhase;

#[async_trait]
impl Phase for ConfirmPhase {
    fn name(&self) -> &str {
        "confirm"
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<PhaseResult, PipelineError> {
        let plan = ctx.plan.as_ref().ok_or_else(|| PipelineError::Aborted {
            phase: self.name().to_string(),
            reason: "no plan in context".to_string(),
        })?;

        if plan.file_touching_count() < CONFIRM_THRESHOLD {
            return Ok(PhaseResult::Skip);
        }

        let tasks: Vec<plan_spec::TransparencyTask> = plan
            .non_chat_tasks()
            .enumerate()
            .map(|(i, (plan_index, task))| plan_spec::TransparencyTask::new(format!("task-{i}"), task.describe(), plan_index))
            .collect();
        ctx.events.emit(ProtocolEvent::Transparency {
            data: TransparencyData { tasks },
        });
        Ok(PhaseResult::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_spec::{ExecutionPlan, Task};

    fn ctx_with_plan(tasks: Vec<Task>) -> PipelineContext {
        let (bus, _rx) = crate::events::EventBus::new();
        let deps = crate::pipeline::PipelineDeps {
            store: std::sync::Arc::new(workspace::Store::new(std::env::temp_dir())),
            serializer: std::sync::Arc::new(workspace::PerFileSerializer::new()),
            llm: std::sync::Arc::new(crate::llm::MockLlmProvider::default()),
            policy: config::PolicyConfig::default(),
            dev_servers: std::sync::Arc::new(crate::dev_server::DevServerRegistry::default()),
        };
        let mut ctx = PipelineContext::new(deps, bus, "s1".to_string(), std::env::temp_dir(), true, vec![]);
        ctx.plan = Some(ExecutionPlan {
            tasks,
            ..Default::default()
        });
        ctx
    }

    fn create(path: &str) -> Task {
        Task::CreateFile {
            filepath: path.to_string(),
            prompt: "p".to_string(),
            depends_on: None,
            feeds_into: None,
        }
    }

    #[tokio::test]
    async fn fewer_than_threshold_skips() {
        let mut ctx = ctx_with_plan(vec![create("a.ts"), create("b.ts")]);
        let result = ConfirmPhase.execute(&mut ctx).await.unwrap();
        assert_eq!(result, PhaseResult::Skip);
    }

    #[tokio::test]
    async fn at_or_above_threshold_continues() {
        let mut ctx = ctx_with_plan(vec![create("a.ts"), create("b.ts"), create("c.ts")]);
        let result = ConfirmPhase.execute(&mut ctx).await.unwrap();
        assert_eq!(result, PhaseResult::Continue);
    }
}
