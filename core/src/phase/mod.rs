//! Phase Engine (spec §4.2): an ordered list of named phases, indexable by
//! name for `loop` jumps, with cooperative cancellation between
//! iterations.
//!
//! Grounded on the teacher's `Node<S>` trait (`loom/src/graph/node.rs`,
//! `(state) -> (state, Next)`) and `StateGraph`'s named-node/edge model
//! (`loom/src/graph/state_graph.rs`), simplified per spec §9 to a finite
//! ordered `Vec` with a name -> index map instead of a general edge graph:
//! this engine has no conditional-edge compiler, no checkpointer, no
//! middleware stack, because the orchestrator's control flow is a flat
//! phase list with at most one named `loop` target (`"verify"`).

pub mod confirm;
pub mod deliver;
pub mod execute;
pub mod pm_analyze;
pub mod plan;
pub mod repair;
pub mod understand;
pub mod verify;

use async_trait::async_trait;

use crate::pipeline::PipelineContext;
use crate::PipelineError;

/// What a phase wants the engine to do next (spec §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseResult {
    /// Proceed to the next phase in list order.
    Continue,
    /// Same as `Continue` -- kept distinct because some phases (Confirm's
    /// low-friction gate, PM-Analyze's conversational skip) return `Skip`
    /// for a semantically different reason even though engine dispatch is
    /// identical (spec §4.2 dispatch table).
    Skip,
    /// Jump to the named phase; unknown target aborts.
    Loop { target: String },
    /// Stop the pipeline. `phase` and `reason` are folded into the final
    /// `error` event by the caller (spec §4.2/§7).
    Abort { phase: String, reason: String },
}

/// One step of the pipeline (spec §4.2/§9).
#[async_trait]
pub trait Phase: Send + Sync {
    /// Unique name within a `PhaseEngine`; also the `loop` target string.
    fn name(&self) -> &str;

    /// Runs this phase. A returned `Err` is converted by the engine into
    /// `PhaseResult::Abort { phase: self.name(), reason: err.to_string() }`
    /// -- phases should prefer emitting events and returning `Abort`
    /// themselves over propagating an error, reserving `Err` for the rare
    /// case that truly can't be turned into an observable event (spec §7:
    /// "only catastrophic engine errors abort without a `done` event").
    async fn execute(&self, ctx: &mut PipelineContext) -> Result<PhaseResult, PipelineError>;
}

/// Ordered list of phases with indexable `loop` jumps (spec §4.2).
pub struct PhaseEngine {
    phases: Vec<Box<dyn Phase>>,
}

impl PhaseEngine {
    pub fn new(phases: Vec<Box<dyn Phase>>) -> Self {
        Self { phases }
    }

    /// The orchestrator's standard phase list in spec §2 order: Understand
    /// -> PlanPM -> PlanOrchestrator -> Confirm -> Execute -> Verify (loop
    /// target) -> Repair -> Deliver.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(understand::UnderstandPhase),
            Box::new(pm_analyze::PmAnalyzePhase),
            Box::new(plan::PlanPhase),
            Box::new(confirm::ConfirmPhase),
            Box::new(execute::ExecutePhase),
            Box::new(verify::VerifyPhase),
            Box::new(repair::RepairPhase),
            Box::new(deliver::DeliverPhase),
        ])
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.name() == name)
    }

    /// Runs phases in order starting at index 0, honoring `loop`/`skip`/
    /// `abort`, and stopping between phases if the event bus has gone
    /// inactive (client disconnect or prior interrupt/close).
    pub async fn run(&self, ctx: &mut PipelineContext) {
        let mut i = 0usize;
        while i < self.phases.len() {
            if !ctx.events.is_active() {
                return;
            }
            let phase = &self.phases[i];
            let outcome = match phase.execute(ctx).await {
                Ok(result) => result,
                Err(err) => PhaseResult::Abort {
                    phase: phase.name().to_string(),
                    reason: err.to_string(),
                },
            };
            match outcome {
                PhaseResult::Continue | PhaseResult::Skip => i += 1,
                PhaseResult::Loop { target } => match self.index_of(&target) {
                    Some(idx) => i = idx,
                    None => {
                        ctx.events.emit(stream_event::ProtocolEvent::Error {
                            message: format!("unknown loop target: {target}"),
                        });
                        return;
                    }
                },
                PhaseResult::Abort { phase, reason } => {
                    tracing::warn!(phase = %phase, reason = %reason, "pipeline aborted");
                    ctx.events.emit(stream_event::ProtocolEvent::Error {
                        message: format!("{phase}: {reason}"),
                    });
                    return;
                }
            }
        }
    }
}
