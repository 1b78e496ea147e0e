//! Pipeline-level errors (spec §7).
//!
//! Most error kinds in spec §7 never reach here: Provider, Parse, and
//! Execution failures are caught at the phase boundary and turned into
//! observable events (a `file_action` with an `[Execution failed: ...]`
//! marker, a raw-text `delta`, etc.) rather than propagated. `PipelineError`
//! is reserved for the few kinds that legitimately abort a phase outright.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("llm provider: {0}")]
    Provider(String),

    #[error("workspace: {0}")]
    Workspace(#[from] workspace::StoreError),

    #[error("unknown loop target: {0}")]
    UnknownLoopTarget(String),

    #[error("aborted in phase {phase}: {reason}")]
    Aborted { phase: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_validation_contains_keyword() {
        let err = PipelineError::Validation("empty messages".to_string());
        assert!(err.to_string().to_lowercase().contains("validation"));
    }

    #[test]
    fn display_aborted_contains_phase_and_reason() {
        let err = PipelineError::Aborted {
            phase: "plan".to_string(),
            reason: "no tasks".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("plan"));
        assert!(s.contains("no tasks"));
    }

    #[test]
    fn display_unknown_loop_target_contains_target() {
        let err = PipelineError::UnknownLoopTarget("repiar".to_string());
        assert!(err.to_string().contains("repiar"));
    }
}
