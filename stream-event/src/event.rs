//! Wire event types for the chat event stream (spec §6 event table).
//! Each variant's JSON shape matches the `type` column literally; payload
//! fields reuse the `plan-spec` data-model types where the table says "see
//! §3 <Type>".

use plan_spec::{FileActionEvent, GitResultEvent, TransparencyTask};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    Thinking,
    Planning,
    Installing,
    Executing,
    Verifying,
    Repairing,
    Summary,
    Responding,
    Ready,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct TransparencyData {
    pub tasks: Vec<TransparencyTask>,
}

/// One record of the chat event stream. Serializes to `{"type": "...", ...}`;
/// [`crate::frame::to_sse_line`] wraps this in the `data: ...\n\n` framing.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    Session {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Phase {
        phase: PhaseName,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        thought: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", rename = "elapsed_ms")]
        elapsed_ms: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
    },
    Delta {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
    },
    Transparency {
        data: TransparencyData,
    },
    FileAction(FileActionEvent),
    GitResult(GitResultEvent),
    Preview {
        url: String,
    },
    Metadata {
        data: MetadataData,
    },
    Summary {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
    },
    AgentStart {
        agent: String,
        name: String,
    },
    AgentEnd {
        agent: String,
    },
    Error {
        message: String,
    },
    Done {
        usage: Usage,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct MetadataData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ProtocolEvent {
    /// Serializes this event to a JSON value (no framing applied).
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn phase(name: PhaseName) -> Self {
        ProtocolEvent::Phase {
            phase: name,
            detail: None,
            thought: None,
            elapsed_ms: None,
            agent: None,
        }
    }

    pub fn delta(text: impl Into<String>) -> Self {
        ProtocolEvent::Delta {
            text: text.into(),
            agent: None,
        }
    }
}
