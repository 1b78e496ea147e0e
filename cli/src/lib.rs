//! Formatting helpers shared between `main.rs` and its tests -- kept out
//! of the binary so they're unit-testable without a process boundary.

use stream_event::ProtocolEvent;

/// Renders one event the way the human-readable (non-`--json`) CLI mode
/// does: `None` for events that carry nothing worth printing standalone.
pub fn render_human(event: &ProtocolEvent) -> Option<String> {
    match event {
        ProtocolEvent::Session { session_id } => Some(format!("session {session_id}")),
        ProtocolEvent::Phase { phase, detail, .. } => {
            let label = serde_json::to_value(phase).ok()?.as_str()?.to_string();
            Some(match detail {
                Some(detail) => format!("[{label}] {detail}"),
                None => format!("[{label}]"),
            })
        }
        ProtocolEvent::Delta { text, .. } => Some(text.clone()),
        ProtocolEvent::Summary { text, .. } => Some(text.clone()),
        ProtocolEvent::Error { message } => Some(format!("error: {message}")),
        ProtocolEvent::Done { .. } => None,
        _ => None,
    }
}
