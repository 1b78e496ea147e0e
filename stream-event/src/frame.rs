//! SSE-style framing: one event per record, `data: {json}\n\n` (spec §6).

use crate::event::ProtocolEvent;

#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Renders one event as a complete SSE record: `data: ` + compact JSON +
/// a trailing blank line. Grounded on the teacher's
/// `stream_event_to_protocol_format` (maps an event to a tagged JSON value)
/// but adds the literal framing bytes spec §6 requires on the wire.
pub fn to_sse_line(event: &ProtocolEvent) -> Result<String, FrameError> {
    let value = event.to_value()?;
    Ok(format!("data: {}\n\n", serde_json::to_string(&value)?))
}
