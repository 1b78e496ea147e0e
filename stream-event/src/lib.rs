//! Stream event protocol for the chat event stream: tagged event types
//! (type + payload) plus the SSE-style line framing the HTTP response body
//! is built from. `core` bridges its internal pipeline events into
//! [`ProtocolEvent`] and calls [`frame::to_sse_line`] to write them out.

pub mod event;
pub mod frame;

pub use event::{MetadataData, PhaseName, ProtocolEvent, TransparencyData, Usage};
pub use frame::{to_sse_line, FrameError};
