//! Per-session workspace: file store, unified diff, per-file write
//! serialization, and project memory.
//!
//! - **Store**: owns a session's directory on disk, scaffolds it from an
//!   optional starter template, and resolves every relative path safely
//!   under the session root.
//! - **Diff**: computes the unified diff shown for a file mutation.
//! - **Serializer**: guarantees at most one concurrent write per path.
//! - **Memory**: the per-session Markdown file Understand reads and
//!   Deliver updates.
//! - **Session**: `chat_history.json` and `metadata.json`, rewritten
//!   wholesale at end-of-turn.

mod diff;
mod memory;
mod serializer;
mod session;
mod store;

pub use diff::{line_counts, unified_diff};
pub use memory::{read as read_memory, write as write_memory, MemoryError, ProjectMemory, ARCHITECTURE, COMPONENTS, FILE_TREE};
pub use serializer::PerFileSerializer;
pub use session::{
    read_chat_history, read_metadata, write_chat_history, write_metadata, SessionFileError,
};
pub use store::{EnsureResult, Store, StoreError};
