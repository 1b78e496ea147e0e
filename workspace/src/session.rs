//! Session-level files a session directory carries besides its source
//! tree (spec §6 workspace layout): `chat_history.json` and
//! `metadata.json`. Both are rewritten wholesale at end-of-turn, so they
//! share `memory.rs`'s atomic write-then-rename posture rather than any
//! incremental-append scheme.

use std::path::{Path, PathBuf};

use plan_spec::{ClientMessage, SessionMetadata};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionFileError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialize: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("blocking task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

fn write_atomic(path: &Path, content: &str) -> Result<(), SessionFileError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads `chat_history.json`, if present. Missing or unparseable files
/// yield an empty history -- a session's first turn always starts blank.
pub async fn read_chat_history(path: PathBuf) -> Result<Vec<ClientMessage>, SessionFileError> {
    tokio::task::spawn_blocking(move || -> Result<Vec<ClientMessage>, SessionFileError> {
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(serde_json::from_str(&text).unwrap_or_default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    })
    .await?
}

/// Atomically rewrites `chat_history.json` with the full message list for
/// the turn just completed (spec §6: "rewritten each turn").
pub async fn write_chat_history(path: PathBuf, messages: &[ClientMessage]) -> Result<(), SessionFileError> {
    let rendered = serde_json::to_string_pretty(messages)?;
    tokio::task::spawn_blocking(move || -> Result<(), SessionFileError> { write_atomic(&path, &rendered) }).await?
}

/// Reads `metadata.json`, if present.
pub async fn read_metadata(path: PathBuf) -> Result<Option<SessionMetadata>, SessionFileError> {
    tokio::task::spawn_blocking(move || -> Result<Option<SessionMetadata>, SessionFileError> {
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(serde_json::from_str(&text).ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    })
    .await?
}

/// Atomically rewrites `metadata.json`.
pub async fn write_metadata(path: PathBuf, metadata: &SessionMetadata) -> Result<(), SessionFileError> {
    let rendered = serde_json::to_string_pretty(metadata)?;
    tokio::task::spawn_blocking(move || -> Result<(), SessionFileError> { write_atomic(&path, &rendered) }).await?
}
