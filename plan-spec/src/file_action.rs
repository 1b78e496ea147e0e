//! Per-file mutation result, streamed twice: an `executing` placeholder then
//! a `complete` event sharing the same `id` (spec §3/§8).

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    Created,
    Edited,
    Deleted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileActionStatus {
    Executing,
    Complete,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileActionEvent {
    pub id: String,
    pub filepath: String,
    pub filename: String,
    pub language: String,
    pub action: FileAction,
    pub content: String,
    pub lines_added: usize,
    pub lines_removed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    pub status: FileActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl FileActionEvent {
    /// The `status: executing` placeholder emitted before the Executor runs,
    /// keyed by `id` so the later `complete` event can supersede it.
    pub fn placeholder(id: impl Into<String>, filepath: &str, action: FileAction, prompt: Option<String>) -> Self {
        let (filename, language) = filename_and_language(filepath);
        Self {
            id: id.into(),
            filepath: filepath.to_string(),
            filename,
            language,
            action,
            content: String::new(),
            lines_added: 0,
            lines_removed: 0,
            diff: None,
            status: FileActionStatus::Executing,
            prompt,
        }
    }
}

/// Splits a workspace-relative path into its filename and a best-effort
/// language tag derived from the extension.
pub fn filename_and_language(filepath: &str) -> (String, String) {
    let filename = filepath
        .rsplit('/')
        .next()
        .unwrap_or(filepath)
        .to_string();
    let language = match filename.rsplit('.').next() {
        Some("ts") => "typescript",
        Some("tsx") => "tsx",
        Some("js") => "javascript",
        Some("jsx") => "jsx",
        Some("css") => "css",
        Some("scss") => "scss",
        Some("json") => "json",
        Some("md") => "markdown",
        Some("svg") => "svg",
        Some("html") => "html",
        _ => "text",
    }
    .to_string();
    (filename, language)
}
