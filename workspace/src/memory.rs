//! Project Memory (spec §3/§4.10): a per-session Markdown file with named
//! sections (architecture, components, file tree) that Understand reads
//! and Deliver updates, and that Plan serializes into its system prompt.
//!
//! Grounded on the teacher's atomic-rewrite posture for its own
//! session-scoped persisted files (write to a temp path, then rename),
//! applied here to a flat `## Section` Markdown format instead of the
//! teacher's SQLite rows.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const ARCHITECTURE: &str = "Architecture";
pub const COMPONENTS: &str = "Components";
pub const FILE_TREE: &str = "File Tree";

const SECTION_ORDER: &[&str] = &[ARCHITECTURE, COMPONENTS, FILE_TREE];

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("blocking task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// In-memory view of a project-memory file's named sections, in
/// insertion order for any section not in [`SECTION_ORDER`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProjectMemory {
    sections: BTreeMap<String, String>,
    order: Vec<String>,
}

impl ProjectMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a Markdown file of `## <name>\n<body>` blocks. Unparseable
    /// or missing files yield empty memory -- the first turn always
    /// starts from a blank slate.
    pub fn parse(text: &str) -> Self {
        let mut memory = Self::new();
        let mut current: Option<String> = None;
        let mut body = String::new();
        for line in text.lines() {
            if let Some(name) = line.strip_prefix("## ") {
                if let Some(name) = current.take() {
                    memory.insert_raw(name, body.trim_end().to_string());
                }
                current = Some(name.trim().to_string());
                body.clear();
            } else if current.is_some() {
                body.push_str(line);
                body.push('\n');
            }
        }
        if let Some(name) = current {
            memory.insert_raw(name, body.trim_end().to_string());
        }
        memory
    }

    fn insert_raw(&mut self, name: String, body: String) {
        if !self.sections.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.sections.insert(name, body);
    }

    pub fn get(&self, section: &str) -> Option<&str> {
        self.sections.get(section).map(String::as_str)
    }

    /// Overwrites a section's body, appending it to the end if new.
    pub fn update(&mut self, section: &str, body: impl Into<String>) {
        self.insert_raw(section.to_string(), body.into());
    }

    /// Appends `line` to a section's body as a new line, creating the
    /// section if absent. Used for the "files modified this turn" list,
    /// which accumulates across turns rather than being replaced.
    pub fn append_line(&mut self, section: &str, line: &str) {
        let existing = self.sections.entry(section.to_string()).or_default();
        if !existing.is_empty() {
            existing.push('\n');
        }
        existing.push_str(line);
        if !self.order.iter().any(|s| s == section) {
            self.order.push(section.to_string());
        }
    }

    /// Renders back to Markdown, canonical sections first in
    /// [`SECTION_ORDER`], then any other sections in first-seen order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut seen = std::collections::HashSet::new();
        for name in SECTION_ORDER {
            if let Some(body) = self.sections.get(*name) {
                render_section(&mut out, name, body);
                seen.insert(name.to_string());
            }
        }
        for name in &self.order {
            if seen.contains(name) {
                continue;
            }
            if let Some(body) = self.sections.get(name) {
                render_section(&mut out, name, body);
            }
        }
        out
    }

    /// Serializes into the form Plan concatenates into its system
    /// prompt: empty string when there is nothing recorded yet.
    pub fn to_prompt_section(&self) -> String {
        if self.sections.values().all(|b| b.trim().is_empty()) && self.sections.is_empty() {
            return String::new();
        }
        self.render()
    }
}

fn render_section(out: &mut String, name: &str, body: &str) {
    out.push_str("## ");
    out.push_str(name);
    out.push('\n');
    out.push_str(body.trim_end());
    out.push_str("\n\n");
}

/// Reads a session's project-memory file, if any.
pub async fn read(path: PathBuf) -> Result<ProjectMemory, MemoryError> {
    tokio::task::spawn_blocking(move || -> Result<ProjectMemory, MemoryError> {
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(ProjectMemory::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProjectMemory::new()),
            Err(e) => Err(e.into()),
        }
    })
    .await?
}

/// Atomically rewrites a session's project-memory file: write to a
/// sibling temp file, then rename over the target.
pub async fn write(path: PathBuf, memory: &ProjectMemory) -> Result<(), MemoryError> {
    let rendered = memory.render();
    tokio::task::spawn_blocking(move || -> Result<(), MemoryError> {
        write_atomic(&path, &rendered)
    })
    .await?
}

fn write_atomic(path: &Path, content: &str) -> Result<(), MemoryError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
