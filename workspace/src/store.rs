//! Per-session workspace directory store (spec §4.12).
//!
//! Scaffolds a starter template tree on first creation, resolves paths
//! safely under the session root, and lists/writes/deletes files. Grounded
//! on the path-safety idiom of `resolve_path_under` (teacher's
//! `tools/file/write_file.rs`) and the async-over-blocking-fs posture of
//! the teacher's SQLite-backed workspace store, replacing its thread-
//! association semantics with a plain per-session directory model.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

const EXCLUDED_DIRS: &[&str] = &["node_modules", ".git", "dist", ".vite", "coverage"];
const EXCLUDED_FILES: &[&str] = &[".DS_Store"];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("path escapes session directory: {0}")]
    PathEscapesSession(String),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("blocking task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnsureResult {
    pub dir: PathBuf,
    pub is_new: bool,
}

/// Per-session workspace store rooted at a configured base directory.
#[derive(Clone, Debug)]
pub struct Store {
    root: PathBuf,
    /// Template tree copied into every new session's directory, if set.
    template_dir: Option<PathBuf>,
}

impl Store {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            template_dir: None,
        }
    }

    pub fn with_template(mut self, template_dir: PathBuf) -> Self {
        self.template_dir = Some(template_dir);
        self
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    /// Creates the session directory on demand; copies the template tree
    /// only on first creation.
    pub async fn ensure(&self, session_id: &str) -> Result<EnsureResult, StoreError> {
        let dir = self.session_dir(session_id);
        let is_new = !dir.exists();
        let template = self.template_dir.clone();
        let dir_for_blocking = dir.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            std::fs::create_dir_all(&dir_for_blocking)?;
            if is_new {
                if let Some(template) = template {
                    copy_tree(&template, &dir_for_blocking)?;
                }
            }
            Ok(())
        })
        .await??;
        Ok(EnsureResult { dir, is_new })
    }

    /// Joins and lexically resolves `rel` under the session directory,
    /// rejecting anything that would escape it (`..` past the root, or an
    /// absolute path). Does not require `rel` to exist on disk.
    pub fn safe_path(&self, session_id: &str, rel: &str) -> Result<PathBuf, StoreError> {
        let session_dir = self.session_dir(session_id);
        let mut stack: Vec<std::ffi::OsString> = Vec::new();
        for component in Path::new(rel).components() {
            match component {
                Component::Normal(part) => stack.push(part.to_os_string()),
                Component::CurDir => {}
                Component::ParentDir => {
                    if stack.pop().is_none() {
                        return Err(StoreError::PathEscapesSession(rel.to_string()));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(StoreError::PathEscapesSession(rel.to_string()))
                }
            }
        }
        let mut resolved = session_dir;
        for part in stack {
            resolved.push(part);
        }
        Ok(resolved)
    }

    /// Writes `content` to `rel`, creating parent directories as needed.
    /// Returns the file's prior content (`None` if it didn't exist), used
    /// by the Executor to compute a diff.
    pub async fn write_file(
        &self,
        session_id: &str,
        rel: &str,
        content: &str,
    ) -> Result<Option<String>, StoreError> {
        let path = self.safe_path(session_id, rel)?;
        let content = content.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<String>, StoreError> {
            let prior = match std::fs::read_to_string(&path) {
                Ok(s) => Some(s),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            };
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, content)?;
            Ok(prior)
        })
        .await?
    }

    /// Binary counterpart to [`Store::write_file`], used for uploaded and
    /// generated images (spec §4.5/§4.7): no prior-content diffing, since
    /// binary assets aren't diffed.
    pub async fn write_bytes(&self, session_id: &str, rel: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.safe_path(session_id, rel)?;
        let bytes = bytes.to_vec();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, bytes)?;
            Ok(())
        })
        .await?
    }

    pub async fn read_file(&self, session_id: &str, rel: &str) -> Result<String, StoreError> {
        let path = self.safe_path(session_id, rel)?;
        tokio::task::spawn_blocking(move || -> Result<String, StoreError> {
            std::fs::read_to_string(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    StoreError::NotFound(path.display().to_string())
                } else {
                    StoreError::Io(e)
                }
            })
        })
        .await?
    }

    pub async fn delete_file(&self, session_id: &str, rel: &str) -> Result<(), StoreError> {
        let path = self.safe_path(session_id, rel)?;
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            match std::fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
        .await?
    }

    /// Recursively lists all files under the session directory, excluding
    /// build artifacts and OS metadata, as paths relative to the session
    /// root using `/` separators.
    pub async fn list_files(&self, session_id: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.session_dir(session_id);
        tokio::task::spawn_blocking(move || -> Result<Vec<String>, StoreError> {
            let mut out = Vec::new();
            walk(&dir, &dir, &mut out)?;
            out.sort();
            Ok(out)
        })
        .await?
    }
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if EXCLUDED_DIRS.contains(&name_str.as_ref()) {
                continue;
            }
            walk(root, &entry.path(), out)?;
        } else if file_type.is_file() {
            if EXCLUDED_FILES.contains(&name_str.as_ref()) {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(&entry.path())
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");
            out.push(rel);
        }
    }
    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            std::fs::create_dir_all(&dest)?;
            copy_tree(&entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}
