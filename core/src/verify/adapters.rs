//! Lint/type-check adapters (spec §4.8), normalized to `plan_spec`'s
//! `LintFileResult`/`tscErrors` shapes.
//!
//! Grounded on the teacher's `Checkpointer<S>` trait-with-mock-impl pattern
//! (`loom/src/memory/checkpointer.rs`): a narrow async trait plus an
//! in-memory mock usable in tests without shelling out to real tooling.
//! The real implementations drive `crate::subprocess::run_streaming`
//! against the session's own `package.json` scripts.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use plan_spec::LintFileResult;
use regex::Regex;
use thiserror::Error;

use crate::subprocess::{run_streaming, SubprocessError};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("subprocess: {0}")]
    Subprocess(#[from] SubprocessError),
}

#[async_trait]
pub trait LintAdapter: Send + Sync {
    async fn run(&self, workspace_dir: &Path) -> Result<Vec<LintFileResult>, VerifyError>;
}

#[async_trait]
pub trait TypeCheckAdapter: Send + Sync {
    /// Raw type-checker error lines (spec §3 `tscErrors`); Repair later
    /// extracts file references from these strings.
    async fn run(&self, workspace_dir: &Path) -> Result<Vec<String>, VerifyError>;
}

/// ESLint's own `--format json` output: `[{filePath, messages: [{severity,
/// message, ruleId}], errorCount, warningCount}, ...]`.
#[derive(serde::Deserialize)]
struct EslintFileResult {
    #[serde(rename = "filePath")]
    file_path: String,
    messages: Vec<EslintMessage>,
    #[serde(rename = "errorCount")]
    error_count: usize,
    #[serde(rename = "warningCount")]
    warning_count: usize,
}

#[derive(serde::Deserialize)]
struct EslintMessage {
    message: String,
    #[serde(rename = "ruleId", default)]
    rule_id: Option<String>,
}

/// Drives `npm run lint -- --format json` inside the session directory.
pub struct NpmLintAdapter {
    pub timeout: Duration,
}

#[async_trait]
impl LintAdapter for NpmLintAdapter {
    async fn run(&self, workspace_dir: &Path) -> Result<Vec<LintFileResult>, VerifyError> {
        let output = run_streaming(
            "npm",
            &["run", "lint", "--", "--format", "json"],
            workspace_dir,
            self.timeout,
            |_line| {},
        )
        .await?;
        let parsed: Vec<EslintFileResult> = serde_json::from_str(&output.stdout).unwrap_or_default();
        Ok(parsed
            .into_iter()
            .map(|f| LintFileResult {
                filepath: relativize(workspace_dir, &f.file_path),
                messages: f
                    .messages
                    .into_iter()
                    .map(|m| match m.rule_id {
                        Some(rule) => format!("{} ({rule})", m.message),
                        None => m.message,
                    })
                    .collect(),
                error_count: f.error_count,
                warning_count: f.warning_count,
            })
            .filter(|r| r.error_count > 0 || r.warning_count > 0)
            .collect())
    }
}

fn relativize(base: &Path, path: &str) -> String {
    Path::new(path)
        .strip_prefix(base)
        .map(|p| p.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/"))
        .unwrap_or_else(|_| path.to_string())
}

static TSC_ERROR_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?P<file>[^\s(]+)\((?P<line>\d+),(?P<col>\d+)\): error (?P<code>TS\d+): (?P<msg>.+)$").unwrap());

/// Drives `npm run typecheck` (a `tsc --noEmit` wrapper) and keeps each
/// `file(line,col): error TSxxxx: ...` line verbatim as a `tscErrors`
/// entry (spec §3: `tscErrors: [string]`).
pub struct TscTypeCheckAdapter {
    pub timeout: Duration,
}

#[async_trait]
impl TypeCheckAdapter for TscTypeCheckAdapter {
    async fn run(&self, workspace_dir: &Path) -> Result<Vec<String>, VerifyError> {
        let output = run_streaming("npm", &["run", "typecheck"], workspace_dir, self.timeout, |_line| {}).await?;
        Ok(output
            .stdout
            .lines()
            .chain(output.stderr.lines())
            .filter(|line| TSC_ERROR_LINE.is_match(line))
            .map(str::to_string)
            .collect())
    }
}

/// Extracts the file path a `tscErrors` line refers to, if any (spec §4.9
/// step 4: "`filesToFix` ... type-check error file references").
pub fn tsc_error_filepath(line: &str) -> Option<String> {
    TSC_ERROR_LINE.captures(line).map(|c| c["file"].to_string())
}

/// Deterministic adapters for tests and demos.
pub struct MockLintAdapter {
    pub results: Vec<LintFileResult>,
}

#[async_trait]
impl LintAdapter for MockLintAdapter {
    async fn run(&self, _workspace_dir: &Path) -> Result<Vec<LintFileResult>, VerifyError> {
        Ok(self.results.clone())
    }
}

pub struct MockTypeCheckAdapter {
    pub errors: Vec<String>,
}

#[async_trait]
impl TypeCheckAdapter for MockTypeCheckAdapter {
    async fn run(&self, _workspace_dir: &Path) -> Result<Vec<String>, VerifyError> {
        Ok(self.errors.clone())
    }
}
