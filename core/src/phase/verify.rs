//! Verify Phase (spec §4.8): lint, type-check, and a relative-import
//! existence scan run concurrently against the workspace; their findings
//! are merged, translated into plain language, and either cleared or
//! handed to Repair.
//!
//! Grounded on the Phase Engine's `Node`-style `execute` signature
//! (`phase/mod.rs`); the parallel-adapter dispatch is new from spec
//! prose, since the teacher never runs an external lint/type-check tool.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use plan_spec::{GitResultEvent, VerificationErrors};
use stream_event::{PhaseName, ProtocolEvent};

use crate::phase::execute::THEME_FILE;
use crate::phase::{Phase, PhaseResult};
use crate::pipeline::PipelineContext;
use crate::preflight;
use crate::verify::adapters::{LintAdapter, NpmLintAdapter, TscTypeCheckAdapter, TypeCheckAdapter};
use crate::verify::translate_errors;
use crate::PipelineError;

static HEX_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(?:[0-9a-fA-F]{6}|[0-9a-fA-F]{3})\b").unwrap());
const HEX_EXEMPT: &[&str] = &["#000", "#000000", "#fff", "#ffffff", "#FFF", "#FFFFFF"];
const DESIGN_CONSISTENCY_SAMPLE: usize = 5;

pub struct VerifyPhase;

#[async_trait]
impl Phase for VerifyPhase {
    fn name(&self) -> &str {
        "verify"
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<PhaseResult, PipelineError> {
        let plan = ctx.plan.as_ref().ok_or_else(|| PipelineError::Aborted {
            phase: self.name().to_string(),
            reason: "no plan in context".to_string(),
        })?;

        if plan.file_touching_count() == 0 {
            ctx.verification_errors = None;
            return Ok(PhaseResult::Continue);
        }

        ctx.events.phase(PhaseName::Verifying);
        ctx.events.emit(ProtocolEvent::GitResult(GitResultEvent {
            id: "verify-lint".to_string(),
            index: 0,
            command: Some("npm run lint".to_string()),
            output: None,
            error: None,
            action: Some("running".to_string()),
        }));
        ctx.events.emit(ProtocolEvent::GitResult(GitResultEvent {
            id: "verify-typecheck".to_string(),
            index: 0,
            command: Some("npm run typecheck".to_string()),
            output: None,
            error: None,
            action: Some("running".to_string()),
        }));

        let workspace_dir = ctx.workspace_dir.clone();
        let timeout = Duration::from_secs(120);
        let lint_adapter = NpmLintAdapter { timeout };
        let typecheck_adapter = TscTypeCheckAdapter { timeout };

        let existing_files: HashSet<String> = ctx.existing_files.iter().cloned().collect();
        let store = ctx.deps.store.clone();
        let session_id = ctx.session_id.clone();

        let (lint_results, tsc_errors, missing_import_errors) = tokio::join!(
            run_lint(&lint_adapter, &workspace_dir),
            run_typecheck(&typecheck_adapter, &workspace_dir),
            scan_missing_imports(&store, &session_id, &existing_files),
        );

        ctx.events.emit(ProtocolEvent::GitResult(GitResultEvent {
            id: "verify-lint".to_string(),
            index: 0,
            command: Some("npm run lint".to_string()),
            output: Some(format!("{} file(s) with findings", lint_results.len())),
            error: None,
            action: Some("done".to_string()),
        }));
        ctx.events.emit(ProtocolEvent::GitResult(GitResultEvent {
            id: "verify-typecheck".to_string(),
            index: 0,
            command: Some("npm run typecheck".to_string()),
            output: Some(format!("{} error(s)", tsc_errors.len())),
            error: None,
            action: Some("done".to_string()),
        }));

        if let Some(delta) = design_consistency_delta(&store, &session_id, &existing_files).await {
            ctx.events.delta(delta);
        }

        let mut all_diagnostics: Vec<String> = Vec::new();
        for result in &lint_results {
            all_diagnostics.extend(result.messages.iter().cloned());
        }
        all_diagnostics.extend(tsc_errors.iter().cloned());
        all_diagnostics.extend(missing_import_errors.iter().cloned());
        let translated = translate_errors(&all_diagnostics);
        if !translated.is_empty() {
            ctx.events.delta(translated.join(" "));
        }

        let errors = VerificationErrors {
            lint_results,
            tsc_errors,
            missing_import_errors,
        };

        if errors.is_clean() {
            ctx.verification_errors = None;
        } else {
            ctx.verification_errors = Some(errors);
        }

        Ok(PhaseResult::Continue)
    }
}

async fn run_lint(adapter: &NpmLintAdapter, workspace_dir: &std::path::Path) -> Vec<plan_spec::LintFileResult> {
    adapter.run(workspace_dir).await.unwrap_or_default()
}

async fn run_typecheck(adapter: &TscTypeCheckAdapter, workspace_dir: &std::path::Path) -> Vec<String> {
    adapter.run(workspace_dir).await.unwrap_or_default()
}

/// Scans every existing source file for relative imports the type-checker
/// can't see resolving (`.css/.svg/` and other non-code assets), spec
/// §4.8: "a relative-import existence scanner".
async fn scan_missing_imports(store: &Arc<workspace::Store>, session_id: &str, existing_files: &HashSet<String>) -> Vec<String> {
    let mut missing = Vec::new();
    for filepath in existing_files {
        if !is_scannable_source(filepath) {
            continue;
        }
        let Ok(source) = store.read_file(session_id, filepath).await else {
            continue;
        };
        let base_dir = match filepath.rfind('/') {
            Some(idx) => &filepath[..idx],
            None => "",
        };
        for specifier in preflight::extract_specifiers(&source) {
            if !preflight::is_relative(&specifier) {
                continue;
            }
            let resolved = preflight::relative_candidates(base_dir, &specifier)
                .iter()
                .any(|candidate| existing_files.contains(candidate));
            if !resolved {
                missing.push(format!("{filepath}: unresolved import '{specifier}'"));
            }
        }
    }
    missing.sort();
    missing.dedup();
    missing
}

fn is_scannable_source(filepath: &str) -> bool {
    matches!(filepath.rsplit('.').next(), Some("ts" | "tsx" | "js" | "jsx"))
}

/// Reads the theme file's hex palette and flags hardcoded hex literals in
/// other source files that aren't in the palette or the exempt set (spec
/// §4.8 design-consistency scan), returning a short delta string.
async fn design_consistency_delta(store: &Arc<workspace::Store>, session_id: &str, existing_files: &HashSet<String>) -> Option<String> {
    let theme_source = store.read_file(session_id, THEME_FILE).await.ok()?;
    let palette: HashSet<String> = HEX_LITERAL.find_iter(&theme_source).map(|m| m.as_str().to_lowercase()).collect();

    let mut offenders: Vec<String> = Vec::new();
    for filepath in existing_files {
        if filepath == THEME_FILE || !is_scannable_source(filepath) {
            continue;
        }
        let Ok(source) = store.read_file(session_id, filepath).await else {
            continue;
        };
        for m in HEX_LITERAL.find_iter(&source) {
            let hex = m.as_str().to_lowercase();
            if !palette.contains(&hex) && !HEX_EXEMPT.iter().any(|e| e.to_lowercase() == hex) {
                offenders.push(format!("{filepath} ({})", m.as_str()));
                break;
            }
        }
    }
    if offenders.is_empty() {
        return None;
    }
    offenders.sort();
    offenders.truncate(DESIGN_CONSISTENCY_SAMPLE);
    Some(format!(
        "Found hardcoded colors outside the design palette: {}.",
        offenders.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn missing_relative_import_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(workspace::Store::new(root.path().to_path_buf()));
        store.ensure("s1").await.unwrap();
        store.write_file("s1", "src/App.tsx", "import { Btn } from './Btn';").await.unwrap();
        let existing = set(&["src/App.tsx"]);
        let missing = scan_missing_imports(&store, "s1", &existing).await;
        assert_eq!(missing.len(), 1);
        assert!(missing[0].contains("./Btn"));
    }

    #[tokio::test]
    async fn resolved_import_is_not_reported() {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(workspace::Store::new(root.path().to_path_buf()));
        store.ensure("s1").await.unwrap();
        store.write_file("s1", "src/App.tsx", "import { Btn } from './Btn';").await.unwrap();
        store.write_file("s1", "src/Btn.tsx", "export function Btn() {}").await.unwrap();
        let existing = set(&["src/App.tsx", "src/Btn.tsx"]);
        let missing = scan_missing_imports(&store, "s1", &existing).await;
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn off_palette_hex_is_flagged() {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(workspace::Store::new(root.path().to_path_buf()));
        store.ensure("s1").await.unwrap();
        store.write_file("s1", THEME_FILE, r##"{"primary": "#336699"}"##).await.unwrap();
        store.write_file("s1", "src/App.tsx", "const c = '#ff00ff';").await.unwrap();
        let existing = set(&["src/App.tsx", THEME_FILE]);
        let delta = design_consistency_delta(&store, "s1", &existing).await;
        assert!(delta.unwrap().contains("#ff00ff"));
    }

    #[tokio::test]
    async fn palette_hex_is_not_flagged() {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(workspace::Store::new(root.path().to_path_buf()));
        store.ensure("s1").await.unwrap();
        store.write_file("s1", THEME_FILE, r##"{"primary": "#336699"}"##).await.unwrap();
        store.write_file("s1", "src/App.tsx", "const c = '#336699';").await.unwrap();
        let existing = set(&["src/App.tsx", THEME_FILE]);
        let delta = design_consistency_delta(&store, "s1", &existing).await;
        assert!(delta.is_none());
    }

    #[tokio::test]
    async fn no_mutations_skips_verification_entirely() {
        let (bus, _rx) = crate::events::EventBus::new();
        let deps = crate::pipeline::PipelineDeps {
            store: Arc::new(workspace::Store::new(std::env::temp_dir())),
            serializer: Arc::new(workspace::PerFileSerializer::new()),
            llm: Arc::new(crate::llm::MockLlmProvider::default()),
            policy: config::PolicyConfig::default(),
            dev_servers: std::sync::Arc::new(crate::dev_server::DevServerRegistry::default()),
        };
        let mut ctx = PipelineContext::new(deps, bus, "s1".to_string(), std::env::temp_dir(), true, vec![]);
        ctx.plan = Some(plan_spec::ExecutionPlan {
            tasks: vec![plan_spec::Task::Chat { content: "hi".to_string() }],
            ..Default::default()
        });
        let result = VerifyPhase.execute(&mut ctx).await.unwrap();
        assert_eq!(result, PhaseResult::Continue);
        assert!(ctx.verification_errors.is_none());
    }
}
