//! Repair Phase (spec §4.9): the verify/repair fixed-point loop. Regression
//! detection, checkpoint/revert, asset auto-synthesis, and a two-phase
//! dependency-ordered repair pass are what turn a naive "try again" into a
//! convergent procedure (spec §4.9 "Why this shape").
//!
//! Grounded on the Phase Engine's `Node`-style `execute` signature and on
//! the Executor's import-preflight retry shape; the regression/checkpoint
//! policy itself is new from spec prose -- the teacher has no self-repair
//! loop over an external verifier.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use plan_spec::VerificationErrors;
use stream_event::PhaseName;

use crate::executor::{Executor, ExecutorRequest};
use crate::phase::{Phase, PhaseResult};
use crate::pipeline::PipelineContext;
use crate::preflight;
use crate::verify::adapters::tsc_error_filepath;
use crate::PipelineError;

/// Fallback target for type errors the engine can't attribute to a file
/// (spec §4.9 step 4).
const APP_ENTRYPOINT: &str = "src/App.tsx";
const ASSET_EXTENSIONS: &[&str] = &["css", "scss", "less", "svg"];

pub struct RepairPhase;

#[async_trait]
impl Phase for RepairPhase {
    fn name(&self) -> &str {
        "repair"
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<PhaseResult, PipelineError> {
        let Some(errors) = ctx.verification_errors.clone() else {
            // Invariant (spec §4.9): RepairPhase only runs when
            // verificationErrors != null. Nothing to do otherwise.
            return Ok(PhaseResult::Continue);
        };

        ctx.events.phase(PhaseName::Repairing);
        ctx.repair_retry_count += 1;

        if ctx.repair_retry_count > ctx.deps.policy.max_repair_retries {
            ctx.events.delta("Reached the maximum number of repair attempts; delivering with the remaining issues noted above.");
            ctx.verification_errors = None;
            return Ok(PhaseResult::Continue);
        }

        let current_error_count = errors.total_error_count();
        let regressed = ctx.repair_retry_count > 1
            && ctx
                .previous_error_count
                .map(|prev| current_error_count > prev)
                .unwrap_or(false);

        if regressed {
            ctx.events.delta("Regression detected: the last repair attempt made things worse. Reverting to the last checkpoint.");
            for (path, content) in ctx.file_checkpoint.clone() {
                let _ = ctx.deps.store.write_file(&ctx.session_id, &path, &content).await;
            }
        }
        ctx.previous_error_count = Some(current_error_count);

        synthesize_missing_assets(ctx, &errors).await;

        let (files_to_fix, source_modules) = files_to_fix(&errors);
        if files_to_fix.is_empty() {
            ctx.verification_errors = None;
            return Ok(PhaseResult::Continue);
        }

        checkpoint(ctx, &files_to_fix).await;

        let existing_files: HashSet<String> = ctx.existing_files.iter().cloned().collect();
        let executor = Arc::new(Executor::new(ctx.deps.llm.clone(), ctx.deps.policy.executor_timeout));
        let concurrency = ctx.deps.policy.repair_concurrency;

        let consumers: Vec<String> = files_to_fix.iter().filter(|f| !source_modules.contains(*f)).cloned().collect();
        let sources: Vec<String> = files_to_fix.iter().filter(|f| source_modules.contains(*f)).cloned().collect();

        // Two-phase ordering (spec §4.9 step 7): imported modules repaired
        // before their consumers, so consumers aren't "fixed" against stale
        // exports.
        for batch in [sources, consumers] {
            repair_batch(ctx, &executor, &errors, &existing_files, batch, concurrency).await;
        }

        Ok(PhaseResult::Loop {
            target: "verify".to_string(),
        })
    }
}

/// Creates placeholder assets for missing non-code imports (spec §4.9 step
/// 3): `.svg` gets an empty SVG element, other asset extensions get a
/// placeholder comment.
async fn synthesize_missing_assets(ctx: &mut PipelineContext, errors: &VerificationErrors) {
    for entry in &errors.missing_import_errors {
        let Some((source_file, specifier)) = parse_missing_import(entry) else {
            continue;
        };
        let base_dir = match source_file.rfind('/') {
            Some(idx) => &source_file[..idx],
            None => "",
        };
        let Some(resolved) = preflight::relative_candidates(base_dir, &specifier).into_iter().next() else {
            continue;
        };
        let Some(ext) = resolved.rsplit('.').next() else {
            continue;
        };
        if !ASSET_EXTENSIONS.contains(&ext) {
            continue;
        }
        let content = if ext == "svg" {
            "<svg></svg>".to_string()
        } else {
            "/* autogenerated placeholder */\n".to_string()
        };
        let _ = ctx.deps.store.write_file(&ctx.session_id, &resolved, &content).await;
        if !ctx.existing_files.iter().any(|f| f == &resolved) {
            ctx.existing_files.push(resolved);
        }
    }
}

/// Parses `"{filepath}: unresolved import '{specifier}'"`, the format Verify
/// emits (spec §4.8 `scan_missing_imports`).
fn parse_missing_import(entry: &str) -> Option<(String, String)> {
    let (filepath, rest) = entry.split_once(": unresolved import '")?;
    let specifier = rest.strip_suffix('\'')?;
    Some((filepath.to_string(), specifier.to_string()))
}

/// Builds `filesToFix` (files with lint errors, plus type-check error file
/// references, defaulting to the entrypoint if none can be inferred) and
/// `sourceModules`, the subset that another file's type error names as the
/// module it imports from (spec §4.9 step 4).
fn files_to_fix(errors: &VerificationErrors) -> (Vec<String>, BTreeSet<String>) {
    let mut files = BTreeSet::new();
    for result in &errors.lint_results {
        if result.error_count > 0 {
            files.insert(result.filepath.clone());
        }
    }
    let mut any_type_error = false;
    for line in &errors.tsc_errors {
        any_type_error = true;
        if let Some(file) = tsc_error_filepath(line) {
            files.insert(file);
        }
    }
    for entry in &errors.missing_import_errors {
        if let Some((source_file, _)) = parse_missing_import(entry) {
            files.insert(source_file);
        }
    }
    if any_type_error && files.is_empty() {
        files.insert(APP_ENTRYPOINT.to_string());
    }

    let mut source_modules = BTreeSet::new();
    for entry in &errors.missing_import_errors {
        let Some((source_file, specifier)) = parse_missing_import(entry) else {
            continue;
        };
        let base_dir = match source_file.rfind('/') {
            Some(idx) => &source_file[..idx],
            None => "",
        };
        if let Some(resolved) = preflight::relative_candidates(base_dir, &specifier)
            .into_iter()
            .find(|candidate| files.contains(candidate))
        {
            source_modules.insert(resolved);
        }
    }

    (files.into_iter().collect(), source_modules)
}

/// Snapshots every file about to be repaired into `ctx.file_checkpoint`
/// (spec §4.9 step 5), valid until the next clean Verify or Repair exit.
async fn checkpoint(ctx: &mut PipelineContext, files: &[String]) {
    ctx.file_checkpoint.clear();
    for path in files {
        if let Ok(content) = ctx.deps.store.read_file(&ctx.session_id, path).await {
            ctx.file_checkpoint.insert(path.clone(), content);
        }
    }
}

/// Classifies which error-strategy blocks apply to `path`, for the repair
/// prompt's strategy section (spec §4.9 step 6: "a strategy block chosen by
/// error classes present").
fn strategy_block(path: &str, errors: &VerificationErrors) -> String {
    let mut classes = Vec::new();
    let has_lint = errors.lint_results.iter().any(|r| r.filepath == path && r.error_count > 0);
    let has_type = errors.tsc_errors.iter().any(|line| tsc_error_filepath(line).as_deref() == Some(path));
    let has_import = errors.missing_import_errors.iter().any(|e| e.starts_with(&format!("{path}:")));
    let has_unused = errors
        .lint_results
        .iter()
        .any(|r| r.filepath == path && r.messages.iter().any(|m| m.to_lowercase().contains("unused")));

    if has_import {
        classes.push("Fix or remove unresolved imports; only import files that exist.");
    }
    if has_type {
        classes.push("Fix type errors: align declared and actual types, add missing type annotations.");
    }
    if has_unused {
        classes.push("Remove unused variables, imports, and parameters.");
    }
    if has_lint && classes.len() == 1 && !has_unused {
        classes.push("Fix remaining lint violations without changing behavior.");
    }
    if classes.is_empty() {
        classes.push("Fix the syntax error preventing this file from parsing.");
    }
    classes.join(" ")
}

fn format_error_report(path: &str, errors: &VerificationErrors) -> String {
    let mut lines = Vec::new();
    for result in &errors.lint_results {
        if result.filepath == path {
            lines.extend(result.messages.iter().cloned());
        }
    }
    for line in &errors.tsc_errors {
        if tsc_error_filepath(line).as_deref() == Some(path) {
            lines.push(line.clone());
        }
    }
    for entry in &errors.missing_import_errors {
        if entry.starts_with(&format!("{path}:")) {
            lines.push(entry.clone());
        }
    }
    lines.join("\n")
}

async fn repair_batch(
    ctx: &PipelineContext,
    executor: &Arc<Executor>,
    errors: &VerificationErrors,
    existing_files: &HashSet<String>,
    paths: Vec<String>,
    concurrency: usize,
) {
    let store = ctx.deps.store.clone();
    let session_id = ctx.session_id.clone();
    let max_regen = ctx.deps.policy.max_import_repair_regen_attempts;

    let outcomes: Vec<(String, Result<String, String>)> = stream::iter(paths.into_iter().map(|path| {
        let store = store.clone();
        let session_id = session_id.clone();
        let executor = executor.clone();
        let existing_files = existing_files.clone();
        let report = format_error_report(&path, errors);
        let strategy = strategy_block(&path, errors);
        async move {
            let prior = store.read_file(&session_id, &path).await.unwrap_or_default();
            let result = repair_one_file(&executor, &path, &prior, &report, &strategy, &existing_files, max_regen).await;
            (path, result)
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    for (path, result) in outcomes {
        if let Ok(content) = result {
            let _ = store.write_file(&session_id, &path, &content).await;
        }
    }
}

/// Generates repaired content for one file, retrying through Import
/// Preflight up to `max_regen` times with feedback naming what's still
/// missing (spec §4.9 step 6).
async fn repair_one_file(
    executor: &Arc<Executor>,
    path: &str,
    prior_content: &str,
    error_report: &str,
    strategy: &str,
    existing_files: &HashSet<String>,
    max_regen: usize,
) -> Result<String, String> {
    let prompt = format!("Fix the following errors in this file.\n\nErrors:\n{error_report}\n\nStrategy: {strategy}");
    let file_manifest: Vec<String> = existing_files.iter().cloned().collect();
    let related_files = std::collections::BTreeMap::new();
    let mut feedback: Option<String> = None;

    for attempt in 0..=max_regen {
        let request = ExecutorRequest {
            session_id: "repair",
            filepath: path,
            prompt: &prompt,
            file_manifest: &file_manifest,
            prior_content: Some(prior_content),
            related_files: &related_files,
            feedback: feedback.as_deref(),
        };
        let generated = executor.generate(request).await.map_err(|e| e.to_string())?;
        let planned: HashSet<String> = HashSet::new();
        let preflight = preflight::check(path, &generated, existing_files, &planned, &HashSet::new());
        if preflight.is_ok() || attempt == max_regen {
            return Ok(generated);
        }
        feedback = Some(preflight.feedback_prompt());
    }
    unreachable!("loop always returns by the final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_spec::LintFileResult;

    #[test]
    fn parses_missing_import_entry() {
        let (file, specifier) = parse_missing_import("src/App.tsx: unresolved import './Btn'").unwrap();
        assert_eq!(file, "src/App.tsx");
        assert_eq!(specifier, "./Btn");
    }

    #[test]
    fn files_to_fix_unions_lint_and_type_errors() {
        let errors = VerificationErrors {
            lint_results: vec![LintFileResult {
                filepath: "src/A.tsx".into(),
                messages: vec!["unused var 'x'".into()],
                error_count: 1,
                warning_count: 0,
            }],
            tsc_errors: vec!["src/B.tsx(1,1): error TS2304: Cannot find name 'y'.".into()],
            missing_import_errors: vec![],
        };
        let (files, _) = files_to_fix(&errors);
        assert_eq!(files, vec!["src/A.tsx".to_string(), "src/B.tsx".to_string()]);
    }

    #[test]
    fn no_attributable_file_falls_back_to_entrypoint() {
        let errors = VerificationErrors {
            tsc_errors: vec!["non-matching error line".into()],
            ..Default::default()
        };
        let (files, _) = files_to_fix(&errors);
        assert_eq!(files, vec![APP_ENTRYPOINT.to_string()]);
    }

    #[test]
    fn missing_import_target_is_a_source_module() {
        let errors = VerificationErrors {
            missing_import_errors: vec!["src/App.tsx: unresolved import './Btn'".into()],
            lint_results: vec![LintFileResult {
                filepath: "src/Btn.tsx".into(),
                messages: vec!["syntax error".into()],
                error_count: 1,
                warning_count: 0,
            }],
            ..Default::default()
        };
        let (files, sources) = files_to_fix(&errors);
        assert!(files.contains(&"src/Btn.tsx".to_string()));
        assert!(sources.contains("src/Btn.tsx"));
    }

    #[test]
    fn strategy_block_flags_import_errors() {
        let errors = VerificationErrors {
            missing_import_errors: vec!["src/App.tsx: unresolved import './Btn'".into()],
            ..Default::default()
        };
        let block = strategy_block("src/App.tsx", &errors);
        assert!(block.to_lowercase().contains("import"));
    }

    #[tokio::test]
    async fn regression_reverts_checkpointed_files() {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(workspace::Store::new(root.path().to_path_buf()));
        store.ensure("s1").await.unwrap();
        store.write_file("s1", "src/A.tsx", "broken v2").await.unwrap();

        let (bus, _rx) = crate::events::EventBus::new();
        let deps = crate::pipeline::PipelineDeps {
            store: store.clone(),
            serializer: Arc::new(workspace::PerFileSerializer::new()),
            llm: Arc::new(crate::llm::MockLlmProvider::with_text("export function A() {}")),
            policy: config::PolicyConfig::default(),
            dev_servers: std::sync::Arc::new(crate::dev_server::DevServerRegistry::default()),
        };
        let mut ctx = PipelineContext::new(deps, bus, "s1".to_string(), store.session_dir("s1"), false, vec![]);
        ctx.repair_retry_count = 1; // simulate: this is the second attempt
        ctx.previous_error_count = Some(1);
        ctx.file_checkpoint.insert("src/A.tsx".to_string(), "good v1".to_string());
        ctx.verification_errors = Some(VerificationErrors {
            lint_results: vec![LintFileResult {
                filepath: "src/A.tsx".into(),
                messages: vec!["syntax error".into()],
                error_count: 3,
                warning_count: 0,
            }],
            ..Default::default()
        });

        RepairPhase.execute(&mut ctx).await.unwrap();

        let content = store.read_file("s1", "src/A.tsx").await.unwrap();
        assert_eq!(content, "export function A() {}"); // reverted then re-repaired by the mock provider
    }

    #[tokio::test]
    async fn retry_cap_clears_errors_and_continues() {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(workspace::Store::new(root.path().to_path_buf()));
        store.ensure("s1").await.unwrap();
        let (bus, _rx) = crate::events::EventBus::new();
        let deps = crate::pipeline::PipelineDeps {
            store: store.clone(),
            serializer: Arc::new(workspace::PerFileSerializer::new()),
            llm: Arc::new(crate::llm::MockLlmProvider::default()),
            policy: config::PolicyConfig::default(),
            dev_servers: std::sync::Arc::new(crate::dev_server::DevServerRegistry::default()),
        };
        let mut ctx = PipelineContext::new(deps, bus, "s1".to_string(), store.session_dir("s1"), false, vec![]);
        ctx.repair_retry_count = config::PolicyConfig::default().max_repair_retries;
        ctx.verification_errors = Some(VerificationErrors {
            tsc_errors: vec!["still broken".into()],
            ..Default::default()
        });
        let result = RepairPhase.execute(&mut ctx).await.unwrap();
        assert_eq!(result, PhaseResult::Continue);
        assert!(ctx.verification_errors.is_none());
    }

    #[tokio::test]
    async fn no_verification_errors_is_a_noop_continue() {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(workspace::Store::new(root.path().to_path_buf()));
        let (bus, _rx) = crate::events::EventBus::new();
        let deps = crate::pipeline::PipelineDeps {
            store: store.clone(),
            serializer: Arc::new(workspace::PerFileSerializer::new()),
            llm: Arc::new(crate::llm::MockLlmProvider::default()),
            policy: config::PolicyConfig::default(),
            dev_servers: std::sync::Arc::new(crate::dev_server::DevServerRegistry::default()),
        };
        let mut ctx = PipelineContext::new(deps, bus, "s1".to_string(), store.session_dir("s1"), false, vec![]);
        let result = RepairPhase.execute(&mut ctx).await.unwrap();
        assert_eq!(result, PhaseResult::Continue);
    }
}
