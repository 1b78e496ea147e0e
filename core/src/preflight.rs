//! Import Preflight (spec §4.14): static scan of generated source for
//! unresolved relative imports and unknown package dependencies.
//!
//! New code from spec prose -- the teacher has no import-resolution
//! concept -- but follows its pattern-scanning idiom (`once_cell`-cached
//! `Regex`, as in the teacher's `tools/` source-scanning modules).

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

const RESOLVABLE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "css", "scss", "sass", "less", "svg", "png", "jpg", "jpeg", "gif",
    "webp", "json",
];

static STATIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:import|export)\s+(?:[^'";]*\sfrom\s+)?['"]([^'"]+)['"]"#).unwrap()
});
static DYNAMIC_IMPORT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"import\(\s*['"]([^'"]+)['"]"#).unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreflightResult {
    pub missing_packages: Vec<String>,
    pub missing_relative_imports: Vec<String>,
}

impl PreflightResult {
    pub fn is_ok(&self) -> bool {
        self.missing_packages.is_empty() && self.missing_relative_imports.is_empty()
    }

    /// Feedback prompt fragment naming the missing packages/paths, fed back
    /// to the Executor on an import-preflight retry.
    pub fn feedback_prompt(&self) -> String {
        let mut lines = Vec::new();
        if !self.missing_packages.is_empty() {
            lines.push(format!(
                "These packages are not installed and must not be imported: {}.",
                self.missing_packages.join(", ")
            ));
        }
        if !self.missing_relative_imports.is_empty() {
            lines.push(format!(
                "These relative imports do not resolve to any existing or planned file: {}.",
                self.missing_relative_imports.join(", ")
            ));
        }
        lines.join(" ")
    }
}

pub(crate) fn extract_specifiers(source: &str) -> Vec<String> {
    let mut specifiers: Vec<String> = STATIC_IMPORT
        .captures_iter(source)
        .map(|c| c[1].to_string())
        .collect();
    specifiers.extend(DYNAMIC_IMPORT.captures_iter(source).map(|c| c[1].to_string()));
    specifiers
}

pub(crate) fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

fn is_url_or_absolute(specifier: &str) -> bool {
    specifier.starts_with('/') || specifier.contains("://")
}

/// The root package name for a bare specifier: `@scope/name` keeps both
/// segments, everything else keeps only the first path segment.
fn package_root(specifier: &str) -> String {
    if let Some(rest) = specifier.strip_prefix('@') {
        let mut parts = rest.splitn(2, '/');
        let scope = parts.next().unwrap_or_default();
        let name = parts.next().and_then(|r| r.split('/').next()).unwrap_or_default();
        format!("@{scope}/{name}")
    } else {
        specifier.split('/').next().unwrap_or(specifier).to_string()
    }
}

/// Candidate resolved paths for a relative specifier: the literal path,
/// each extension appended, and `/index.<ext>` under it as a directory.
pub(crate) fn relative_candidates(base_dir: &str, specifier: &str) -> Vec<String> {
    let joined = normalize_join(base_dir, specifier);
    let mut candidates = vec![joined.clone()];
    for ext in RESOLVABLE_EXTENSIONS {
        candidates.push(format!("{joined}.{ext}"));
        candidates.push(format!("{joined}/index.{ext}"));
    }
    candidates
}

fn normalize_join(base_dir: &str, specifier: &str) -> String {
    let mut stack: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    stack.join("/")
}

/// Runs preflight over one file's source.
///
/// * `filepath` — the file's own path, used to resolve its relative imports.
/// * `existing_files` / `planned_paths` — session files on disk, and paths
///   the plan is about to create (either satisfies a relative import).
/// * `installed_packages` — root package names from the manifest.
pub fn check(
    filepath: &str,
    source: &str,
    existing_files: &HashSet<String>,
    planned_paths: &HashSet<String>,
    installed_packages: &HashSet<String>,
) -> PreflightResult {
    let base_dir = match filepath.rfind('/') {
        Some(idx) => &filepath[..idx],
        None => "",
    };

    let mut missing_packages = Vec::new();
    let mut missing_relative_imports = Vec::new();

    for specifier in extract_specifiers(source) {
        if is_url_or_absolute(&specifier) {
            continue;
        }
        if is_relative(&specifier) {
            let satisfied = relative_candidates(base_dir, &specifier)
                .iter()
                .any(|candidate| existing_files.contains(candidate) || planned_paths.contains(candidate));
            if !satisfied {
                missing_relative_imports.push(specifier);
            }
        } else {
            let root = package_root(&specifier);
            if !installed_packages.contains(&root) {
                missing_packages.push(root);
            }
        }
    }

    missing_packages.sort();
    missing_packages.dedup();
    missing_relative_imports.sort();
    missing_relative_imports.dedup();

    PreflightResult {
        missing_packages,
        missing_relative_imports,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolves_existing_relative_import() {
        let source = "import { Button } from './Button';";
        let existing = set(&["src/Button.tsx"]);
        let result = check("src/App.tsx", source, &existing, &HashSet::new(), &HashSet::new());
        assert!(result.is_ok());
    }

    #[test]
    fn flags_missing_relative_import() {
        let source = "import { Button } from './Button';";
        let result = check("src/App.tsx", source, &HashSet::new(), &HashSet::new(), &HashSet::new());
        assert_eq!(result.missing_relative_imports, vec!["./Button".to_string()]);
    }

    #[test]
    fn planned_paths_satisfy_relative_import() {
        let source = "import { Button } from './Button';";
        let planned = set(&["src/Button.tsx"]);
        let result = check("src/App.tsx", source, &HashSet::new(), &planned, &HashSet::new());
        assert!(result.is_ok());
    }

    #[test]
    fn flags_missing_bare_package() {
        let source = "import { z } from 'zod';";
        let result = check("src/App.tsx", source, &HashSet::new(), &HashSet::new(), &HashSet::new());
        assert_eq!(result.missing_packages, vec!["zod".to_string()]);
    }

    #[test]
    fn scoped_package_root_keeps_both_segments() {
        let source = "import { motion } from '@framer/motion';";
        let installed = set(&["@framer/motion"]);
        let result = check("src/App.tsx", source, &HashSet::new(), &HashSet::new(), &installed);
        assert!(result.is_ok());
    }

    #[test]
    fn ignores_absolute_and_url_specifiers() {
        let source = "import x from '/abs/path'; import y from 'https://cdn.example.com/y.js';";
        let result = check("src/App.tsx", source, &HashSet::new(), &HashSet::new(), &HashSet::new());
        assert!(result.is_ok());
    }

    #[test]
    fn dynamic_import_is_scanned_too() {
        let source = "const mod = await import('./lazy');";
        let result = check("src/App.tsx", source, &HashSet::new(), &HashSet::new(), &HashSet::new());
        assert_eq!(result.missing_relative_imports, vec!["./lazy".to_string()]);
    }

    #[test]
    fn feedback_prompt_names_both_kinds() {
        let result = PreflightResult {
            missing_packages: vec!["zod".to_string()],
            missing_relative_imports: vec!["./B".to_string()],
        };
        let prompt = result.feedback_prompt();
        assert!(prompt.contains("zod"));
        assert!(prompt.contains("./B"));
    }
}
