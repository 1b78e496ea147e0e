//! Normalized verification output handed from Verify to Repair (spec §3/§4.8).

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintFileResult {
    pub filepath: String,
    pub messages: Vec<String>,
    pub error_count: usize,
    pub warning_count: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationErrors {
    pub lint_results: Vec<LintFileResult>,
    pub tsc_errors: Vec<String>,
    pub missing_import_errors: Vec<String>,
}

impl VerificationErrors {
    pub fn is_clean(&self) -> bool {
        self.lint_results.iter().all(|r| r.error_count == 0)
            && self.tsc_errors.is_empty()
            && self.missing_import_errors.is_empty()
    }

    /// `currentErrorCount` per spec §4.9: lint errors + type/missing-import
    /// errors summed.
    pub fn total_error_count(&self) -> usize {
        let lint: usize = self.lint_results.iter().map(|r| r.error_count).sum();
        lint + self.tsc_errors.len() + self.missing_import_errors.len()
    }
}
