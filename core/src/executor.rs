//! Executor (spec §4.11): the constrained single-file code generator used
//! by Execute and Repair.
//!
//! Grounded on the teacher's `LlmClient` trait boundary (`loom/src/llm/
//! mod.rs`) for the provider call itself, and on the robust-JSON-parsing
//! posture of `protocol/mod.rs`'s round-trip tests for why generated code
//! is never trusted verbatim: a single outermost fenced block is stripped
//! if the model leaked one (`crate::parsing::strip_code_fence`).

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use crate::llm::{LLMProvider, LlmError, LlmMessage};
use crate::parsing::strip_code_fence;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("provider: {0}")]
    Provider(#[from] LlmError),
    #[error("executor call timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider returned empty code for {0}")]
    Empty(String),
}

/// One file-generation request.
pub struct ExecutorRequest<'a> {
    pub session_id: &'a str,
    pub filepath: &'a str,
    pub prompt: &'a str,
    /// Exact import paths available to the model (the session's file
    /// manifest), so it names real files rather than guessing.
    pub file_manifest: &'a [String],
    /// Prior content, for edits; `None` for a fresh `create_file`.
    pub prior_content: Option<&'a str>,
    /// Sibling files related by import, keyed by path (spec §4.7 edit_file
    /// related-files resolution).
    pub related_files: &'a BTreeMap<String, String>,
    /// Extra feedback appended to the system prompt, used by Repair's
    /// import-preflight retry loop (spec §4.9 step 6).
    pub feedback: Option<&'a str>,
}

/// Whether `filepath` is the application entrypoint -- the one file the
/// single-named-export rule (spec §4.11) does not apply to.
fn is_entrypoint(filepath: &str) -> bool {
    matches!(
        filepath,
        "src/main.tsx" | "src/main.ts" | "src/index.tsx" | "src/index.ts" | "index.tsx" | "index.ts"
    )
}

fn build_system_prompt(req: &ExecutorRequest<'_>) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a constrained single-file code generator. Output raw source code only: \
         no markdown code fences, no commentary before or after the code. ",
    );
    if is_entrypoint(req.filepath) {
        prompt.push_str("This file is the application entrypoint; a default export is allowed. ");
    } else {
        prompt.push_str("Use named exports only; do not use a default export. ");
    }
    prompt.push_str("Never reference an external image URL; generated assets must be local files. ");
    prompt.push_str(&format!("The exact file path you are writing is `{}`. ", req.filepath));
    if !req.file_manifest.is_empty() {
        prompt.push_str(&format!(
            "Existing files you may import from (use these exact paths): {}. ",
            req.file_manifest.join(", ")
        ));
    }
    if let Some(prior) = req.prior_content {
        prompt.push_str(&format!("\n\nCurrent file content to edit:\n{prior}\n"));
    }
    for (path, content) in req.related_files {
        prompt.push_str(&format!("\n\nRelated file `{path}`:\n{content}\n"));
    }
    if let Some(feedback) = req.feedback {
        prompt.push_str(&format!("\n\nPrevious attempt was rejected: {feedback}\n"));
    }
    prompt
}

/// Single-file code generator: a constrained, timeout-bounded LLM call
/// whose output is stripped of any leaked code fence (spec §4.11).
pub struct Executor {
    llm: std::sync::Arc<dyn LLMProvider>,
    timeout: Duration,
}

impl Executor {
    pub fn new(llm: std::sync::Arc<dyn LLMProvider>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    pub async fn generate(&self, req: ExecutorRequest<'_>) -> Result<String, ExecutorError> {
        let system = build_system_prompt(&req);
        let history = vec![LlmMessage {
            role: "user".to_string(),
            content: req.prompt.to_string(),
        }];
        let call = self.llm.generate_text(&system, &history);
        let raw = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result?,
            Err(_) => return Err(ExecutorError::Timeout(self.timeout)),
        };
        let code = strip_code_fence(&raw);
        if code.trim().is_empty() {
            return Err(ExecutorError::Empty(req.filepath.to_string()));
        }
        Ok(code)
    }
}
