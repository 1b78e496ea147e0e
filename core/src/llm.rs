//! `LLMProvider`: the one external dependency the core treats as opaque
//! (spec §1 Non-goals -- "it does not implement its own LLM").
//!
//! Grounded on the shape of the teacher's `LlmClient` trait
//! (`loom/src/llm/mod.rs`): an `invoke`-style async method plus a mock
//! implementation usable in tests without a network call.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider call timed out")]
    Timeout,
    #[error("provider returned empty output")]
    Empty,
    #[error("provider error: {0}")]
    Provider(String),
}

/// One turn of conversation history passed to `generate_json`/`generate_text`.
#[derive(Clone, Debug)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

/// Opaque LLM provider boundary (spec §1): `generateJSON(prompt, history,
/// config) -> text` and `generateImage(prompt) -> bytes`.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Free-form text completion, used for summaries and chat replies.
    async fn generate_text(&self, system: &str, history: &[LlmMessage]) -> Result<String, LlmError>;

    /// Same as `generate_text`, but instructs the provider to prefer a JSON
    /// response. Callers still run the response through the robust parser
    /// in [`crate::parsing`] rather than trusting raw output.
    async fn generate_json(&self, system: &str, history: &[LlmMessage]) -> Result<String, LlmError> {
        self.generate_text(system, history).await
    }

    /// Image generation, used by `generate_image` tasks. Returns raw bytes.
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, LlmError>;
}

/// Deterministic provider for tests and demos: returns canned or
/// echo-derived responses instead of calling out to a real model.
pub struct MockLlmProvider {
    pub text_response: String,
    pub json_response: String,
    pub image_bytes: Vec<u8>,
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self {
            text_response: "Done.".to_string(),
            json_response: "{}".to_string(),
            image_bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }
}

impl MockLlmProvider {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text_response: text.into(),
            ..Self::default()
        }
    }

    pub fn with_json(json: impl Into<String>) -> Self {
        Self {
            json_response: json.into(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl LLMProvider for MockLlmProvider {
    async fn generate_text(&self, _system: &str, _history: &[LlmMessage]) -> Result<String, LlmError> {
        Ok(self.text_response.clone())
    }

    async fn generate_json(&self, _system: &str, _history: &[LlmMessage]) -> Result<String, LlmError> {
        Ok(self.json_response.clone())
    }

    async fn generate_image(&self, _prompt: &str) -> Result<Vec<u8>, LlmError> {
        Ok(self.image_bytes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_returns_configured_text() {
        let provider = MockLlmProvider::with_text("hello");
        let out = provider.generate_text("sys", &[]).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn mock_provider_returns_configured_json() {
        let provider = MockLlmProvider::with_json(r#"{"tasks": []}"#);
        let out = provider.generate_json("sys", &[]).await.unwrap();
        assert_eq!(out, r#"{"tasks": []}"#);
    }

    #[tokio::test]
    async fn mock_provider_returns_image_bytes() {
        let provider = MockLlmProvider::default();
        let bytes = provider.generate_image("a logo").await.unwrap();
        assert!(!bytes.is_empty());
    }
}
