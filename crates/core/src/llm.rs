//! LanguageModel trait — the abstraction over LLM backends.
//!
//! A LanguageModel knows how to turn a prompt into text, either as a
//! complete response or as a stream of tokens, plus two narrow side
//! capabilities the agent needs: label classification and embeddings.
//!
//! Keeping classification behind `classify()` rather than a raw prompt
//! means orchestration logic and its tests stay deterministic — tests
//! inject a scripted implementation.

use crate::error::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A generation request: one system prompt (the assembled context) and
/// one user message (the question).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// System prompt — for the agent this is the assembled mega-context.
    pub system: String,

    /// The user's (possibly rewritten) question.
    pub user: String,

    /// Temperature (0.0 = deterministic).
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.2
}

impl GenerationRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }
}

/// A complete (non-streaming) generation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// The generated text.
    pub text: String,

    /// Which model actually responded (may differ from requested).
    pub model: String,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenChunk {
    /// Partial content delta.
    pub text: String,

    /// Whether this is the final chunk.
    #[serde(default)]
    pub done: bool,
}

/// The core LanguageModel trait.
///
/// Every LLM backend (OpenAI-compatible endpoint, local server, test
/// fake) implements this trait. The orchestrator calls it without
/// knowing which backend is configured.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai", "scripted").
    fn name(&self) -> &str;

    /// Generate a complete response.
    async fn complete(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResult, GenerationError>;

    /// Generate a stream of token chunks.
    ///
    /// Default implementation calls `complete()` and wraps the result as
    /// a single chunk. Dropping the receiver cancels generation.
    async fn stream(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<TokenChunk, GenerationError>>,
        GenerationError,
    > {
        let result = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = tx
            .send(Ok(TokenChunk {
                text: result.text,
                done: true,
            }))
            .await;
        Ok(rx)
    }

    /// Classify `text` into exactly one of `labels`.
    ///
    /// Default implementation prompts `complete()` and picks the first
    /// label contained in the response, falling back to the last label
    /// (callers place their safe default last).
    async fn classify(
        &self,
        text: &str,
        labels: &[&str],
    ) -> std::result::Result<String, GenerationError> {
        let request = GenerationRequest::new(
            format!(
                "Classify the user text into exactly one of these labels: {}. \
                 Respond with the label only.",
                labels.join(", ")
            ),
            text,
        )
        .with_temperature(0.0)
        .with_max_tokens(16);

        let result = self.complete(request).await?;
        let lower = result.text.to_lowercase();
        let label = labels
            .iter()
            .find(|l| lower.contains(&l.to_lowercase()))
            .or(labels.last())
            .copied()
            .unwrap_or_default();
        Ok(label.to_string())
    }

    /// Generate embeddings for the given texts.
    ///
    /// Default implementation reports that embeddings aren't supported.
    async fn embed(
        &self,
        _texts: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, GenerationError> {
        Err(GenerationError::NotConfigured(format!(
            "Backend '{}' does not support embeddings",
            self.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedModel(&'static str);

    #[async_trait]
    impl LanguageModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResult, GenerationError> {
            Ok(GenerationResult {
                text: self.0.to_string(),
                model: "fixed-model".into(),
            })
        }
    }

    #[tokio::test]
    async fn default_stream_wraps_complete() {
        let model = FixedModel("hello world");
        let mut rx = model
            .stream(GenerationRequest::new("sys", "user"))
            .await
            .unwrap();
        let chunk = rx.recv().await.unwrap().unwrap();
        assert_eq!(chunk.text, "hello world");
        assert!(chunk.done);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn default_classify_matches_label() {
        let model = FixedModel("This looks like a comparison question.");
        let label = model
            .classify("How does A differ from B?", &["factual", "comparison", "generic"])
            .await
            .unwrap();
        assert_eq!(label, "comparison");
    }

    #[tokio::test]
    async fn default_classify_falls_back_to_last_label() {
        let model = FixedModel("no idea");
        let label = model
            .classify("???", &["factual", "comparison", "generic"])
            .await
            .unwrap();
        assert_eq!(label, "generic");
    }

    #[tokio::test]
    async fn default_embed_is_not_configured() {
        let model = FixedModel("x");
        let err = model.embed(&["text".to_string()]).await.unwrap_err();
        assert!(matches!(err, GenerationError::NotConfigured(_)));
    }
}
