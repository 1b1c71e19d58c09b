//! LLM endpoint client for Docloom.
//!
//! One implementation of [`docloom_core::LanguageModel`]: an
//! OpenAI-compatible HTTP client. That covers OpenAI, OpenRouter,
//! Ollama, vLLM, and anything else exposing `/v1/chat/completions`.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatClient;

use docloom_config::AppConfig;
use docloom_core::LanguageModel;
use std::sync::Arc;

/// Build the configured language model.
///
/// Returns an error if no API key is available (config or environment).
pub fn build_model(config: &AppConfig) -> docloom_core::Result<Arc<dyn LanguageModel>> {
    let api_key = config
        .model
        .api_key
        .clone()
        .ok_or_else(|| docloom_core::Error::Config {
            message: "No API key configured (set DOCLOOM_API_KEY or model.api_key)".into(),
        })?;

    Ok(Arc::new(OpenAiCompatClient::new(
        &config.model.api_url,
        api_key,
        &config.model.chat_model,
        &config.model.embedding_model,
    )))
}
