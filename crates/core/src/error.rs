//! Error types for the Docloom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Docloom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Retrieval errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Generation errors ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Vector store / corpus failures.
///
/// Always recoverable locally: the orchestrator proceeds with an empty
/// chunk set and lets generation acknowledge the missing context.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Chunk store unreachable: {0}")]
    Unavailable(String),

    #[error("Search failed: {0}")]
    QueryFailed(String),
}

/// Failures inside a single tool invocation.
///
/// Tools never retry internally — the orchestrator decides whether to
/// skip the refinement step or degrade the whole request.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool execution failed: {tool} — {reason}")]
    ExecutionFailed { tool: &'static str, reason: String },

    #[error("Malformed tool output: {tool} — {reason}")]
    MalformedOutput { tool: &'static str, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// LLM endpoint failures. Unrecoverable for the current request once
/// generation has started; surfaced as a terminal `error` stream event.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Model endpoint not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Memory store failures. Reads degrade to empty results; writes are
/// logged and dropped — never surfaced to the caller.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_error_displays_correctly() {
        let err = Error::Retrieval(RetrievalError::Unavailable("connection refused".into()));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::MalformedOutput {
            tool: "rerank",
            reason: "expected a JSON score array".into(),
        });
        assert!(err.to_string().contains("rerank"));
        assert!(err.to_string().contains("score array"));
    }

    #[test]
    fn generation_error_displays_status() {
        let err = Error::Generation(GenerationError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
    }
}
