//! ChunkStore trait — the pre-chunked document corpus.
//!
//! Ingestion and chunking happen upstream; the agent consumes the
//! corpus as a search interface. Implementations wrap a vector
//! database, a local index, or a static fixture in tests.

use crate::error::RetrievalError;
use crate::query::RetrievedChunk;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Restrictions applied *before* scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkFilter {
    /// Only chunks from these documents (None = all documents).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_ids: Option<Vec<String>>,

    /// Only chunks belonging to this project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl ChunkFilter {
    /// Whether a chunk's document passes the document-id restriction.
    pub fn allows_document(&self, document_id: &str) -> bool {
        match &self.document_ids {
            Some(ids) => ids.iter().any(|id| id == document_id),
            None => true,
        }
    }
}

/// The corpus search interface.
///
/// Safe for concurrent readers; the agent never writes to it.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// The backend name (e.g., "static", "pgvector").
    fn name(&self) -> &str;

    /// Return up to `top_k` chunks ordered by descending similarity to
    /// `query`. An empty corpus yields an empty list, not an error.
    async fn search(
        &self,
        query: &str,
        filter: &ChunkFilter,
        top_k: usize,
    ) -> std::result::Result<Vec<RetrievedChunk>, RetrievalError>;
}
