//! Static chunk store — a pre-embedded corpus held in memory.
//!
//! The corpus arrives pre-chunked (ingestion is upstream). Each chunk
//! carries its text, source document, optional location, and an
//! embedding. Search embeds the query and ranks by cosine similarity;
//! without an embedder it falls back to token-overlap scoring so the
//! store stays usable in tests and offline setups.

use crate::vector::cosine_similarity;
use async_trait::async_trait;
use docloom_core::error::RetrievalError;
use docloom_core::llm::LanguageModel;
use docloom_core::query::{ChunkLocation, RetrievedChunk};
use docloom_core::retrieval::{ChunkFilter, ChunkStore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// One corpus record as stored on disk (JSON array of these).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: String,
    pub document_id: String,
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default)]
    pub location: ChunkLocation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// An in-memory corpus over pre-chunked documents.
pub struct StaticChunkStore {
    chunks: Vec<IndexedChunk>,
    embedder: Option<Arc<dyn LanguageModel>>,
}

impl StaticChunkStore {
    pub fn new(chunks: Vec<IndexedChunk>, embedder: Option<Arc<dyn LanguageModel>>) -> Self {
        Self { chunks, embedder }
    }

    /// An empty corpus. Searches return empty results.
    pub fn empty() -> Self {
        Self::new(Vec::new(), None)
    }

    /// Load a corpus from a JSON file (an array of [`IndexedChunk`]).
    pub fn from_json_file(
        path: &Path,
        embedder: Option<Arc<dyn LanguageModel>>,
    ) -> Result<Self, RetrievalError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RetrievalError::Unavailable(format!("Failed to read corpus {}: {e}", path.display()))
        })?;
        let chunks: Vec<IndexedChunk> = serde_json::from_str(&content).map_err(|e| {
            RetrievalError::Unavailable(format!("Failed to parse corpus {}: {e}", path.display()))
        })?;
        info!(count = chunks.len(), path = %path.display(), "Loaded corpus");
        Ok(Self::new(chunks, embedder))
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn passes(chunk: &IndexedChunk, filter: &ChunkFilter) -> bool {
        if !filter.allows_document(&chunk.document_id) {
            return false;
        }
        match (&filter.project_id, &chunk.project_id) {
            (Some(wanted), Some(actual)) => wanted == actual,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    /// Token-overlap score in [0, 1]: fraction of distinct query tokens
    /// present in the chunk. Used when no embedder is configured.
    fn overlap_score(query: &str, text: &str) -> f32 {
        let query_tokens: HashSet<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if query_tokens.is_empty() {
            return 0.0;
        }
        let text_lower = text.to_lowercase();
        let hits = query_tokens
            .iter()
            .filter(|t| text_lower.contains(t.as_str()))
            .count();
        hits as f32 / query_tokens.len() as f32
    }

    fn to_retrieved(chunk: &IndexedChunk, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            id: chunk.id.clone(),
            document_id: chunk.document_id.clone(),
            text: chunk.text.clone(),
            score,
            location: (!chunk.location.is_empty()).then(|| chunk.location.clone()),
        }
    }
}

#[async_trait]
impl ChunkStore for StaticChunkStore {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(
        &self,
        query: &str,
        filter: &ChunkFilter,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        if self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = match &self.embedder {
            Some(embedder) => match embedder.embed(&[query.to_string()]).await {
                Ok(mut embeddings) if !embeddings.is_empty() => Some(embeddings.remove(0)),
                Ok(_) => None,
                Err(e) => {
                    warn!(error = %e, "Query embedding failed, using keyword overlap");
                    None
                }
            },
            None => None,
        };

        let mut scored: Vec<RetrievedChunk> = self
            .chunks
            .iter()
            .filter(|c| Self::passes(c, filter))
            .map(|c| {
                let score = match (&query_embedding, &c.embedding) {
                    (Some(qe), Some(ce)) => cosine_similarity(qe, ce),
                    _ => Self::overlap_score(query, &c.text),
                };
                Self::to_retrieved(c, score)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, doc: &str, text: &str, embedding: Option<Vec<f32>>) -> IndexedChunk {
        IndexedChunk {
            id: id.into(),
            document_id: doc.into(),
            text: text.into(),
            project_id: None,
            location: ChunkLocation::default(),
            embedding,
        }
    }

    #[tokio::test]
    async fn empty_corpus_returns_empty_not_error() {
        let store = StaticChunkStore::empty();
        let results = store
            .search("anything", &ChunkFilter::default(), 5)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn embedded_search_ranks_by_cosine() {
        let chunks = vec![
            chunk("c1", "d1", "alpha", Some(vec![1.0, 0.0])),
            chunk("c2", "d1", "beta", Some(vec![0.0, 1.0])),
            chunk("c3", "d2", "gamma", Some(vec![0.7, 0.7])),
        ];

        struct FixedEmbedder;
        #[async_trait]
        impl LanguageModel for FixedEmbedder {
            fn name(&self) -> &str {
                "fixed"
            }
            async fn complete(
                &self,
                _r: docloom_core::llm::GenerationRequest,
            ) -> Result<docloom_core::llm::GenerationResult, docloom_core::error::GenerationError>
            {
                unreachable!("not used")
            }
            async fn embed(
                &self,
                texts: &[String],
            ) -> Result<Vec<Vec<f32>>, docloom_core::error::GenerationError> {
                Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
            }
        }

        let store = StaticChunkStore::new(chunks, Some(Arc::new(FixedEmbedder)));
        let results = store
            .search("query", &ChunkFilter::default(), 2)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "c1");
        assert_eq!(results[1].id, "c3");
    }

    #[tokio::test]
    async fn keyword_fallback_without_embedder() {
        let chunks = vec![
            chunk("c1", "d1", "the borrow checker enforces ownership", None),
            chunk("c2", "d1", "tea is brewed from leaves", None),
        ];
        let store = StaticChunkStore::new(chunks, None);

        let results = store
            .search("borrow checker", &ChunkFilter::default(), 5)
            .await
            .unwrap();
        assert_eq!(results[0].id, "c1");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn document_filter_applies_before_scoring() {
        let chunks = vec![
            chunk("c1", "d1", "alpha text", None),
            chunk("c2", "d2", "alpha text", None),
        ];
        let store = StaticChunkStore::new(chunks, None);

        let filter = ChunkFilter {
            document_ids: Some(vec!["d2".into()]),
            project_id: None,
        };
        let results = store.search("alpha", &filter, 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "d2");
    }

    #[tokio::test]
    async fn project_filter_excludes_untagged_chunks() {
        let mut tagged = chunk("c1", "d1", "alpha", None);
        tagged.project_id = Some("p1".into());
        let untagged = chunk("c2", "d2", "alpha", None);

        let store = StaticChunkStore::new(vec![tagged, untagged], None);
        let filter = ChunkFilter {
            document_ids: None,
            project_id: Some("p1".into()),
        };
        let results = store.search("alpha", &filter, 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "c1");
    }

    #[test]
    fn corpus_json_roundtrip() {
        let chunks = vec![chunk("c1", "d1", "text", Some(vec![0.5, 0.5]))];
        let json = serde_json::to_string(&chunks).unwrap();
        let parsed: Vec<IndexedChunk> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].embedding.as_deref(), Some(&[0.5f32, 0.5][..]));
    }
}
