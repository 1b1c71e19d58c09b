//! In-memory store — useful for testing and ephemeral sessions.

use crate::{scope_matches, session, vector};
use async_trait::async_trait;
use chrono::Utc;
use docloom_core::error::MemoryError;
use docloom_core::llm::LanguageModel;
use docloom_core::memory::{MemoryEntry, MemoryScope, MemoryStore, Turn};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

/// An in-memory store backed by a Vec.
///
/// Episodes double as turns: an entry recorded with a conversation id is
/// both searchable episodic memory and part of that conversation's
/// history.
pub struct InMemoryStore {
    entries: Arc<RwLock<Vec<MemoryEntry>>>,
    embedder: Option<Arc<dyn LanguageModel>>,
    recency_window: usize,
}

impl InMemoryStore {
    pub fn new(embedder: Option<Arc<dyn LanguageModel>>, recency_window: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            embedder,
            recency_window,
        }
    }

    async fn turns_for(&self, conversation_id: &str) -> Vec<Turn> {
        let entries = self.entries.read().await;
        let mut turns: Vec<&MemoryEntry> = entries
            .iter()
            .filter(|e| e.scope.conversation_id.as_deref() == Some(conversation_id))
            .collect();
        turns.sort_by_key(|e| e.created_at);
        turns
            .into_iter()
            .map(|e| Turn {
                question: e.question.clone(),
                answer: e.answer.clone(),
                created_at: e.created_at,
            })
            .collect()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn session_summary(&self, conversation_id: &str) -> Result<String, MemoryError> {
        let turns = self.turns_for(conversation_id).await;
        Ok(session::digest(&turns, self.recency_window))
    }

    async fn retrieve_relevant(
        &self,
        query: &str,
        scope: &MemoryScope,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        let Some(embedder) = &self.embedder else {
            return Ok(Vec::new());
        };

        let query_embedding = match embedder.embed(&[query.to_string()]).await {
            Ok(mut embeddings) if !embeddings.is_empty() => embeddings.remove(0),
            Ok(_) => return Ok(Vec::new()),
            Err(e) => {
                warn!(error = %e, "Query embedding failed, skipping episodic retrieval");
                return Ok(Vec::new());
            }
        };

        let entries = self.entries.read().await;
        let scoped: Vec<MemoryEntry> = entries
            .iter()
            .filter(|e| scope_matches(scope, &e.scope))
            .cloned()
            .collect();

        Ok(vector::rank_by_similarity(
            &scoped,
            &query_embedding,
            limit,
            threshold,
        ))
    }

    async fn record_interaction(
        &self,
        question: &str,
        answer: &str,
        scope: &MemoryScope,
    ) -> Result<String, MemoryError> {
        let embedding = match &self.embedder {
            Some(embedder) => {
                match embedder.embed(&[format!("{question}\n{answer}")]).await {
                    Ok(mut embeddings) if !embeddings.is_empty() => Some(embeddings.remove(0)),
                    Ok(_) => None,
                    Err(e) => {
                        warn!(error = %e, "Embedding failed, storing turn without one");
                        None
                    }
                }
            }
            None => None,
        };

        let entry = MemoryEntry {
            id: Uuid::new_v4().to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            scope: scope.clone(),
            created_at: Utc::now(),
            score: 0.0,
            embedding,
        };
        let id = entry.id.clone();
        self.entries.write().await.push(entry);
        Ok(id)
    }

    async fn recent_turns(
        &self,
        conversation_id: &str,
        n: usize,
    ) -> Result<Vec<Turn>, MemoryError> {
        let turns = self.turns_for(conversation_id).await;
        let start = turns.len().saturating_sub(n);
        Ok(turns[start..].to_vec())
    }
}
