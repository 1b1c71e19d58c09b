//! MemoryStore trait — multi-tier conversational memory.
//!
//! Three paths, matching how the agent uses memory:
//! - **Session summary**: a compressed digest of turns older than the
//!   recency window, keeping prompt size bounded on long conversations.
//! - **Episodic retrieval**: semantic search over past Q&A pairs,
//!   scoped to a project and/or conversation.
//! - **Write-back**: append-only recording of a completed turn, off the
//!   response path — a write failure is logged and dropped.

use crate::error::MemoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scope for episodic memory reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl MemoryScope {
    pub fn conversation(id: impl Into<String>) -> Self {
        Self {
            project_id: None,
            conversation_id: Some(id.into()),
        }
    }

    pub fn project(id: impl Into<String>) -> Self {
        Self {
            project_id: Some(id.into()),
            conversation_id: None,
        }
    }
}

/// A stored episodic memory: one past question/answer pair.
///
/// Entries are append-only — newer entries supersede older ones, they
/// are never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique id for this entry.
    pub id: String,

    /// The question that was asked.
    pub question: String,

    /// The answer that was given.
    pub answer: String,

    /// Scope the turn happened in.
    #[serde(default)]
    pub scope: MemoryScope,

    /// When this entry was created.
    pub created_at: DateTime<Utc>,

    /// Similarity score (set by search operations).
    #[serde(default)]
    pub score: f32,

    /// Embedding of question + answer (stored, not serialized).
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

/// One recorded conversation turn, used for rewrite history and the
/// session summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

/// What `memory_retrieve` hands back to the agent.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    /// Compressed digest of older turns ("" for short conversations).
    pub session_summary: String,

    /// Episodic matches at or above the similarity threshold.
    pub episodes: Vec<MemoryEntry>,
}

/// The core MemoryStore trait.
///
/// Implementations: SQLite (persistent), in-memory (tests/ephemeral).
/// Stores are safe for concurrent readers; writes are append-only.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Compressed digest of turns older than the recency window.
    /// Returns an empty string when the conversation is short.
    async fn session_summary(
        &self,
        conversation_id: &str,
    ) -> std::result::Result<String, MemoryError>;

    /// Semantic search over episodic memory, filtered by similarity
    /// threshold and scope. Below-threshold entries are excluded — no
    /// fixed-size fallback.
    async fn retrieve_relevant(
        &self,
        query: &str,
        scope: &MemoryScope,
        threshold: f32,
        limit: usize,
    ) -> std::result::Result<Vec<MemoryEntry>, MemoryError>;

    /// Append a completed turn. Called off the response path; failures
    /// are the caller's to log and drop.
    async fn record_interaction(
        &self,
        question: &str,
        answer: &str,
        scope: &MemoryScope,
    ) -> std::result::Result<String, MemoryError>;

    /// The newest `n` turns of a conversation, oldest first.
    /// Used as rewrite history for follow-up questions.
    async fn recent_turns(
        &self,
        conversation_id: &str,
        n: usize,
    ) -> std::result::Result<Vec<Turn>, MemoryError>;
}
