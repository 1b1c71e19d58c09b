//! SQLite store — the persistent memory backend.
//!
//! One `episodes` table holds everything: an entry recorded with a
//! conversation id is simultaneously episodic memory (searchable by
//! embedding) and a turn in that conversation's history. Embeddings are
//! stored as little-endian f32 blobs and ranked in process.

use crate::{scope_matches, session, vector};
use async_trait::async_trait;
use chrono::Utc;
use docloom_core::error::MemoryError;
use docloom_core::llm::LanguageModel;
use docloom_core::memory::{MemoryEntry, MemoryScope, MemoryStore, Turn};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A persistent SQLite memory store.
pub struct SqliteStore {
    pool: SqlitePool,
    embedder: Option<Arc<dyn LanguageModel>>,
    recency_window: usize,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables/indexes are created automatically.
    pub async fn new(
        path: &str,
        embedder: Option<Arc<dyn LanguageModel>>,
        recency_window: usize,
    ) -> Result<Self, MemoryError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self {
            pool,
            embedder,
            recency_window,
        };
        store.run_migrations().await?;
        info!("SQLite memory store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(
        pool: SqlitePool,
        embedder: Option<Arc<dyn LanguageModel>>,
        recency_window: usize,
    ) -> Result<Self, MemoryError> {
        let store = Self {
            pool,
            embedder,
            recency_window,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS episodes (
                id              TEXT PRIMARY KEY,
                question        TEXT NOT NULL,
                answer          TEXT NOT NULL,
                project_id      TEXT,
                conversation_id TEXT,
                created_at      TEXT NOT NULL,
                embedding       BLOB
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("episodes table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_episodes_conversation
             ON episodes(conversation_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("conversation index: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_episodes_project ON episodes(project_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("project index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Parse a `MemoryEntry` from a SQLite row.
    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<MemoryEntry, MemoryError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| MemoryError::QueryFailed(format!("id column: {e}")))?;
        let question: String = row
            .try_get("question")
            .map_err(|e| MemoryError::QueryFailed(format!("question column: {e}")))?;
        let answer: String = row
            .try_get("answer")
            .map_err(|e| MemoryError::QueryFailed(format!("answer column: {e}")))?;
        let project_id: Option<String> = row
            .try_get("project_id")
            .map_err(|e| MemoryError::QueryFailed(format!("project_id column: {e}")))?;
        let conversation_id: Option<String> = row
            .try_get("conversation_id")
            .map_err(|e| MemoryError::QueryFailed(format!("conversation_id column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| MemoryError::QueryFailed(format!("created_at column: {e}")))?;

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let embedding: Option<Vec<u8>> = row.try_get("embedding").ok();
        let embedding_vec = embedding.map(|blob| {
            blob.chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect()
        });

        Ok(MemoryEntry {
            id,
            question,
            answer,
            scope: MemoryScope {
                project_id,
                conversation_id,
            },
            created_at,
            score: 0.0,
            embedding: embedding_vec,
        })
    }

    /// Serialize an embedding vector to bytes.
    fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }
}

#[async_trait]
impl MemoryStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn session_summary(&self, conversation_id: &str) -> Result<String, MemoryError> {
        let rows = sqlx::query(
            "SELECT question, answer, created_at FROM episodes
             WHERE conversation_id = ?1 ORDER BY created_at ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("Turn history: {e}")))?;

        let turns: Vec<Turn> = rows
            .iter()
            .filter_map(|row| {
                let question: String = row.try_get("question").ok()?;
                let answer: String = row.try_get("answer").ok()?;
                let created_at_str: String = row.try_get("created_at").ok()?;
                let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());
                Some(Turn {
                    question,
                    answer,
                    created_at,
                })
            })
            .collect();

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

        // Scope filtering happens in process after the embedding scan;
        // the table stays small enough that this beats composing SQL.
        let rows = sqlx::query("SELECT * FROM episodes WHERE embedding IS NOT NULL")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("Embedding scan: {e}")))?;

        let scoped: Vec<MemoryEntry> = rows
            .iter()
            .filter_map(|row| Self::row_to_entry(row).ok())
            .filter(|e| scope_matches(scope, &e.scope))
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

        let id = Uuid::new_v4().to_string();
        let embedding_blob: Option<Vec<u8>> = embedding.as_deref().map(Self::embedding_to_blob);

        sqlx::query(
            r#"
            INSERT INTO episodes (id, question, answer, project_id, conversation_id, created_at, embedding)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&id)
        .bind(question)
        .bind(answer)
        .bind(&scope.project_id)
        .bind(&scope.conversation_id)
        .bind(Utc::now().to_rfc3339())
        .bind(embedding_blob.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT failed: {e}")))?;

        debug!("Stored episode {id}");
        Ok(id)
    }

    async fn recent_turns(
        &self,
        conversation_id: &str,
        n: usize,
    ) -> Result<Vec<Turn>, MemoryError> {
        let rows = sqlx::query(
            "SELECT question, answer, created_at FROM episodes
             WHERE conversation_id = ?1 ORDER BY created_at DESC LIMIT ?2",
        )
        .bind(conversation_id)
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("Recent turns: {e}")))?;

        let mut turns: Vec<Turn> = rows
            .iter()
            .filter_map(|row| {
                let question: String = row.try_get("question").ok()?;
                let answer: String = row.try_get("answer").ok()?;
                let created_at_str: String = row.try_get("created_at").ok()?;
                let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());
                Some(Turn {
                    question,
                    answer,
                    created_at,
                })
            })
            .collect();

        turns.reverse(); // oldest first
        Ok(turns)
    }
}
