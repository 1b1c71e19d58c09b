//! Deterministic fakes for orchestrator tests.

use async_trait::async_trait;
use docloom_core::error::{GenerationError, MemoryError, RetrievalError};
use docloom_core::llm::{GenerationRequest, GenerationResult, LanguageModel};
use docloom_core::memory::{MemoryEntry, MemoryScope, MemoryStore, Turn};
use docloom_core::query::RetrievedChunk;
use docloom_core::retrieval::{ChunkFilter, ChunkStore};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A model that replays scripted responses in order.
///
/// Panics when a call arrives after the script is exhausted, unless
/// built with [`ScriptedModel::failing_after`], in which case extra
/// calls fail with an API error instead.
pub struct ScriptedModel {
    responses: Mutex<Vec<String>>,
    requests: Mutex<Vec<GenerationRequest>>,
    calls: AtomicUsize,
    fail_when_exhausted: bool,
}

impl ScriptedModel {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_when_exhausted: false,
        }
    }

    pub fn failing_after(responses: Vec<&str>) -> Self {
        Self {
            fail_when_exhausted: true,
            ..Self::new(responses)
        }
    }

    /// How many completion calls have been made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in call order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            if self.fail_when_exhausted {
                return Err(GenerationError::ApiError {
                    status_code: 500,
                    message: "scripted model exhausted".into(),
                });
            }
            panic!("ScriptedModel ran out of responses");
        }
        Ok(GenerationResult {
            text: responses.remove(0),
            model: "scripted".into(),
        })
    }
}

/// A corpus that always returns the same fixture chunks, filtered and
/// truncated like a real store would.
pub struct FixtureChunkStore {
    chunks: Vec<RetrievedChunk>,
}

impl FixtureChunkStore {
    pub fn new(chunks: Vec<RetrievedChunk>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl ChunkStore for FixtureChunkStore {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn search(
        &self,
        _query: &str,
        filter: &ChunkFilter,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        let mut hits: Vec<RetrievedChunk> = self
            .chunks
            .iter()
            .filter(|c| filter.allows_document(&c.document_id))
            .cloned()
            .collect();
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// A memory store with empty reads that records writes and serves
/// pre-seeded turns as conversation history.
#[derive(Default)]
pub struct RecordingMemory {
    writes: tokio::sync::Mutex<Vec<(String, String, MemoryScope)>>,
    turns: tokio::sync::Mutex<Vec<Turn>>,
    fail_writes: bool,
}

impl RecordingMemory {
    /// A store whose `record_interaction` always errors.
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub async fn push_turn(&self, turn: Turn) {
        self.turns.lock().await.push(turn);
    }

    pub async fn writes(&self) -> Vec<(String, String, MemoryScope)> {
        self.writes.lock().await.clone()
    }
}

#[async_trait]
impl MemoryStore for RecordingMemory {
    fn name(&self) -> &str {
        "recording"
    }

    async fn session_summary(&self, _conversation_id: &str) -> Result<String, MemoryError> {
        Ok(String::new())
    }

    async fn retrieve_relevant(
        &self,
        _query: &str,
        _scope: &MemoryScope,
        _threshold: f32,
        _limit: usize,
    ) -> Result<Vec<MemoryEntry>, MemoryError> {
        Ok(Vec::new())
    }

    async fn record_interaction(
        &self,
        question: &str,
        answer: &str,
        scope: &MemoryScope,
    ) -> Result<String, MemoryError> {
        if self.fail_writes {
            return Err(MemoryError::Storage("disk full".into()));
        }
        self.writes
            .lock()
            .await
            .push((question.to_string(), answer.to_string(), scope.clone()));
        Ok(format!("write-{}", self.writes.lock().await.len()))
    }

    async fn recent_turns(
        &self,
        _conversation_id: &str,
        n: usize,
    ) -> Result<Vec<Turn>, MemoryError> {
        let turns = self.turns.lock().await;
        let start = turns.len().saturating_sub(n);
        Ok(turns[start..].to_vec())
    }
}
