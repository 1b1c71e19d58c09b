//! Retrieval and refinement tools for the Docloom agent.
//!
//! The tool surface is a closed set: every tool, its input, and its
//! output are enum variants, and dispatch is a `match`. There is no
//! dynamic registration — the orchestrator can only ask for tools that
//! exist, checked at compile time.
//!
//! Tools are stateless facades over the shared stores and the model.
//! They never retry internally; the orchestrator decides what a failure
//! means (usually: skip the refinement and keep the input).

pub mod grade;
pub mod memory_retrieve;
pub mod query_rewrite;
pub mod rerank;
pub mod vector_retrieve;

use docloom_core::error::ToolError;
use docloom_core::llm::LanguageModel;
use docloom_core::memory::{MemoryScope, MemorySnapshot, MemoryStore, Turn};
use docloom_core::query::RetrievedChunk;
use docloom_core::retrieval::{ChunkFilter, ChunkStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Every tool the agent can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    VectorRetrieve,
    Rerank,
    Grade,
    QueryRewrite,
    MemoryRetrieve,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::VectorRetrieve => "vector_retrieve",
            ToolName::Rerank => "rerank",
            ToolName::Grade => "grade",
            ToolName::QueryRewrite => "query_rewrite",
            ToolName::MemoryRetrieve => "memory_retrieve",
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed tool invocation.
#[derive(Debug, Clone)]
pub enum ToolInput {
    VectorRetrieve {
        query: String,
        filter: ChunkFilter,
        top_k: usize,
    },
    Rerank {
        query: String,
        chunks: Vec<RetrievedChunk>,
        top_k: usize,
    },
    Grade {
        query: String,
        chunks: Vec<RetrievedChunk>,
    },
    QueryRewrite {
        question: String,
        history: Vec<Turn>,
    },
    MemoryRetrieve {
        query: String,
        scope: MemoryScope,
    },
}

impl ToolInput {
    pub fn name(&self) -> ToolName {
        match self {
            ToolInput::VectorRetrieve { .. } => ToolName::VectorRetrieve,
            ToolInput::Rerank { .. } => ToolName::Rerank,
            ToolInput::Grade { .. } => ToolName::Grade,
            ToolInput::QueryRewrite { .. } => ToolName::QueryRewrite,
            ToolInput::MemoryRetrieve { .. } => ToolName::MemoryRetrieve,
        }
    }
}

/// A typed tool result, one variant per tool.
#[derive(Debug, Clone)]
pub enum ToolOutput {
    VectorRetrieve(Vec<RetrievedChunk>),
    Rerank(Vec<RetrievedChunk>),
    Grade(Vec<RetrievedChunk>),
    QueryRewrite(String),
    MemoryRetrieve(MemorySnapshot),
}

/// The closed tool set, bound to its collaborators.
pub struct ToolRegistry {
    chunk_store: Arc<dyn ChunkStore>,
    model: Arc<dyn LanguageModel>,
    memory: Arc<dyn MemoryStore>,
    episodic_threshold: f32,
    episodic_limit: usize,
}

impl ToolRegistry {
    pub fn new(
        chunk_store: Arc<dyn ChunkStore>,
        model: Arc<dyn LanguageModel>,
        memory: Arc<dyn MemoryStore>,
        episodic_threshold: f32,
        episodic_limit: usize,
    ) -> Self {
        Self {
            chunk_store,
            model,
            memory,
            episodic_threshold,
            episodic_limit,
        }
    }

    /// Execute one tool call.
    pub async fn invoke(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        match input {
            ToolInput::VectorRetrieve {
                query,
                filter,
                top_k,
            } => {
                let chunks =
                    vector_retrieve::run(self.chunk_store.as_ref(), &query, &filter, top_k)
                        .await?;
                Ok(ToolOutput::VectorRetrieve(chunks))
            }
            ToolInput::Rerank {
                query,
                chunks,
                top_k,
            } => {
                let reranked = rerank::run(self.model.as_ref(), &query, chunks, top_k).await?;
                Ok(ToolOutput::Rerank(reranked))
            }
            ToolInput::Grade { query, chunks } => {
                let relevant = grade::run(self.model.as_ref(), &query, chunks).await?;
                Ok(ToolOutput::Grade(relevant))
            }
            ToolInput::QueryRewrite { question, history } => {
                let rewritten = query_rewrite::run(self.model.as_ref(), &question, &history).await?;
                Ok(ToolOutput::QueryRewrite(rewritten))
            }
            ToolInput::MemoryRetrieve { query, scope } => {
                let snapshot = memory_retrieve::run(
                    self.memory.as_ref(),
                    &query,
                    &scope,
                    self.episodic_threshold,
                    self.episodic_limit,
                )
                .await;
                Ok(ToolOutput::MemoryRetrieve(snapshot))
            }
        }
    }
}

/// Pull the first JSON array out of model output.
///
/// Models wrap JSON in prose or code fences more often than not; the
/// span between the first `[` and the last `]` is what we parse.
pub(crate) fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
