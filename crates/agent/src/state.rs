//! Per-request agent state.
//!
//! One `AgentState` value exists per request, owned by the request's
//! orchestrator task. Nothing here is shared or global — two concurrent
//! requests can never observe each other's intent, chunks, or answer.

use chrono::{DateTime, Utc};
use docloom_core::memory::{MemorySnapshot, Turn};
use docloom_core::query::{Citation, Query, RetrievedChunk};
use docloom_tools::ToolName;
use serde::{Deserialize, Serialize};

/// The classified shape of a question, used to tune retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentProfile {
    /// A single factual lookup.
    Factual,
    /// Contrasts two or more things; retrieval casts a wider net.
    Comparison,
    /// Asks for an overview of a document or topic.
    Summary,
    /// Anything else. Also the fallback when classification fails.
    #[default]
    Generic,
}

impl IntentProfile {
    /// Labels offered to the classifier, safe default last.
    pub const LABELS: [&'static str; 4] = ["factual", "comparison", "summary", "generic"];

    pub fn from_label(label: &str) -> Self {
        match label {
            "factual" => Self::Factual,
            "comparison" => Self::Comparison,
            "summary" => Self::Summary,
            _ => Self::Generic,
        }
    }

    /// Multiplier applied to the configured `top_k` for this intent.
    pub fn top_k_factor(&self) -> usize {
        match self {
            Self::Comparison | Self::Summary => 2,
            Self::Factual | Self::Generic => 1,
        }
    }
}

/// Why a request stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Completed,
    Failed,
    Cancelled,
    MaxToolCalls,
}

/// One tool invocation, recorded for the request trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: ToolName,
    pub ok: bool,
    pub at: DateTime<Utc>,
}

/// All mutable state for one in-flight request.
#[derive(Debug)]
pub struct AgentState {
    /// The inbound query, immutable.
    pub query: Query,

    /// Classified intent (Generic until classification runs).
    pub intent: IntentProfile,

    /// Rewritten query text, set only when the rewrite path ran.
    pub rewritten: Option<String>,

    /// Chunks surviving retrieval and grading, in rank order.
    pub chunks: Vec<RetrievedChunk>,

    /// Session summary and episodic matches.
    pub memory: MemorySnapshot,

    /// The newest turns of this conversation, oldest first. Rewrite
    /// history, and carried verbatim into the generation prompt.
    pub history: Vec<Turn>,

    /// The accumulated answer text.
    pub answer: String,

    /// Verified citations from the finished answer.
    pub citations: Vec<Citation>,

    /// Every tool call made for this request.
    pub tool_calls: Vec<ToolCallRecord>,

    termination: Option<Termination>,
}

impl AgentState {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            intent: IntentProfile::default(),
            rewritten: None,
            chunks: Vec::new(),
            memory: MemorySnapshot::default(),
            history: Vec::new(),
            answer: String::new(),
            citations: Vec::new(),
            tool_calls: Vec::new(),
            termination: None,
        }
    }

    /// The query text retrieval and generation should use: the rewrite
    /// when one exists, the original otherwise.
    pub fn effective_query(&self) -> &str {
        self.rewritten.as_deref().unwrap_or(&self.query.text)
    }

    pub fn record_tool_call(&mut self, tool: ToolName, ok: bool) {
        self.tool_calls.push(ToolCallRecord {
            tool,
            ok,
            at: Utc::now(),
        });
    }

    /// Whether another tool call fits under the budget.
    pub fn can_call_tool(&self, max_tool_calls: usize) -> bool {
        self.tool_calls.len() < max_tool_calls
    }

    /// Set the termination flag. Returns true only for the call that
    /// actually set it; the flag never changes afterwards.
    pub fn finish(&mut self, termination: Termination) -> bool {
        if self.termination.is_some() {
            return false;
        }
        self.termination = Some(termination);
        true
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }
}
