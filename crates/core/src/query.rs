//! Query, chunk, and citation value objects.
//!
//! These are the core values that flow through a single request:
//! the user's `Query` goes in, `RetrievedChunk`s come back from the
//! corpus, and verified `Citation`s come out with the answer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An immutable per-request query.
///
/// Created once per inbound request and never mutated — a rewritten
/// query (pronoun/ellipsis resolution) lives on the request's agent
/// state, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// The user's question, verbatim.
    pub text: String,

    /// Restrict retrieval to these document ids (None = whole corpus).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_ids: Option<Vec<String>>,

    /// Project / topic scope for retrieval and memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Per-request retrieval width override (None = configured default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,

    /// Conversation this question belongs to.
    pub conversation_id: String,
}

impl Query {
    /// Create a query with a fresh conversation id.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            document_ids: None,
            project_id: None,
            top_k: None,
            conversation_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a query inside an existing conversation.
    pub fn in_conversation(text: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            document_ids: None,
            project_id: None,
            top_k: None,
            conversation_id: conversation_id.into(),
        }
    }

    /// Restrict retrieval to the given document ids.
    pub fn with_documents(mut self, ids: Vec<String>) -> Self {
        self.document_ids = Some(ids);
        self
    }

    /// Scope retrieval and memory to a project.
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Override the configured retrieval width for this request.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

/// Where a chunk sits inside its source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkLocation {
    /// Page number for paginated documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Offset in seconds for time-based media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_secs: Option<f64>,
}

impl ChunkLocation {
    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            timestamp_secs: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.page.is_none() && self.timestamp_secs.is_none()
    }
}

/// A chunk returned from the corpus by vector retrieval.
///
/// Immutable once retrieved — grading and reranking filter and reorder
/// chunks, they never edit them. The literal `text` is the unit that
/// citations quote from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Stable chunk identifier within the corpus.
    pub id: String,

    /// The document this chunk was cut from.
    pub document_id: String,

    /// Literal chunk text as indexed.
    pub text: String,

    /// Similarity score from retrieval (higher = more relevant).
    pub score: f32,

    /// Optional location within the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<ChunkLocation>,
}

impl RetrievedChunk {
    pub fn new(
        id: impl Into<String>,
        document_id: impl Into<String>,
        text: impl Into<String>,
        score: f32,
    ) -> Self {
        Self {
            id: id.into(),
            document_id: document_id.into(),
            text: text.into(),
            score,
            location: None,
        }
    }

    pub fn with_location(mut self, location: ChunkLocation) -> Self {
        self.location = Some(location);
        self
    }
}

/// A verified citation: a verbatim quote from a chunk that was part of
/// this request's assembled context.
///
/// Candidate citations extracted from the generated answer only become
/// `Citation` values after the quote has been checked against the
/// literal chunk text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Document the quote comes from.
    pub doc_id: String,

    /// The quoted text, verbatim from the chunk.
    pub quote: String,

    /// Location of the source chunk, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<ChunkLocation>,
}
