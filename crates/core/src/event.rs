//! Request-level streaming events.
//!
//! `StreamEvent` is the ordered external event sequence a caller sees
//! for one request, forwarded over SSE or consumed in-process by the
//! non-streaming endpoint:
//! - `progress`     — a pipeline stage started
//! - `sources`      — the sources included in the assembled context
//! - `answer_chunk` — partial answer text from the LLM
//! - `citation`     — a verified citation from the finished answer
//! - `done`         — terminal, successful
//! - `error`        — terminal, failed
//!
//! Exactly one terminal event per request; nothing follows it.

use crate::query::ChunkLocation;
use serde::{Deserialize, Serialize};

/// Pipeline stages, reported via `progress` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    IntentClassify,
    Retrieve,
    Grade,
    Rewrite,
    Assemble,
    Generate,
    Verify,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntentClassify => "intent_classify",
            Self::Retrieve => "retrieve",
            Self::Grade => "grade",
            Self::Rewrite => "rewrite",
            Self::Assemble => "assemble",
            Self::Generate => "generate",
            Self::Verify => "verify",
        }
    }
}

/// One source included in the assembled context, as shown to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    /// The chunk or memory snippet text.
    pub content: String,

    /// Relevance score after grading/reranking.
    pub score: f32,

    /// Source metadata: document id, chunk id, location, kind.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Events emitted while answering a single request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A pipeline stage started.
    Progress { message: String, stage: Stage },

    /// Sources included in the context, emitted before any answer text.
    Sources {
        sources: Vec<SourceInfo>,
        count: usize,
    },

    /// Partial answer text, in generation order.
    AnswerChunk { chunk: String },

    /// A verified citation from the finished answer.
    Citation {
        doc_id: String,
        quote: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<ChunkLocation>,
    },

    /// The request completed — final event on success.
    Done { conversation_id: String },

    /// The request failed — final event on error.
    Error { message: String },
}

impl StreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Sources { .. } => "sources",
            Self::AnswerChunk { .. } => "answer_chunk",
            Self::Citation { .. } => "citation",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this event terminates the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_progress() {
        let event = StreamEvent::Progress {
            message: "Searching documents".into(),
            stage: Stage::Retrieve,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"progress""#));
        assert!(json.contains(r#""stage":"retrieve""#));
    }

    #[test]
    fn event_serialization_sources() {
        let event = StreamEvent::Sources {
            sources: vec![SourceInfo {
                content: "chunk text".into(),
                score: 0.9,
                metadata: serde_json::Map::new(),
            }],
            count: 1,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"sources""#));
        assert!(json.contains(r#""count":1"#));
    }

    #[test]
    fn event_serialization_citation_without_location() {
        let event = StreamEvent::Citation {
            doc_id: "doc-1".into(),
            quote: "quoted text".into(),
            location: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"citation""#));
        assert!(!json.contains("location"));
    }

    #[test]
    fn terminal_events() {
        assert!(
            StreamEvent::Done {
                conversation_id: "c".into()
            }
            .is_terminal()
        );
        assert!(
            StreamEvent::Error {
                message: "boom".into()
            }
            .is_terminal()
        );
        assert!(
            !StreamEvent::AnswerChunk { chunk: "x".into() }.is_terminal()
        );
    }

    #[test]
    fn event_type_names() {
        assert_eq!(
            StreamEvent::AnswerChunk { chunk: "x".into() }.event_type(),
            "answer_chunk"
        );
        assert_eq!(
            StreamEvent::Done {
                conversation_id: "x".into()
            }
            .event_type(),
            "done"
        );
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"answer_chunk","chunk":"hi"}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();
        match event {
            StreamEvent::AnswerChunk { chunk } => assert_eq!(chunk, "hi"),
            _ => panic!("Wrong variant"),
        }
    }
}
