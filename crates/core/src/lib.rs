//! # Docloom Core
//!
//! Domain types, traits, and error definitions for the Docloom RAG agent.
//! This crate has **zero framework dependencies** — it defines the domain
//! model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (LLM endpoint, chunk store, memory store)
//! is defined as a trait here. Implementations live in their respective
//! crates. This enables:
//! - Swapping implementations via configuration
//! - Deterministic tests with fake/scripted implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod llm;
pub mod memory;
pub mod query;
pub mod retrieval;

// Re-export key types at crate root for ergonomics
pub use error::{Error, GenerationError, MemoryError, Result, RetrievalError, ToolError};
pub use event::{SourceInfo, Stage, StreamEvent};
pub use llm::{GenerationRequest, GenerationResult, LanguageModel, TokenChunk};
pub use memory::{MemoryEntry, MemoryScope, MemorySnapshot, MemoryStore, Turn};
pub use query::{ChunkLocation, Citation, Query, RetrievedChunk};
pub use retrieval::{ChunkFilter, ChunkStore};
