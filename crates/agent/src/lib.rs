//! The question-answering agent.
//!
//! Ties the tool registry, language model, and memory store together
//! into a fixed retrieval-grade-generate-verify pipeline, exposed as an
//! ordered event stream per request.

pub mod citation;
pub mod context;
pub mod emitter;
pub mod orchestrator;
pub mod state;
pub mod token;

#[cfg(test)]
mod test_helpers;

pub use citation::{VerifiedAnswer, verify};
pub use context::{AssembledContext, ContextAssembler};
pub use emitter::{Cancelled, StreamEmitter, encode_line};
pub use orchestrator::{AgentOrchestrator, AnswerResponse, Settings};
pub use state::{AgentState, IntentProfile, Termination, ToolCallRecord};
