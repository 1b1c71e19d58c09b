//! Memory and corpus store implementations for Docloom.

pub mod chunk_store;
pub mod in_memory;
pub mod session;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use chunk_store::{IndexedChunk, StaticChunkStore};
pub use in_memory::InMemoryStore;
pub use vector::{cosine_similarity, rank_by_similarity};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use docloom_core::memory::MemoryScope;

/// Whether an entry's scope satisfies a query scope.
///
/// Each field set on the query scope must match the entry; unset query
/// fields match anything. An unscoped query sees all entries.
pub fn scope_matches(query: &MemoryScope, entry: &MemoryScope) -> bool {
    if let Some(project) = &query.project_id {
        if entry.project_id.as_ref() != Some(project) {
            return false;
        }
    }
    if let Some(conversation) = &query.conversation_id {
        if entry.conversation_id.as_ref() != Some(conversation) {
            return false;
        }
    }
    true
}
