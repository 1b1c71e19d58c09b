//! Vector retrieval — delegate a query to the chunk store.

use docloom_core::error::ToolError;
use docloom_core::query::RetrievedChunk;
use docloom_core::retrieval::{ChunkFilter, ChunkStore};
use tracing::debug;

pub async fn run(
    store: &dyn ChunkStore,
    query: &str,
    filter: &ChunkFilter,
    top_k: usize,
) -> Result<Vec<RetrievedChunk>, ToolError> {
    let chunks = store
        .search(query, filter, top_k)
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            tool: "vector_retrieve",
            reason: e.to_string(),
        })?;

    debug!(count = chunks.len(), store = store.name(), "Retrieved chunks");
    Ok(chunks)
}
