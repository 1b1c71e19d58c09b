//! Memory retrieval — session summary plus episodic matches.
//!
//! The session summary is always conversation-scoped. Episodic search
//! is project-wide when the scope carries a project, so past Q&A from
//! other conversations in the same project is recalled; without a
//! project it falls back to the conversation.
//!
//! Memory reads degrade to empty results: a failing store costs the
//! answer some context, never the answer itself.

use docloom_core::memory::{MemoryScope, MemorySnapshot, MemoryStore};
use tracing::warn;

pub async fn run(
    store: &dyn MemoryStore,
    query: &str,
    scope: &MemoryScope,
    threshold: f32,
    limit: usize,
) -> MemorySnapshot {
    let session_summary = match &scope.conversation_id {
        Some(conversation_id) => match store.session_summary(conversation_id).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Session summary failed, continuing without it");
                String::new()
            }
        },
        None => String::new(),
    };

    let episodic_scope = match &scope.project_id {
        Some(project) => MemoryScope::project(project.clone()),
        None => MemoryScope {
            project_id: None,
            conversation_id: scope.conversation_id.clone(),
        },
    };

    let episodes = match store
        .retrieve_relevant(query, &episodic_scope, threshold, limit)
        .await
    {
        Ok(episodes) => episodes,
        Err(e) => {
            warn!(error = %e, "Episodic retrieval failed, continuing without it");
            Vec::new()
        }
    };

    MemorySnapshot {
        session_summary,
        episodes,
    }
}
