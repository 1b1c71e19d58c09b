//! Shared runtime wiring: config → model → memory → corpus → orchestrator.

use docloom_agent::{AgentOrchestrator, Settings};
use docloom_config::AppConfig;
use docloom_core::memory::MemoryStore;
use docloom_memory::{InMemoryStore, SqliteStore, StaticChunkStore};
use docloom_tools::ToolRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Where the corpus file lives: an explicit flag wins, otherwise
/// `corpus.json` next to the config when present, otherwise none.
pub fn resolve_corpus_path(flag: Option<PathBuf>) -> Option<PathBuf> {
    flag.or_else(|| {
        let default = AppConfig::config_dir().join("corpus.json");
        default.exists().then_some(default)
    })
}

/// Build the orchestrator from configuration. Fails fast on a missing
/// API key, an unreadable corpus file, or an unusable memory backend.
pub async fn build_orchestrator(
    config: &AppConfig,
    corpus: Option<&Path>,
) -> Result<AgentOrchestrator, Box<dyn std::error::Error>> {
    let model = docloom_llm::build_model(config)?;

    let memory: Arc<dyn MemoryStore> = match config.memory.backend.as_str() {
        "in_memory" => Arc::new(InMemoryStore::new(
            Some(model.clone()),
            config.agent.recency_window,
        )),
        _ => {
            let db_path = config.memory_db_path();
            Arc::new(
                SqliteStore::new(
                    &db_path.to_string_lossy(),
                    Some(model.clone()),
                    config.agent.recency_window,
                )
                .await?,
            )
        }
    };
    info!(backend = memory.name(), "Memory store ready");

    let store = match corpus {
        Some(path) => {
            let store = StaticChunkStore::from_json_file(path, Some(model.clone()))?;
            info!(path = %path.display(), chunks = store.len(), "Corpus loaded");
            Arc::new(store)
        }
        None => {
            info!("No corpus file, starting with an empty corpus");
            Arc::new(StaticChunkStore::empty())
        }
    };

    let tools = Arc::new(ToolRegistry::new(
        store,
        model.clone(),
        memory.clone(),
        config.retrieval.episodic_threshold,
        config.retrieval.episodic_limit,
    ));

    Ok(AgentOrchestrator::new(
        tools,
        model,
        memory,
        Settings::from(config),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_corpus_flag_wins() {
        let flag = Some(PathBuf::from("/tmp/does-not-need-to-exist.json"));
        assert_eq!(
            resolve_corpus_path(flag.clone()),
            Some(PathBuf::from("/tmp/does-not-need-to-exist.json"))
        );
    }
}
