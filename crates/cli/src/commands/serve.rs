//! `docloom serve` — Start the HTTP API server.

use super::runtime;
use docloom_config::AppConfig;
use std::path::PathBuf;

pub async fn run(
    port_override: Option<u16>,
    corpus: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let corpus_path = runtime::resolve_corpus_path(corpus);
    let orchestrator = runtime::build_orchestrator(&config, corpus_path.as_deref()).await?;

    println!("📚 Docloom");
    println!(
        "   Listening: {}:{}",
        config.gateway.host, config.gateway.port
    );
    println!("   Model:     {}", config.model.chat_model);
    println!("   Memory:    {}", config.memory.backend);

    docloom_gateway::start(&config, orchestrator).await?;

    Ok(())
}
