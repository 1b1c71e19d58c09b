//! Docloom CLI — the main entry point.
//!
//! Commands:
//! - `serve`   — Start the HTTP API server
//! - `ask`     — Ask a single question from the terminal
//! - `config`  — Show, locate, or validate the configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "docloom",
    about = "Docloom — ask questions about your documents, with verified citations",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Corpus file (JSON array of indexed chunks)
        #[arg(short, long)]
        corpus: Option<PathBuf>,
    },

    /// Ask a single question
    Ask {
        /// The question to ask
        question: String,

        /// Corpus file (JSON array of indexed chunks)
        #[arg(short, long)]
        corpus: Option<PathBuf>,

        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<String>,

        /// Scope retrieval and memory to a project
        #[arg(long)]
        project: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file path
    Path,
    /// Validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port, corpus } => commands::serve::run(port, corpus).await?,
        Commands::Ask {
            question,
            corpus,
            conversation,
            project,
        } => commands::ask::run(question, corpus, conversation, project).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
    }

    Ok(())
}
