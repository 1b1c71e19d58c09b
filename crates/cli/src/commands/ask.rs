//! `docloom ask` — Ask a single question from the terminal.
//!
//! Streams the answer as it is generated: progress lines go to stderr,
//! answer text to stdout, citations as a footer once the answer is
//! complete.

use super::runtime;
use docloom_config::AppConfig;
use docloom_core::event::StreamEvent;
use docloom_core::query::Query;
use std::io::Write;
use std::path::PathBuf;

pub async fn run(
    question: String,
    corpus: Option<PathBuf>,
    conversation: Option<String>,
    project: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let corpus_path = runtime::resolve_corpus_path(corpus);
    let orchestrator = runtime::build_orchestrator(&config, corpus_path.as_deref()).await?;

    let mut query = match conversation {
        Some(id) => Query::in_conversation(question, id),
        None => Query::new(question),
    };
    query.project_id = project;

    let mut rx = orchestrator.run_stream(query);
    let mut citations = Vec::new();
    let mut failed = false;

    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::Progress { message, .. } => {
                eprintln!("· {message}");
            }
            StreamEvent::Sources { count, .. } => {
                eprintln!("· {count} source(s) in context");
            }
            StreamEvent::AnswerChunk { chunk } => {
                print!("{chunk}");
                std::io::stdout().flush()?;
            }
            StreamEvent::Citation { doc_id, quote, .. } => {
                citations.push((doc_id, quote));
            }
            StreamEvent::Done { conversation_id } => {
                println!();
                if !citations.is_empty() {
                    println!();
                    println!("Citations:");
                    for (doc_id, quote) in &citations {
                        println!("  [{doc_id}] \"{quote}\"");
                    }
                }
                eprintln!();
                eprintln!("Conversation: {conversation_id}");
            }
            StreamEvent::Error { message } => {
                eprintln!("Error: {message}");
                failed = true;
            }
        }
    }

    if failed {
        return Err("Request failed".into());
    }
    Ok(())
}
