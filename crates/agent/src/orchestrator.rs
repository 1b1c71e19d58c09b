//! The request orchestrator.
//!
//! One orchestrator task per request. The pipeline is fixed:
//! classify intent, retrieve (corpus and memory in parallel), grade,
//! optionally rewrite-and-retry once, assemble context, generate,
//! verify citations. Refinement tools (rerank, grade, rewrite) failing
//! means that refinement is skipped and its input used unchanged —
//! never a failed request. Only generation failures are fatal.
//!
//! Cancellation is the consumer dropping the receiver: the next emit
//! fails, the task stops, the in-flight generation stream is dropped,
//! and the memory write-back is skipped.

use crate::citation;
use crate::context::ContextAssembler;
use crate::emitter::{Cancelled, StreamEmitter};
use crate::state::{AgentState, IntentProfile, Termination};
use docloom_config::AppConfig;
use docloom_core::event::{SourceInfo, Stage, StreamEvent};
use docloom_core::llm::{GenerationRequest, LanguageModel};
use docloom_core::memory::{MemoryEntry, MemoryScope, MemoryStore};
use docloom_core::query::{Citation, Query, RetrievedChunk};
use docloom_core::retrieval::ChunkFilter;
use docloom_tools::{ToolInput, ToolName, ToolOutput, ToolRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Per-deployment orchestrator tuning, sliced out of [`AppConfig`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub top_k: usize,
    pub similarity_threshold: f32,
    pub token_budget: usize,
    pub max_tool_calls: usize,
    pub recency_window: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            top_k: 8,
            similarity_threshold: 0.25,
            token_budget: 6000,
            max_tool_calls: 10,
            recency_window: 6,
            temperature: 0.2,
            max_tokens: 2048,
        }
    }
}

impl From<&AppConfig> for Settings {
    fn from(config: &AppConfig) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            similarity_threshold: config.retrieval.similarity_threshold,
            token_budget: config.context.token_budget,
            max_tool_calls: config.agent.max_tool_calls,
            recency_window: config.agent.recency_window,
            temperature: config.model.temperature,
            max_tokens: config.model.max_tokens,
        }
    }
}

/// The folded result of a full event stream, returned by [`AgentOrchestrator::run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceInfo>,
    pub citations: Vec<Citation>,
    pub conversation_id: String,
}

enum PipelineError {
    Cancelled,
    Fatal(String),
}

impl From<Cancelled> for PipelineError {
    fn from(_: Cancelled) -> Self {
        PipelineError::Cancelled
    }
}

/// Answers questions. Cheap to clone per request via shared `Arc`s.
#[derive(Clone)]
pub struct AgentOrchestrator {
    tools: Arc<ToolRegistry>,
    model: Arc<dyn LanguageModel>,
    memory: Arc<dyn MemoryStore>,
    settings: Settings,
}

impl AgentOrchestrator {
    pub fn new(
        tools: Arc<ToolRegistry>,
        model: Arc<dyn LanguageModel>,
        memory: Arc<dyn MemoryStore>,
        settings: Settings,
    ) -> Self {
        Self {
            tools,
            model,
            memory,
            settings,
        }
    }

    /// Answer a query as an ordered event stream.
    ///
    /// Spawns the request task and returns immediately. The stream is
    /// bounded (capacity 128); a slow consumer backpressures the
    /// pipeline, a vanished one cancels it.
    pub fn run_stream(&self, query: Query) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(128);
        let this = self.clone();

        tokio::spawn(async move {
            let conversation_id = query.conversation_id.clone();
            let mut emitter = StreamEmitter::new(tx);
            let mut state = AgentState::new(query);

            match this.pipeline(&mut state, &mut emitter).await {
                Ok(()) => {
                    state.finish(Termination::Completed);
                    let done = emitter
                        .emit(StreamEvent::Done { conversation_id })
                        .await;
                    info!(
                        tool_calls = state.tool_calls.len(),
                        citations = state.citations.len(),
                        "Request complete"
                    );
                    if done.is_ok() {
                        this.spawn_write_back(state);
                    }
                }
                Err(PipelineError::Cancelled) => {
                    state.finish(Termination::Cancelled);
                    debug!("Request cancelled by consumer");
                }
                Err(PipelineError::Fatal(message)) => {
                    state.finish(Termination::Failed);
                    warn!(%message, "Request failed");
                    let _ = emitter.emit(StreamEvent::Error { message }).await;
                }
            }
        });

        rx
    }

    /// Answer a query and fold the whole stream into one response.
    pub async fn run(&self, query: Query) -> docloom_core::Result<AnswerResponse> {
        let mut response = AnswerResponse {
            question: query.text.clone(),
            answer: String::new(),
            sources: Vec::new(),
            citations: Vec::new(),
            conversation_id: query.conversation_id.clone(),
        };

        let mut rx = self.run_stream(query);
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::Sources { sources, .. } => response.sources = sources,
                StreamEvent::AnswerChunk { chunk } => response.answer.push_str(&chunk),
                StreamEvent::Citation {
                    doc_id,
                    quote,
                    location,
                } => response.citations.push(Citation {
                    doc_id,
                    quote,
                    location,
                }),
                StreamEvent::Done { conversation_id } => {
                    response.conversation_id = conversation_id;
                }
                StreamEvent::Error { message } => {
                    return Err(docloom_core::Error::Internal(message));
                }
                StreamEvent::Progress { .. } => {}
            }
        }

        // Streamed chunks carry raw cite tags; the folded answer is clean.
        response.answer = citation::strip_tags(&response.answer);
        Ok(response)
    }

    async fn pipeline(
        &self,
        state: &mut AgentState,
        emitter: &mut StreamEmitter,
    ) -> Result<(), PipelineError> {
        let settings = &self.settings;

        // ── Intent ──
        emitter
            .emit(progress("Reading the question", Stage::IntentClassify))
            .await?;
        state.intent = match self
            .model
            .classify(&state.query.text, &IntentProfile::LABELS)
            .await
        {
            Ok(label) => IntentProfile::from_label(&label),
            Err(e) => {
                warn!(error = %e, "Intent classification failed, assuming generic");
                IntentProfile::Generic
            }
        };
        debug!(intent = ?state.intent, "Intent classified");

        // ── Retrieve: corpus and memory in parallel ──
        emitter
            .emit(progress("Searching the corpus", Stage::Retrieve))
            .await?;
        let filter = ChunkFilter {
            document_ids: state.query.document_ids.clone(),
            project_id: state.query.project_id.clone(),
        };
        let scope = MemoryScope {
            project_id: state.query.project_id.clone(),
            conversation_id: Some(state.query.conversation_id.clone()),
        };
        let top_k =
            state.query.top_k.unwrap_or(settings.top_k) * state.intent.top_k_factor();

        let (chunks_result, memory_result, history_result) = tokio::join!(
            self.tools.invoke(ToolInput::VectorRetrieve {
                query: state.query.text.clone(),
                filter: filter.clone(),
                top_k,
            }),
            self.tools.invoke(ToolInput::MemoryRetrieve {
                query: state.query.text.clone(),
                scope: scope.clone(),
            }),
            self.memory
                .recent_turns(&state.query.conversation_id, settings.recency_window),
        );

        state.record_tool_call(ToolName::VectorRetrieve, chunks_result.is_ok());
        state.record_tool_call(ToolName::MemoryRetrieve, memory_result.is_ok());
        state.history = history_result.unwrap_or_default();

        let mut retrieved = match chunks_result {
            Ok(ToolOutput::VectorRetrieve(chunks)) => chunks,
            Ok(_) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Corpus retrieval failed, continuing without chunks");
                Vec::new()
            }
        };
        retrieved.retain(|c| c.score >= settings.similarity_threshold);

        state.memory = match memory_result {
            Ok(ToolOutput::MemoryRetrieve(snapshot)) => snapshot,
            _ => Default::default(),
        };

        // ── Grade ──
        emitter
            .emit(progress("Grading sources", Stage::Grade))
            .await?;
        let question = state.query.text.clone();
        let mut graded = self.grade_chunks(state, &question, retrieved).await;

        // ── Rewrite and retry, at most once ──
        if graded.is_empty() {
            emitter
                .emit(progress("Refining the question", Stage::Rewrite))
                .await?;
            self.rewrite_query(state).await;

            if state.rewritten.is_some() {
                emitter
                    .emit(progress("Searching again", Stage::Retrieve))
                    .await?;
                let retry_query = state.effective_query().to_string();
                let mut retried = if state.can_call_tool(settings.max_tool_calls) {
                    match self
                        .tools
                        .invoke(ToolInput::VectorRetrieve {
                            query: retry_query.clone(),
                            filter,
                            top_k,
                        })
                        .await
                    {
                        Ok(ToolOutput::VectorRetrieve(chunks)) => {
                            state.record_tool_call(ToolName::VectorRetrieve, true);
                            chunks
                        }
                        Ok(_) => Vec::new(),
                        Err(e) => {
                            state.record_tool_call(ToolName::VectorRetrieve, false);
                            warn!(error = %e, "Retry retrieval failed");
                            Vec::new()
                        }
                    }
                } else {
                    state.finish(Termination::MaxToolCalls);
                    Vec::new()
                };
                retried.retain(|c| c.score >= settings.similarity_threshold);

                emitter
                    .emit(progress("Grading sources", Stage::Grade))
                    .await?;
                graded = self.grade_chunks(state, &retry_query, retried).await;
            }
        }

        // ── Rerank ──
        if graded.len() > 1 && state.can_call_tool(settings.max_tool_calls) {
            let rerank_query = state.effective_query().to_string();
            match self
                .tools
                .invoke(ToolInput::Rerank {
                    query: rerank_query,
                    chunks: graded.clone(),
                    top_k: settings.top_k,
                })
                .await
            {
                Ok(ToolOutput::Rerank(reranked)) => {
                    state.record_tool_call(ToolName::Rerank, true);
                    graded = reranked;
                }
                Ok(_) => {}
                Err(e) => {
                    state.record_tool_call(ToolName::Rerank, false);
                    warn!(error = %e, "Rerank failed, keeping retrieval order");
                }
            }
        }
        state.chunks = graded;

        // ── Assemble ──
        emitter
            .emit(progress("Assembling context", Stage::Assemble))
            .await?;
        let assembler = ContextAssembler::new(settings.token_budget);
        let ctx = assembler.assemble(&state.chunks, &state.memory, &state.history);
        if ctx.dropped > 0 {
            debug!(dropped = ctx.dropped, "Chunks dropped to fit token budget");
        }

        let sources = source_infos(&ctx.included, &state.memory.episodes);
        emitter
            .emit(StreamEvent::Sources {
                count: sources.len(),
                sources,
            })
            .await?;

        // ── Generate ──
        emitter
            .emit(progress("Generating answer", Stage::Generate))
            .await?;
        let request = GenerationRequest::new(ctx.system.clone(), state.effective_query())
            .with_temperature(settings.temperature)
            .with_max_tokens(settings.max_tokens);

        let mut stream = self
            .model
            .stream(request)
            .await
            .map_err(|e| PipelineError::Fatal(format!("Generation failed: {e}")))?;

        let mut answer = String::new();
        while let Some(item) = stream.recv().await {
            match item {
                Ok(chunk) => {
                    if !chunk.text.is_empty() {
                        answer.push_str(&chunk.text);
                        emitter
                            .emit(StreamEvent::AnswerChunk { chunk: chunk.text })
                            .await?;
                    }
                    if chunk.done {
                        break;
                    }
                }
                Err(e) => {
                    return Err(PipelineError::Fatal(format!("Generation failed: {e}")));
                }
            }
        }

        // ── Verify ──
        emitter
            .emit(progress("Verifying citations", Stage::Verify))
            .await?;
        let verified = citation::verify(&answer, &ctx.included);
        if verified.flagged > 0 {
            warn!(flagged = verified.flagged, "Citations failed verification");
        }
        state.answer = verified.text;
        state.citations = verified.citations;

        for cite in state.citations.clone() {
            emitter
                .emit(StreamEvent::Citation {
                    doc_id: cite.doc_id,
                    quote: cite.quote,
                    location: cite.location,
                })
                .await?;
        }

        Ok(())
    }

    /// Grade chunks, keeping the input unchanged on failure.
    async fn grade_chunks(
        &self,
        state: &mut AgentState,
        query: &str,
        chunks: Vec<RetrievedChunk>,
    ) -> Vec<RetrievedChunk> {
        if chunks.is_empty() {
            return chunks;
        }
        if !state.can_call_tool(self.settings.max_tool_calls) {
            state.finish(Termination::MaxToolCalls);
            return chunks;
        }

        match self
            .tools
            .invoke(ToolInput::Grade {
                query: query.to_string(),
                chunks: chunks.clone(),
            })
            .await
        {
            Ok(ToolOutput::Grade(kept)) => {
                state.record_tool_call(ToolName::Grade, true);
                kept
            }
            Ok(_) => chunks,
            Err(e) => {
                state.record_tool_call(ToolName::Grade, false);
                warn!(error = %e, "Grading failed, keeping all retrieved chunks");
                chunks
            }
        }
    }

    /// Rewrite the query against recent turns. Sets `state.rewritten`
    /// only when the rewrite actually changed something.
    async fn rewrite_query(&self, state: &mut AgentState) {
        if !state.can_call_tool(self.settings.max_tool_calls) {
            state.finish(Termination::MaxToolCalls);
            return;
        }

        match self
            .tools
            .invoke(ToolInput::QueryRewrite {
                question: state.query.text.clone(),
                history: state.history.clone(),
            })
            .await
        {
            Ok(ToolOutput::QueryRewrite(rewritten)) => {
                state.record_tool_call(ToolName::QueryRewrite, true);
                if rewritten != state.query.text {
                    state.rewritten = Some(rewritten);
                }
            }
            Ok(_) => {}
            Err(e) => {
                state.record_tool_call(ToolName::QueryRewrite, false);
                warn!(error = %e, "Query rewrite failed, skipping retry");
            }
        }
    }

    /// Record the finished turn off the response path. A failure is
    /// logged and dropped; `done` has already been sent.
    fn spawn_write_back(&self, state: AgentState) {
        if state.answer.is_empty() {
            return;
        }
        let memory = self.memory.clone();
        let scope = MemoryScope {
            project_id: state.query.project_id.clone(),
            conversation_id: Some(state.query.conversation_id.clone()),
        };
        let question = state.query.text.clone();
        let answer = state.answer.clone();

        tokio::spawn(async move {
            if let Err(e) = memory.record_interaction(&question, &answer, &scope).await {
                warn!(error = %e, "Memory write-back failed");
            }
        });
    }
}

fn progress(message: &str, stage: Stage) -> StreamEvent {
    StreamEvent::Progress {
        message: message.to_string(),
        stage,
    }
}

fn source_infos(chunks: &[RetrievedChunk], episodes: &[MemoryEntry]) -> Vec<SourceInfo> {
    let mut sources = Vec::with_capacity(chunks.len() + episodes.len());

    for chunk in chunks {
        let mut metadata = serde_json::Map::new();
        metadata.insert("kind".into(), "chunk".into());
        metadata.insert("doc_id".into(), chunk.document_id.clone().into());
        metadata.insert("chunk_id".into(), chunk.id.clone().into());
        if let Some(location) = &chunk.location {
            if let Some(page) = location.page {
                metadata.insert("page".into(), page.into());
            }
            if let Some(ts) = location.timestamp_secs {
                metadata.insert("timestamp_secs".into(), ts.into());
            }
        }
        sources.push(SourceInfo {
            content: chunk.text.clone(),
            score: chunk.score,
            metadata,
        });
    }

    for episode in episodes {
        let mut metadata = serde_json::Map::new();
        metadata.insert("kind".into(), "memory".into());
        metadata.insert("id".into(), episode.id.clone().into());
        sources.push(SourceInfo {
            content: format!("Q: {}\nA: {}", episode.question, episode.answer),
            score: episode.score,
            metadata,
        });
    }

    sources
}
