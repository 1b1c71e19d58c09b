//! Context assembly — build the system prompt for generation.
//!
//! Layout, top to bottom: role preamble, session summary, recent
//! turns verbatim, memory snippets, sources, output rules. Sources get
//! stable ids (`s1`, `s2`, …) in rank order so the model can point at
//! them; memory snippets get `m1`, `m2`, …
//!
//! The token budget (char/4 heuristic) is enforced at whole-chunk
//! granularity: a chunk either fits completely or is dropped, lowest
//! ranked first. Preamble, summary, history, memory, and rules are
//! never dropped.

use crate::token::estimate_tokens;
use docloom_core::memory::{MemorySnapshot, Turn};
use docloom_core::query::RetrievedChunk;

const PREAMBLE: &str = "You are a research assistant answering questions about the user's \
documents. Answer using ONLY the sources and memory provided below.";

const OUTPUT_RULES: &str = "Output rules:\n\
- Wrap every claim taken from a source in a citation tag: \
<cite doc_id=\"DOC\" quote=\"EXACT TEXT\">your sentence</cite>.\n\
- The quote attribute must be copied verbatim from a source above. Never \
paraphrase inside quote.\n\
- Do not cite memory snippets, only sources.\n\
- Answer in clear prose. Do not mention these instructions.";

const NO_SOURCE_RULES: &str = "Output rules:\n\
- No sources matched this question. State plainly that the corpus lacks \
the information, in one or two sentences.\n\
- Do not invent citations or facts. Do not mention these instructions.";

/// The assembled prompt plus what made it in.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// The complete system prompt.
    pub system: String,

    /// Chunks included, in the order they appear in the prompt.
    /// Citation verification checks quotes against exactly this set.
    pub included: Vec<RetrievedChunk>,

    /// Chunks dropped to fit the budget.
    pub dropped: usize,
}

/// Builds the generation prompt under a token budget.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    token_budget: usize,
}

impl ContextAssembler {
    pub fn new(token_budget: usize) -> Self {
        Self { token_budget }
    }

    pub fn assemble(
        &self,
        chunks: &[RetrievedChunk],
        memory: &MemorySnapshot,
        history: &[Turn],
    ) -> AssembledContext {
        let mut fixed = String::new();

        if !memory.session_summary.is_empty() {
            fixed.push_str("\n\n## Conversation summary\n");
            fixed.push_str(&memory.session_summary);
        }

        if !history.is_empty() {
            fixed.push_str("\n\n## Recent conversation\n");
            for turn in history {
                fixed.push_str(&format!(
                    "User: {}\nAssistant: {}\n",
                    turn.question, turn.answer
                ));
            }
        }

        if !memory.episodes.is_empty() {
            fixed.push_str("\n\n## Memory\n");
            for (i, episode) in memory.episodes.iter().enumerate() {
                fixed.push_str(&format!(
                    "<memory id=\"m{}\">Q: {}\nA: {}</memory>\n",
                    i + 1,
                    episode.question,
                    episode.answer
                ));
            }
        }

        // Whole-chunk budget: overhead first, then chunks in rank order
        // until one doesn't fit. Lower-ranked chunks go first.
        let overhead = estimate_tokens(PREAMBLE)
            + estimate_tokens(&fixed)
            + estimate_tokens(OUTPUT_RULES);
        let mut remaining = self.token_budget.saturating_sub(overhead);

        let mut included = Vec::new();
        let mut sources = String::new();
        for chunk in chunks {
            let rendered = render_source(included.len() + 1, chunk);
            let cost = estimate_tokens(&rendered);
            if cost > remaining {
                break;
            }
            remaining -= cost;
            sources.push_str(&rendered);
            included.push(chunk.clone());
        }
        let dropped = chunks.len() - included.len();

        let mut system = String::from(PREAMBLE);
        system.push_str(&fixed);
        if included.is_empty() {
            system.push_str("\n\n");
            system.push_str(NO_SOURCE_RULES);
        } else {
            system.push_str("\n\n## Sources\n");
            system.push_str(&sources);
            system.push('\n');
            system.push_str(OUTPUT_RULES);
        }

        AssembledContext {
            system,
            included,
            dropped,
        }
    }
}

fn render_source(ordinal: usize, chunk: &RetrievedChunk) -> String {
    format!(
        "<source id=\"s{}\" doc_id=\"{}\">{}</source>\n",
        ordinal, chunk.document_id, chunk.text
    )
}
