//! Session summary digest.
//!
//! Long conversations can't carry every past turn into the prompt. Turns
//! older than the recency window are compressed into a short, fully
//! deterministic digest: one clipped line per turn, newest last. No model
//! call is involved, so the same history always produces the same summary.

use docloom_core::memory::Turn;

/// Max characters kept from a question line.
const QUESTION_CLIP: usize = 120;

/// Max characters kept from an answer line.
const ANSWER_CLIP: usize = 200;

/// Oldest turns beyond this count are dropped from the digest entirely.
const MAX_DIGEST_TURNS: usize = 20;

/// Build the session summary for a conversation.
///
/// `turns` is the full history, oldest first. The newest `recency_window`
/// turns are excluded (they travel verbatim in the prompt); everything
/// older is digested. Returns an empty string when there is nothing to
/// summarize.
pub fn digest(turns: &[Turn], recency_window: usize) -> String {
    if turns.len() <= recency_window {
        return String::new();
    }

    let older = &turns[..turns.len() - recency_window];
    let start = older.len().saturating_sub(MAX_DIGEST_TURNS);

    let mut lines = Vec::with_capacity(older.len() - start + 1);
    lines.push("Earlier in this conversation:".to_string());
    for turn in &older[start..] {
        lines.push(format!(
            "- Q: {} | A: {}",
            clip(&turn.question, QUESTION_CLIP),
            clip(&turn.answer, ANSWER_CLIP),
        ));
    }

    lines.join("\n")
}

/// Clip text to `max` characters on a char boundary, appending an
/// ellipsis when anything was removed. Newlines collapse to spaces so
/// each turn stays on one digest line.
fn clip(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let clipped: String = flat.chars().take(max).collect();
    format!("{}…", clipped.trim_end())
}
