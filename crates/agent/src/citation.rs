//! Citation verification.
//!
//! The model is told to wrap sourced claims in
//! `<cite doc_id="…" quote="…">prose</cite>` tags. After generation,
//! every tag is checked: the quote must be a whitespace-normalized
//! substring of an included chunk from the claimed document. Verified
//! tags become structured [`Citation`] values; failed ones are dropped.
//! Either way the tag itself never survives into the cleaned answer —
//! the inner prose does.
//!
//! The invariant this enforces: every citation surfaced to a caller
//! quotes text that really is in the corpus, with zero exceptions.

use docloom_core::query::{Citation, RetrievedChunk};
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

/// The cleaned answer plus what verification found.
#[derive(Debug, Clone, Default)]
pub struct VerifiedAnswer {
    /// Answer text with all cite tags replaced by their inner prose.
    pub text: String,

    /// Citations whose quotes checked out, in answer order.
    pub citations: Vec<Citation>,

    /// How many candidate citations failed verification.
    pub flagged: usize,
}

fn cite_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // (?s) so inner prose may span lines
        Regex::new(r#"(?s)<cite\s+doc_id="([^"]*)"\s+quote="([^"]*)"\s*>(.*?)</cite>"#)
            .expect("cite regex is valid")
    })
}

/// Collapse all whitespace runs to single spaces and trim.
fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Verify every citation in `answer` against the chunks that were
/// actually in the prompt.
pub fn verify(answer: &str, included: &[RetrievedChunk]) -> VerifiedAnswer {
    let mut text = String::with_capacity(answer.len());
    let mut citations = Vec::new();
    let mut flagged = 0usize;
    let mut last_end = 0usize;

    for caps in cite_regex().captures_iter(answer) {
        let whole = caps.get(0).expect("group 0 always present");
        let doc_id = &caps[1];
        let quote = &caps[2];
        let prose = &caps[3];

        text.push_str(&answer[last_end..whole.start()]);
        text.push_str(prose);
        last_end = whole.end();

        match find_supporting_chunk(doc_id, quote, included) {
            Some(chunk) => citations.push(Citation {
                doc_id: doc_id.to_string(),
                quote: quote.to_string(),
                location: chunk.location.clone(),
            }),
            None => {
                flagged += 1;
                warn!(doc_id, quote, "Dropping unverifiable citation");
            }
        }
    }
    text.push_str(&answer[last_end..]);

    VerifiedAnswer {
        text,
        citations,
        flagged,
    }
}

/// Replace every cite tag with its inner prose, without verification.
/// Used when folding a finished stream whose citations were already
/// verified event-by-event.
pub fn strip_tags(answer: &str) -> String {
    cite_regex().replace_all(answer, "$3").into_owned()
}

fn find_supporting_chunk<'a>(
    doc_id: &str,
    quote: &str,
    included: &'a [RetrievedChunk],
) -> Option<&'a RetrievedChunk> {
    let normalized_quote = normalize_ws(quote);
    if normalized_quote.is_empty() {
        return None;
    }
    included
        .iter()
        .filter(|c| c.document_id == doc_id)
        .find(|c| normalize_ws(&c.text).contains(&normalized_quote))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docloom_core::query::ChunkLocation;

    fn chunk(doc: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk::new("c1", doc, text, 0.9)
    }

    #[test]
    fn verified_citation_survives() {
        let chunks = vec![chunk("d1", "The transformer attends to all positions at once.")];
        let answer = r#"It is fast: <cite doc_id="d1" quote="attends to all positions">the model looks everywhere</cite>."#;

        let result = verify(answer, &chunks);
        assert_eq!(result.citations.len(), 1);
        assert_eq!(result.flagged, 0);
        assert_eq!(result.citations[0].quote, "attends to all positions");
        assert_eq!(result.text, "It is fast: the model looks everywhere.");
    }

    #[test]
    fn fabricated_quote_is_dropped_prose_kept() {
        let chunks = vec![chunk("d1", "Some unrelated text.")];
        let answer = r#"<cite doc_id="d1" quote="never said this">a bold claim</cite> indeed."#;

        let result = verify(answer, &chunks);
        assert!(result.citations.is_empty());
        assert_eq!(result.flagged, 1);
        assert_eq!(result.text, "a bold claim indeed.");
    }

    #[test]
    fn wrong_doc_id_fails_even_if_text_matches() {
        let chunks = vec![chunk("d1", "the exact words")];
        let answer = r#"<cite doc_id="d2" quote="the exact words">claim</cite>"#;

        let result = verify(answer, &chunks);
        assert!(result.citations.is_empty());
        assert_eq!(result.flagged, 1);
    }

    #[test]
    fn whitespace_differences_are_tolerated() {
        let chunks = vec![chunk("d1", "line one\n  line two")];
        let answer = r#"<cite doc_id="d1" quote="line one line two">both lines</cite>"#;

        let result = verify(answer, &chunks);
        assert_eq!(result.citations.len(), 1);
    }

    #[test]
    fn location_copied_from_matched_chunk() {
        let chunks =
            vec![chunk("d1", "quoted words here").with_location(ChunkLocation::page(7))];
        let answer = r#"<cite doc_id="d1" quote="quoted words">x</cite>"#;

        let result = verify(answer, &chunks);
        assert_eq!(result.citations[0].location, Some(ChunkLocation::page(7)));
    }

    #[test]
    fn multiple_citations_in_answer_order() {
        let chunks = vec![chunk("d1", "alpha text and beta text")];
        let answer = r#"<cite doc_id="d1" quote="alpha text">A</cite> then <cite doc_id="d1" quote="beta text">B</cite>"#;

        let result = verify(answer, &chunks);
        assert_eq!(result.citations.len(), 2);
        assert_eq!(result.citations[0].quote, "alpha text");
        assert_eq!(result.citations[1].quote, "beta text");
        assert_eq!(result.text, "A then B");
    }

    #[test]
    fn answer_without_tags_passes_through() {
        let result = verify("Plain answer, no citations.", &[]);
        assert_eq!(result.text, "Plain answer, no citations.");
        assert!(result.citations.is_empty());
        assert_eq!(result.flagged, 0);
    }

    #[test]
    fn strip_tags_keeps_prose() {
        let answer = r#"Start <cite doc_id="d1" quote="q">middle</cite> end."#;
        assert_eq!(strip_tags(answer), "Start middle end.");
        assert_eq!(strip_tags("no tags here"), "no tags here");
    }

    #[test]
    fn empty_quote_is_flagged() {
        let chunks = vec![chunk("d1", "anything")];
        let answer = r#"<cite doc_id="d1" quote="">claim</cite>"#;

        let result = verify(answer, &chunks);
        assert!(result.citations.is_empty());
        assert_eq!(result.flagged, 1);
    }

    #[test]
    fn multiline_prose_inside_tag() {
        let chunks = vec![chunk("d1", "the quoted span")];
        let answer = "<cite doc_id=\"d1\" quote=\"the quoted span\">first line\nsecond line</cite>";

        let result = verify(answer, &chunks);
        assert_eq!(result.citations.len(), 1);
        assert_eq!(result.text, "first line\nsecond line");
    }
}
