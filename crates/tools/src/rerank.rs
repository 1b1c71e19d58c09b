//! LLM reranking — score retrieved chunks against the query.
//!
//! One prompt carries every candidate; the model returns a JSON array
//! of 0–10 relevance scores, one per chunk in order. A stable sort by
//! descending score keeps the original retrieval order on ties.

use crate::extract_json_array;
use docloom_core::error::{GenerationError, ToolError};
use docloom_core::llm::{GenerationRequest, LanguageModel};
use docloom_core::query::RetrievedChunk;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You score document excerpts for relevance to a question. \
Respond with ONLY a JSON array of numbers from 0 to 10, one score per excerpt, \
in the order given. 10 = directly answers the question, 0 = unrelated. \
No explanation, no other text.";

pub async fn run(
    model: &dyn LanguageModel,
    query: &str,
    chunks: Vec<RetrievedChunk>,
    top_k: usize,
) -> Result<Vec<RetrievedChunk>, ToolError> {
    if chunks.is_empty() {
        return Ok(chunks);
    }

    let mut user = format!("Question: {query}\n\nExcerpts:\n");
    for (i, chunk) in chunks.iter().enumerate() {
        user.push_str(&format!("[{}] {}\n\n", i + 1, chunk.text));
    }

    let request = GenerationRequest::new(SYSTEM_PROMPT, user)
        .with_temperature(0.0)
        .with_max_tokens(256);

    let result = model.complete(request).await.map_err(to_tool_error)?;
    let scores = parse_scores(&result.text, chunks.len())?;

    debug!(?scores, "Rerank scores");

    let mut indexed: Vec<(f32, RetrievedChunk)> = scores.into_iter().zip(chunks).collect();
    // sort_by is stable: ties keep retrieval order
    indexed.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    indexed.truncate(top_k);

    Ok(indexed
        .into_iter()
        .map(|(score, mut chunk)| {
            chunk.score = score / 10.0;
            chunk
        })
        .collect())
}

fn to_tool_error(e: GenerationError) -> ToolError {
    ToolError::ExecutionFailed {
        tool: "rerank",
        reason: e.to_string(),
    }
}

fn parse_scores(text: &str, expected: usize) -> Result<Vec<f32>, ToolError> {
    let array = extract_json_array(text).ok_or_else(|| ToolError::MalformedOutput {
        tool: "rerank",
        reason: "no JSON array in response".into(),
    })?;

    let scores: Vec<f32> =
        serde_json::from_str(array).map_err(|e| ToolError::MalformedOutput {
            tool: "rerank",
            reason: format!("invalid score array: {e}"),
        })?;

    if scores.len() != expected {
        return Err(ToolError::MalformedOutput {
            tool: "rerank",
            reason: format!("expected {expected} scores, got {}", scores.len()),
        });
    }

    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docloom_core::llm::GenerationResult;

    struct ScriptedModel(&'static str);

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResult, GenerationError> {
            Ok(GenerationResult {
                text: self.0.to_string(),
                model: "scripted".into(),
            })
        }
    }

    fn chunk(id: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk::new(id, "doc", text, 0.5)
    }

    #[tokio::test]
    async fn reorders_by_score() {
        let model = ScriptedModel("[2, 9, 5]");
        let chunks = vec![chunk("a", "x"), chunk("b", "y"), chunk("c", "z")];

        let result = run(&model, "q", chunks, 3).await.unwrap();
        assert_eq!(result[0].id, "b");
        assert_eq!(result[1].id, "c");
        assert_eq!(result[2].id, "a");
    }

    #[tokio::test]
    async fn ties_keep_retrieval_order() {
        let model = ScriptedModel("[5, 5, 5]");
        let chunks = vec![chunk("a", "x"), chunk("b", "y"), chunk("c", "z")];

        let result = run(&model, "q", chunks, 3).await.unwrap();
        assert_eq!(result[0].id, "a");
        assert_eq!(result[1].id, "b");
        assert_eq!(result[2].id, "c");
    }

    #[tokio::test]
    async fn truncates_to_top_k() {
        let model = ScriptedModel("[1, 2, 3, 4]");
        let chunks = vec![chunk("a", "w"), chunk("b", "x"), chunk("c", "y"), chunk("d", "z")];

        let result = run(&model, "q", chunks, 2).await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "d");
    }

    #[tokio::test]
    async fn fenced_json_is_accepted() {
        let model = ScriptedModel("Scores:\n```json\n[1, 8]\n```");
        let chunks = vec![chunk("a", "x"), chunk("b", "y")];

        let result = run(&model, "q", chunks, 2).await.unwrap();
        assert_eq!(result[0].id, "b");
    }

    #[tokio::test]
    async fn wrong_count_is_malformed() {
        let model = ScriptedModel("[1, 2]");
        let chunks = vec![chunk("a", "x"), chunk("b", "y"), chunk("c", "z")];

        let err = run(&model, "q", chunks, 3).await.unwrap_err();
        assert!(matches!(
            err,
            ToolError::MalformedOutput { tool: "rerank", .. }
        ));
    }

    #[tokio::test]
    async fn prose_response_is_malformed() {
        let model = ScriptedModel("the first one is best");
        let chunks = vec![chunk("a", "x")];

        let err = run(&model, "q", chunks, 1).await.unwrap_err();
        assert!(matches!(err, ToolError::MalformedOutput { .. }));
    }

    #[tokio::test]
    async fn empty_input_short_circuits() {
        let model = ScriptedModel("should never be called");
        let result = run(&model, "q", vec![], 3).await.unwrap();
        assert!(result.is_empty());
    }
}
