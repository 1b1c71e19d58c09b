//! Relevance grading — binary keep/drop per retrieved chunk.
//!
//! The model answers with a JSON array of booleans, one per chunk in
//! order. Only chunks graded relevant survive; an all-false verdict is
//! a legitimate empty result, not an error.

use crate::extract_json_array;
use docloom_core::error::{GenerationError, ToolError};
use docloom_core::llm::{GenerationRequest, LanguageModel};
use docloom_core::query::RetrievedChunk;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You judge whether document excerpts are relevant to a question. \
Respond with ONLY a JSON array of booleans, one per excerpt, in the order given. \
true = the excerpt helps answer the question, false = it does not. \
No explanation, no other text.";

pub async fn run(
    model: &dyn LanguageModel,
    query: &str,
    chunks: Vec<RetrievedChunk>,
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
        .with_max_tokens(128);

    let result = model
        .complete(request)
        .await
        .map_err(|e: GenerationError| ToolError::ExecutionFailed {
            tool: "grade",
            reason: e.to_string(),
        })?;

    let verdicts = parse_verdicts(&result.text, chunks.len())?;
    debug!(?verdicts, "Grade verdicts");

    Ok(chunks
        .into_iter()
        .zip(verdicts)
        .filter_map(|(chunk, keep)| keep.then_some(chunk))
        .collect())
}

fn parse_verdicts(text: &str, expected: usize) -> Result<Vec<bool>, ToolError> {
    let array = extract_json_array(text).ok_or_else(|| ToolError::MalformedOutput {
        tool: "grade",
        reason: "no JSON array in response".into(),
    })?;

    let verdicts: Vec<bool> =
        serde_json::from_str(array).map_err(|e| ToolError::MalformedOutput {
            tool: "grade",
            reason: format!("invalid verdict array: {e}"),
        })?;

    if verdicts.len() != expected {
        return Err(ToolError::MalformedOutput {
            tool: "grade",
            reason: format!("expected {expected} verdicts, got {}", verdicts.len()),
        });
    }

    Ok(verdicts)
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

    fn chunk(id: &str) -> RetrievedChunk {
        RetrievedChunk::new(id, "doc", format!("text {id}"), 0.5)
    }

    #[tokio::test]
    async fn keeps_only_relevant_chunks() {
        let model = ScriptedModel("[true, false, true]");
        let chunks = vec![chunk("a"), chunk("b"), chunk("c")];

        let result = run(&model, "q", chunks).await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "a");
        assert_eq!(result[1].id, "c");
    }

    #[tokio::test]
    async fn all_irrelevant_yields_empty() {
        let model = ScriptedModel("[false, false]");
        let chunks = vec![chunk("a"), chunk("b")];

        let result = run(&model, "q", chunks).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn wrong_count_is_malformed() {
        let model = ScriptedModel("[true]");
        let chunks = vec![chunk("a"), chunk("b")];

        let err = run(&model, "q", chunks).await.unwrap_err();
        assert!(matches!(
            err,
            ToolError::MalformedOutput { tool: "grade", .. }
        ));
    }

    #[tokio::test]
    async fn empty_input_short_circuits() {
        let model = ScriptedModel("unused");
        let result = run(&model, "q", vec![]).await.unwrap();
        assert!(result.is_empty());
    }
}
