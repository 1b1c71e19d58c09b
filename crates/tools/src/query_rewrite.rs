//! Query rewriting — resolve pronouns and ellipsis using recent turns.
//!
//! "What about its performance?" only retrieves well once "its" is
//! resolved against the conversation. The prompt mandates returning the
//! question verbatim when it is already self-contained, so rewriting is
//! idempotent on standalone questions.

use docloom_core::error::{GenerationError, ToolError};
use docloom_core::llm::{GenerationRequest, LanguageModel};
use docloom_core::memory::Turn;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You rewrite follow-up questions into self-contained search queries. \
Resolve pronouns and implicit references using the conversation history. \
If the question is already self-contained, return it EXACTLY as given, unchanged. \
Respond with the query only — no explanation, no quotes.";

pub async fn run(
    model: &dyn LanguageModel,
    question: &str,
    history: &[Turn],
) -> Result<String, ToolError> {
    if history.is_empty() {
        return Ok(question.to_string());
    }

    let mut user = String::from("Conversation so far:\n");
    for turn in history {
        user.push_str(&format!("User: {}\nAssistant: {}\n", turn.question, turn.answer));
    }
    user.push_str(&format!("\nFollow-up question: {question}"));

    let request = GenerationRequest::new(SYSTEM_PROMPT, user)
        .with_temperature(0.0)
        .with_max_tokens(128);

    let result = model
        .complete(request)
        .await
        .map_err(|e: GenerationError| ToolError::ExecutionFailed {
            tool: "query_rewrite",
            reason: e.to_string(),
        })?;

    let rewritten = result.text.trim().trim_matches('"').to_string();
    if rewritten.is_empty() {
        return Err(ToolError::MalformedOutput {
            tool: "query_rewrite",
            reason: "empty rewrite".into(),
        });
    }

    debug!(original = question, rewritten = %rewritten, "Query rewritten");
    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
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

    fn turn(q: &str, a: &str) -> Turn {
        Turn {
            question: q.into(),
            answer: a.into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn resolves_pronoun_with_history() {
        let model = ScriptedModel("How fast is the transformer architecture?");
        let history = vec![turn("What is the transformer?", "An attention model.")];

        let result = run(&model, "How fast is it?", &history).await.unwrap();
        assert_eq!(result, "How fast is the transformer architecture?");
    }

    #[tokio::test]
    async fn no_history_returns_question_unchanged() {
        let model = ScriptedModel("should never be called");
        let result = run(&model, "What is attention?", &[]).await.unwrap();
        assert_eq!(result, "What is attention?");
    }

    #[tokio::test]
    async fn quoted_response_is_unwrapped() {
        let model = ScriptedModel("\"the rewritten query\"");
        let history = vec![turn("q", "a")];

        let result = run(&model, "follow-up", &history).await.unwrap();
        assert_eq!(result, "the rewritten query");
    }

    #[tokio::test]
    async fn empty_rewrite_is_malformed() {
        let model = ScriptedModel("   ");
        let history = vec![turn("q", "a")];

        let err = run(&model, "follow-up", &history).await.unwrap_err();
        assert!(matches!(
            err,
            ToolError::MalformedOutput {
                tool: "query_rewrite",
                ..
            }
        ));
    }
}
