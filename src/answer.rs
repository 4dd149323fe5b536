//! Answer synthesis over a retrieved result block.

use std::time::Duration;

use codelens_index::format::{NO_RESULTS, format_results};
use codelens_index::store::SearchResult;
use codelens_llm::retry::with_timeout;
use codelens_llm::{GenerationOptions, LlmError, LlmProvider, Message};

const SYSTEM_PROMPT: &str = "You answer questions about a software project using only the \
search results provided. Cite every claim with the source path of the result it comes from, \
in the form [path]. If the results do not contain the answer, say so instead of guessing.";

fn user_prompt(question: &str, block: &str) -> String {
    format!("{block}\n\nQuestion: {question}")
}

/// Ask the generative model to answer `question` from `results`.
///
/// Without results the model is not called and the no-results sentinel is returned.
///
/// # Errors
///
/// Returns an error if the provider fails or exceeds `timeout`.
pub async fn answer<P: LlmProvider>(
    provider: &P,
    question: &str,
    results: &[SearchResult],
    timeout: Duration,
) -> Result<String, LlmError> {
    if results.is_empty() {
        return Ok(NO_RESULTS.to_owned());
    }
    let messages = [
        Message::system(SYSTEM_PROMPT),
        Message::user(user_prompt(question, &format_results(results))),
    ];
    let options = GenerationOptions::default().with_temperature(0.2);
    with_timeout(timeout, provider.chat(&messages, &options)).await
}

#[cfg(test)]
mod tests {
    use codelens_llm::mock::MockProvider;

    use super::*;

    fn hit() -> SearchResult {
        SearchResult {
            content: "def connect():\n    return Pool(size=4)\n".into(),
            source: "db/pool.py".into(),
            similarity: 0.8,
            rerank_score: Some(0.9),
        }
    }

    #[test]
    fn prompt_carries_block_and_question() {
        let prompt = user_prompt("how big is the pool?", &format_results(&[hit()]));
        assert!(prompt.starts_with("<search_results>"));
        assert!(prompt.contains("source=\"db/pool.py\""));
        assert!(prompt.ends_with("Question: how big is the pool?"));
    }

    #[tokio::test]
    async fn answers_through_provider() {
        let provider = MockProvider::with_responses(vec!["Four connections [db/pool.py]".into()]);
        let out = answer(&provider, "pool size?", &[hit()], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(out, "Four connections [db/pool.py]");
        assert_eq!(provider.recorded_options()[0].temperature, Some(0.2));
    }

    #[tokio::test]
    async fn no_results_skips_provider() {
        let provider = MockProvider::default();
        let out = answer(&provider, "anything", &[], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(out, NO_RESULTS);
        assert!(provider.recorded_options().is_empty());
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let provider = MockProvider::default().with_delay(200);
        let result = answer(&provider, "q", &[hit()], Duration::from_millis(20)).await;
        assert!(result.is_err());
    }
}
