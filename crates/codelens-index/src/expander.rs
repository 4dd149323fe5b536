//! Best-effort query augmentation with generated technical keywords.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use codelens_llm::retry::with_timeout;
use codelens_llm::{GenerationOptions, LlmProvider, Message};

const SYSTEM_PROMPT: &str = "You expand search queries over a source code repository. \
Reply with one line of comma-separated technical keywords: identifiers, API names, \
file types, library names and synonyms likely to appear in matching code or docs. \
No sentences, no numbering, no explanations.";

const MAX_TERMS: usize = 12;
const MAX_WORDS_PER_TERM: usize = 4;

/// Rewrites a natural-language query into extra search keywords.
///
/// Never fails: timeouts, provider errors and unusable output all yield `""`.
#[derive(Debug)]
pub struct QueryExpander<P> {
    provider: Arc<P>,
    timeout: Duration,
}

impl<P: LlmProvider> QueryExpander<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Generation options used for every expansion call.
    #[must_use]
    pub fn options() -> GenerationOptions {
        GenerationOptions::default()
            .with_temperature(0.1)
            .with_max_tokens(48)
            .with_stop("\n\n")
    }

    pub async fn expand(&self, query: &str) -> String {
        let query = query.trim();
        if query.is_empty() {
            return String::new();
        }
        let messages = [Message::system(SYSTEM_PROMPT), Message::user(query)];
        let options = Self::options();

        match with_timeout(self.timeout, self.provider.chat(&messages, &options)).await {
            Ok(raw) => {
                let keywords = sanitize_keywords(&raw);
                tracing::debug!(query, keywords = %keywords, "query expanded");
                keywords
            }
            Err(e) => {
                tracing::warn!(provider = self.provider.name(), error = %e, "query expansion skipped");
                String::new()
            }
        }
    }
}

/// Reduce model output to at most [`MAX_TERMS`] short, distinct keywords joined by `", "`.
fn sanitize_keywords(raw: &str) -> String {
    let Some(line) = raw.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return String::new();
    };
    let line = strip_label(line);

    let mut seen = HashSet::new();
    line.split(',')
        .map(|term| {
            term.trim()
                .trim_start_matches(['-', '*', '•'])
                .trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '`'))
        })
        .filter(|term| {
            !term.is_empty()
                && term.split_whitespace().count() <= MAX_WORDS_PER_TERM
                && !looks_like_prose(term)
        })
        .filter(|term| seen.insert(term.to_lowercase()))
        .take(MAX_TERMS)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Drop a leading `Keywords:`-style label.
fn strip_label(line: &str) -> &str {
    match line.split_once(':') {
        Some((label, rest))
            if label.split_whitespace().count() <= 2
                && !label.contains(',')
                && rest.starts_with(char::is_whitespace) =>
        {
            rest.trim()
        }
        _ => line,
    }
}

/// Sentence punctuation. Dots and colons inside a single token (`os.path`,
/// `std::fs`) are identifiers, not prose.
fn looks_like_prose(term: &str) -> bool {
    term.contains(['!', '?', ';'])
        || term.ends_with(['.', ':'])
        || (term.contains(char::is_whitespace) && term.contains(['.', ':']))
}

#[cfg(test)]
mod tests {
    use codelens_llm::mock::MockProvider;

    use super::*;

    fn expander(provider: MockProvider, timeout_ms: u64) -> QueryExpander<MockProvider> {
        QueryExpander::new(Arc::new(provider), Duration::from_millis(timeout_ms))
    }

    #[test]
    fn sanitize_takes_first_line_and_trims() {
        let raw = "\n  - \"tokio\", spawn_blocking , `JoinHandle`\nHere are more ideas.";
        assert_eq!(sanitize_keywords(raw), "tokio, spawn_blocking, JoinHandle");
    }

    #[test]
    fn sanitize_drops_prose_and_long_terms() {
        let raw = "retry, This is a long sentence about backoff, backoff policy, Done!";
        assert_eq!(sanitize_keywords(raw), "retry, backoff policy");
    }

    #[test]
    fn sanitize_keeps_dotted_identifiers() {
        assert_eq!(
            sanitize_keywords("os.path, config.toml, end."),
            "os.path, config.toml"
        );
    }

    #[test]
    fn sanitize_dedupes_case_insensitively_and_caps() {
        assert_eq!(sanitize_keywords("Auth, auth, AUTH, login"), "Auth, login");
        let many: Vec<String> = (0..20).map(|i| format!("term{i}")).collect();
        let out = sanitize_keywords(&many.join(","));
        assert_eq!(out.split(", ").count(), MAX_TERMS);
    }

    #[test]
    fn sanitize_strips_label() {
        assert_eq!(sanitize_keywords("Keywords: jwt, session"), "jwt, session");
        assert_eq!(sanitize_keywords("std::fs, tokio::fs"), "std::fs, tokio::fs");
    }

    #[test]
    fn sanitize_empty_output() {
        assert_eq!(sanitize_keywords(""), "");
        assert_eq!(sanitize_keywords("\n\n  \n"), "");
    }

    #[tokio::test]
    async fn expand_uses_bounded_options() {
        let provider = MockProvider::with_responses(vec!["jwt, token refresh".into()]);
        let exp = expander(provider, 1000);
        assert_eq!(exp.expand("how is auth handled").await, "jwt, token refresh");

        let seen = exp.provider.recorded_options();
        assert_eq!(seen, vec![QueryExpander::<MockProvider>::options()]);
        assert_eq!(seen[0].max_tokens, Some(48));
        assert_eq!(seen[0].stop, vec!["\n\n".to_owned()]);
    }

    #[tokio::test]
    async fn expand_timeout_yields_empty() {
        let provider = MockProvider::with_responses(vec!["late, answer".into()]).with_delay(200);
        assert_eq!(expander(provider, 20).expand("query").await, "");
    }

    #[tokio::test]
    async fn expand_provider_error_yields_empty() {
        assert_eq!(expander(MockProvider::failing(), 1000).expand("query").await, "");
    }

    #[tokio::test]
    async fn blank_query_skips_provider() {
        let exp = expander(MockProvider::default(), 1000);
        assert_eq!(exp.expand("   ").await, "");
        assert!(exp.provider.recorded_options().is_empty());
    }
}
