//! Pairwise query/document relevance scoring.

use std::collections::HashSet;

use crate::error::LlmError;

/// Scores documents against a query, one score per document, higher is better.
///
/// Implementations are shared read-only across concurrent retrievals, so
/// `score` takes `&self` and must not mutate internal state.
pub trait Reranker: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if tokenization or inference fails.
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, LlmError>;

    fn name(&self) -> &str;
}

/// Term-coverage scorer: needs no model download.
///
/// Score is the fraction of distinct query terms found in the document,
/// boosted when the whole query appears verbatim. Range `[0, 1]`.
#[derive(Debug, Clone, Default)]
pub struct LexicalReranker;

const EXACT_MATCH_BONUS: f32 = 0.25;

impl Reranker for LexicalReranker {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, LlmError> {
        let query_lower = query.trim().to_lowercase();
        let terms: HashSet<String> = tokenize(&query_lower).collect();

        Ok(documents
            .iter()
            .map(|doc| {
                let doc_lower = doc.to_lowercase();
                let doc_terms: HashSet<String> = tokenize(&doc_lower).collect();
                let coverage = if terms.is_empty() {
                    0.0
                } else {
                    #[allow(clippy::cast_precision_loss)]
                    let ratio =
                        terms.intersection(&doc_terms).count() as f32 / terms.len() as f32;
                    ratio
                };
                let bonus = if !query_lower.is_empty() && doc_lower.contains(&query_lower) {
                    EXACT_MATCH_BONUS
                } else {
                    0.0
                };
                ((coverage + bonus) / (1.0 + EXACT_MATCH_BONUS)).clamp(0.0, 1.0)
            })
            .collect())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "lexical"
    }
}

/// Identifier-ish terms: alphanumeric runs plus `_`, at least two chars.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_owned)
}
