//! Lexical search over a tenant's articles.
//!
//! SQL selects candidates whose title or content contains any query term;
//! relevance is then computed from the title alone.

use std::cmp::Ordering;

use tracing::debug;

use crate::error::Result;
use crate::schema::{SearchResult, TenantId};
use crate::store::ArticleStore;

/// Score contributed by a substring match in the title
pub const CONTAINS_SCORE: f32 = 0.7;

/// Extra score when the title starts with the match
pub const PREFIX_BONUS: f32 = 0.3;

/// Keyword search over the article database
#[derive(Debug, Clone)]
pub struct KeywordSearcher {
    store: ArticleStore,
    overfetch_factor: usize,
}

impl KeywordSearcher {
    pub fn new(store: ArticleStore, overfetch_factor: usize) -> Self {
        Self {
            store,
            overfetch_factor: overfetch_factor.max(1),
        }
    }

    /// Top `limit` articles by title score, ties broken by recency.
    pub async fn search(
        &self,
        tenant: TenantId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let terms = split_terms(query);
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let fetch = limit.saturating_mul(self.overfetch_factor);
        let rows = self
            .store
            .keyword_candidates(tenant, terms.clone(), fetch)
            .await?;

        let phrase = query.trim().to_lowercase();
        let mut results: Vec<SearchResult> = rows
            .into_iter()
            .map(|row| {
                let score = title_score(&row.metadata.title, &phrase, &terms);
                SearchResult::keyword(row.article_id, score, Some(row.metadata))
            })
            .collect();

        // Stable: rows arrive newest first, so recency breaks ties
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        results.truncate(limit);

        debug!(
            "Keyword search for tenant {} returned {} results",
            tenant,
            results.len()
        );
        Ok(results)
    }
}

/// Lowercased whitespace-delimited terms, duplicates removed.
pub fn split_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in query.split_whitespace().map(str::to_lowercase) {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Best match score of the phrase or any term against the title.
///
/// `phrase` and `terms` must already be lowercase.
pub fn title_score(title: &str, phrase: &str, terms: &[String]) -> f32 {
    let title = title.to_lowercase();
    std::iter::once(phrase)
        .chain(terms.iter().map(String::as_str))
        .map(|needle| match_score(&title, needle))
        .fold(0.0, f32::max)
}

fn match_score(title: &str, needle: &str) -> f32 {
    if needle.is_empty() || !title.contains(needle) {
        return 0.0;
    }
    let mut score = CONTAINS_SCORE;
    if title.starts_with(needle) {
        score += PREFIX_BONUS;
    }
    score.min(1.0)
}
