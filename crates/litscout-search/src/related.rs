//! Related-article retrieval ("more like this") with a persisted cache.
//!
//! The source article's title and content form a synthetic query that runs
//! through semantic search with the source itself excluded. The result size
//! depends on how many candidates clear a confidence threshold:
//!
//! - at least `min_high_confidence` candidates above `high_score_threshold`:
//!   up to `min(limit, high_confidence_cap)` of those candidates
//! - otherwise: the top `min(limit, low_confidence_cap)` candidates regardless
//!   of score
//!
//! Every computed list replaces the cached list for that source, including an
//! empty one.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use litscout_config::RelatedSettings;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::error::Result;
use crate::schema::{ArticleId, ArticleMetadata, SearchCandidate, SearchResult, TenantId};
use crate::semantic::SemanticSearcher;
use crate::store::{ArticleStore, SourceDocument};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Result-size parameters for related articles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelatedSizing {
    /// Scores strictly above this are high confidence
    pub high_score_threshold: f32,
    /// High-confidence candidates needed for the wide tier
    pub min_high_confidence: usize,
    /// Cap for the wide tier
    pub high_confidence_cap: usize,
    /// Cap for the narrow tier
    pub low_confidence_cap: usize,
    /// Character budget for content in the query document
    pub max_content_chars: usize,
}

impl Default for RelatedSizing {
    fn default() -> Self {
        Self::from(&RelatedSettings::default())
    }
}

impl From<&RelatedSettings> for RelatedSizing {
    fn from(settings: &RelatedSettings) -> Self {
        Self {
            high_score_threshold: settings.high_score_threshold,
            min_high_confidence: settings.min_high_confidence,
            high_confidence_cap: settings.high_confidence_cap,
            low_confidence_cap: settings.low_confidence_cap,
            max_content_chars: settings.max_content_chars,
        }
    }
}

impl RelatedSizing {
    /// Apply two-tier sizing to candidates sorted best first.
    pub fn select<T>(&self, sorted: Vec<T>, limit: usize, score: impl Fn(&T) -> f32) -> Vec<T> {
        let high_count = sorted
            .iter()
            .filter(|c| score(c) > self.high_score_threshold)
            .count();

        if high_count >= self.min_high_confidence {
            let effective = limit.min(self.high_confidence_cap);
            sorted
                .into_iter()
                .filter(|c| score(c) > self.high_score_threshold)
                .take(effective)
                .collect()
        } else {
            let effective = limit.min(self.low_confidence_cap);
            sorted.into_iter().take(effective).collect()
        }
    }
}

/// Related results and whether they were served from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedOutcome {
    pub results: Vec<SearchResult>,
    pub cached: bool,
}

impl RelatedOutcome {
    fn computed(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            cached: false,
        }
    }
}

/// Related-article engine
#[derive(Clone)]
pub struct RelatedArticleEngine {
    semantic: SemanticSearcher,
    store: ArticleStore,
    sizing: RelatedSizing,
}

impl RelatedArticleEngine {
    pub fn new(semantic: SemanticSearcher, store: ArticleStore, sizing: RelatedSizing) -> Self {
        Self {
            semantic,
            store,
            sizing,
        }
    }

    pub fn sizing(&self) -> &RelatedSizing {
        &self.sizing
    }

    /// Related articles for `article_id`.
    ///
    /// With `use_cache` and without `refresh`, a non-empty cached list is
    /// returned as is. Otherwise the list is recomputed and persisted.
    ///
    /// The persisted list is sized by the `limit` of the call that computed
    /// it. A later cached read with a larger `limit` gets that shorter list;
    /// pass `refresh` to recompute at the new size.
    pub async fn related(
        &self,
        tenant: TenantId,
        article_id: ArticleId,
        limit: usize,
        use_cache: bool,
        refresh: bool,
    ) -> Result<RelatedOutcome> {
        if use_cache && !refresh {
            if let Some(results) = self.read_cached(tenant, article_id).await? {
                debug!(
                    "Serving {} cached related articles for {} (tenant {})",
                    results.len(),
                    article_id,
                    tenant
                );
                return Ok(RelatedOutcome {
                    results,
                    cached: true,
                });
            }
        }

        let Some(source) = self.store.source_document(tenant, article_id).await? else {
            debug!(
                "Article {} not owned by tenant {}, no related articles",
                article_id, tenant
            );
            return Ok(RelatedOutcome::computed(Vec::new()));
        };

        let results = match build_query_document(&source, self.sizing.max_content_chars) {
            Some(document) => self.compute(tenant, article_id, &document, limit).await?,
            None => Vec::new(),
        };

        let related = results.iter().map(|r| (r.article_id, r.score)).collect();
        self.store
            .replace_related_cache(tenant, article_id, related)
            .await?;

        info!(
            "Computed {} related articles for {} (tenant {})",
            results.len(),
            article_id,
            tenant
        );
        Ok(RelatedOutcome::computed(results))
    }

    async fn compute(
        &self,
        tenant: TenantId,
        article_id: ArticleId,
        document: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        // Every retrieved candidate is sorted; sizing applies the limit
        let mut candidates = self
            .semantic
            .retrieve(tenant, document, limit, Some(article_id))
            .await?;

        let ids = candidates.iter().map(|c| c.article_id).collect();
        let mut metadata = self.store.article_metadata(tenant, ids, true).await?;

        sort_by_score_then_recency(&mut candidates, &metadata);
        let selected = self.sizing.select(candidates, limit, |c| c.score);

        Ok(selected
            .into_iter()
            .filter(|c| c.article_id != article_id)
            .filter_map(|c| {
                metadata
                    .remove(&c.article_id)
                    .map(|meta| SearchResult::semantic(c.article_id, c.score, Some(meta)))
            })
            .collect())
    }

    async fn read_cached(
        &self,
        tenant: TenantId,
        article_id: ArticleId,
    ) -> Result<Option<Vec<SearchResult>>> {
        let entries = self.store.read_related_cache(tenant, article_id).await?;
        if entries.is_empty() {
            return Ok(None);
        }

        let ids = entries.iter().map(|e| e.related_article_id).collect();
        let mut metadata = self.store.article_metadata(tenant, ids, true).await?;

        Ok(Some(
            entries
                .into_iter()
                .filter_map(|e| {
                    metadata.remove(&e.related_article_id).map(|meta| {
                        SearchResult::semantic(e.related_article_id, e.score, Some(meta))
                    })
                })
                .collect(),
        ))
    }
}

/// Sort by score descending, then newest `published_at` first with missing
/// dates last.
fn sort_by_score_then_recency(
    candidates: &mut [SearchCandidate],
    metadata: &HashMap<ArticleId, ArticleMetadata>,
) {
    let published = |id: &ArticleId| -> Option<DateTime<Utc>> {
        metadata.get(id).and_then(|m| m.published_at)
    };

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| match (published(&a.article_id), published(&b.article_id)) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    });
}

/// `"TITLE: <title>\nCONTENT: <content>"`, or `None` when the article has
/// no usable text.
///
/// Cleaned content is preferred over raw content. Whitespace runs are
/// collapsed and content is cut to `max_content_chars` characters.
pub fn build_query_document(source: &SourceDocument, max_content_chars: usize) -> Option<String> {
    let title = collapse_whitespace(&source.title);

    let content = [&source.cleaned_content, &source.content]
        .into_iter()
        .flatten()
        .map(|c| collapse_whitespace(c))
        .find(|c| !c.is_empty())
        .unwrap_or_default();
    let content: String = content.chars().take(max_content_chars).collect();

    if title.is_empty() && content.is_empty() {
        return None;
    }
    Some(format!("TITLE: {}\nCONTENT: {}", title, content.trim_end()))
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}
