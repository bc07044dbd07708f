//! Hybrid search fusing keyword and semantic results
//!
//! Keyword search always runs. Semantic search is attempted; when it fails
//! the keyword results are returned alone if fallback is enabled.
//!
//! ## Fusion
//!
//! Results are merged by article id, seeded with the semantic list:
//!
//! - in both lists: `semantic' × semantic_weight + keyword × keyword_weight`,
//!   where `semantic'` is the semantic score divided by the batch maximum when
//!   normalization is on, or the raw score otherwise
//! - semantic only: the semantic score
//! - keyword only: the keyword score

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::Result;
use crate::keyword::KeywordSearcher;
use crate::schema::{ArticleId, SearchResult, TenantId};
use crate::semantic::SemanticSearcher;

/// Fusion parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub semantic: f32,
    pub keyword: f32,
    /// Divide semantic scores by the batch maximum before weighting
    pub normalize: bool,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            semantic: 0.7,
            keyword: 0.3,
            normalize: true,
        }
    }
}

/// Fused results and whether they came from the keyword fallback
#[derive(Debug, Clone, PartialEq)]
pub struct HybridOutcome {
    pub results: Vec<SearchResult>,
    pub fallback: bool,
}

/// Runs keyword and semantic search and fuses them
#[derive(Clone)]
pub struct HybridSearcher {
    keyword: KeywordSearcher,
    semantic: SemanticSearcher,
}

impl HybridSearcher {
    pub fn new(keyword: KeywordSearcher, semantic: SemanticSearcher) -> Self {
        Self { keyword, semantic }
    }

    /// Fused top `limit` results.
    ///
    /// Keyword errors propagate. Semantic errors propagate only when
    /// `fallback_enabled` is false.
    pub async fn search(
        &self,
        tenant: TenantId,
        query: &str,
        limit: usize,
        weights: FusionWeights,
        fallback_enabled: bool,
    ) -> Result<HybridOutcome> {
        let keyword_results = self.keyword.search(tenant, query, limit).await?;

        let semantic_results = match self.semantic.search(tenant, query, limit).await {
            Ok(results) => results,
            Err(e) if fallback_enabled => {
                warn!(
                    "Semantic search failed for tenant {}, using keyword results: {}",
                    tenant, e
                );
                return Ok(HybridOutcome {
                    results: keyword_results,
                    fallback: true,
                });
            }
            Err(e) => return Err(e),
        };

        debug!(
            "Fusing {} semantic and {} keyword results for tenant {}",
            semantic_results.len(),
            keyword_results.len(),
            tenant
        );

        Ok(HybridOutcome {
            results: fuse_results(semantic_results, keyword_results, weights, limit),
            fallback: false,
        })
    }
}

/// Merge semantic and keyword results by article id, sorted by combined
/// score and cut to `limit`.
pub fn fuse_results(
    semantic: Vec<SearchResult>,
    keyword: Vec<SearchResult>,
    weights: FusionWeights,
    limit: usize,
) -> Vec<SearchResult> {
    let max_semantic = semantic
        .iter()
        .map(|r| r.score)
        .fold(f32::NEG_INFINITY, f32::max);
    let scale = |score: f32| {
        if weights.normalize && max_semantic > 0.0 {
            score / max_semantic
        } else {
            score
        }
    };

    let mut fused: Vec<SearchResult> = Vec::with_capacity(semantic.len() + keyword.len());
    let mut index: HashMap<ArticleId, usize> = HashMap::new();

    for result in semantic {
        if index.contains_key(&result.article_id) {
            continue;
        }
        index.insert(result.article_id, fused.len());
        fused.push(SearchResult {
            semantic_score: Some(result.score),
            ..result
        });
    }

    for result in keyword {
        let keyword_score = result.keyword_score.unwrap_or(result.score);
        match index.get(&result.article_id) {
            Some(&i) => {
                let entry = &mut fused[i];
                let semantic_score = entry.semantic_score.unwrap_or(entry.score);
                entry.keyword_score = Some(keyword_score);
                entry.score =
                    scale(semantic_score) * weights.semantic + keyword_score * weights.keyword;
                if entry.metadata.is_none() {
                    entry.metadata = result.metadata;
                }
            }
            None => {
                index.insert(result.article_id, fused.len());
                fused.push(SearchResult::keyword(
                    result.article_id,
                    keyword_score,
                    result.metadata,
                ));
            }
        }
    }

    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    fused.truncate(limit);
    fused
}
