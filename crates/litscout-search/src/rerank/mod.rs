//! Optional reranking of semantic candidates.
//!
//! A reranker either returns an ordering over the submitted documents or
//! reports itself unavailable for the tenant. Unavailability is a normal
//! outcome; callers keep the vector-similarity order.

mod http;

pub use http::{HttpReranker, HttpRerankerConfig};

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::TenantId;

/// One reranked document: its index in the submitted list and a relevance
/// score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankHit {
    pub index: usize,
    pub score: f32,
}

/// Result of a rerank attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RerankOutcome {
    /// Server ordering, best first
    Reranked(Vec<RerankHit>),
    /// Reranking is not available for this tenant
    Unavailable,
}

/// Reorders documents by relevance to a query.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank `documents` against `query`, returning at most `top_n` hits.
    async fn rerank(
        &self,
        tenant: TenantId,
        query: &str,
        documents: Vec<String>,
        top_n: usize,
    ) -> Result<RerankOutcome>;
}

/// Reranker that is never available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReranker;

#[async_trait]
impl Reranker for NoReranker {
    async fn rerank(
        &self,
        _tenant: TenantId,
        _query: &str,
        _documents: Vec<String>,
        _top_n: usize,
    ) -> Result<RerankOutcome> {
        Ok(RerankOutcome::Unavailable)
    }
}

/// Reorder `items` by `hits`.
///
/// Referenced items come first in server order with their rerank score
/// substituted via `set_score`; unreferenced items follow in their original
/// relative order. Out-of-range and repeated indexes are skipped, so the
/// output never grows.
pub fn apply_rerank<T>(items: Vec<T>, hits: &[RerankHit], set_score: impl Fn(&mut T, f32)) -> Vec<T> {
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(slots.len());

    for hit in hits {
        if let Some(mut item) = slots.get_mut(hit.index).and_then(Option::take) {
            set_score(&mut item, hit.score);
            ordered.push(item);
        }
    }

    ordered.extend(slots.into_iter().flatten());
    ordered
}
