//! Semantic search: embed → vector query → optional rerank → metadata.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::VectorFilter;
use crate::embeddings::EmbeddingProvider;
use crate::error::{Result, SearchError};
use crate::registry::VectorStoreRegistry;
use crate::rerank::{apply_rerank, RerankOutcome, Reranker};
use crate::schema::{ArticleId, SearchCandidate, SearchResult, TenantId};
use crate::store::ArticleStore;

/// Vector-similarity search with reranking and metadata enrichment
#[derive(Clone)]
pub struct SemanticSearcher {
    embedder: Arc<dyn EmbeddingProvider>,
    registry: Arc<VectorStoreRegistry>,
    reranker: Arc<dyn Reranker>,
    store: ArticleStore,
    overfetch_factor: usize,
}

impl SemanticSearcher {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        registry: Arc<VectorStoreRegistry>,
        reranker: Arc<dyn Reranker>,
        store: ArticleStore,
        overfetch_factor: usize,
    ) -> Self {
        Self {
            embedder,
            registry,
            reranker,
            store,
            overfetch_factor: overfetch_factor.max(1),
        }
    }

    /// Scored candidates for `query`, best first, before enrichment.
    ///
    /// Candidates without a usable article id, or equal to `exclude`, are
    /// dropped. Rerank failures keep the vector order.
    pub async fn retrieve(
        &self,
        tenant: TenantId,
        query: &str,
        limit: usize,
        exclude: Option<ArticleId>,
    ) -> Result<Vec<SearchCandidate>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let vector = self
            .embedder
            .embed(tenant, vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::Embedding("Provider returned no vector".into()))?;

        let store = self.registry.store_for(tenant).await?;
        let mut filter = VectorFilter::tenant(tenant);
        if let Some(id) = exclude {
            filter = filter.excluding(id);
        }

        let k = limit.saturating_mul(self.overfetch_factor).max(limit);
        let hits = store.query(vector, k, filter).await?;
        let raw = hits.len();

        let candidates: Vec<SearchCandidate> = hits
            .into_iter()
            .filter_map(|hit| {
                let article_id = hit.article_id?;
                if Some(article_id) == exclude {
                    return None;
                }
                Some(SearchCandidate {
                    article_id,
                    score: hit.score,
                    document: hit.document,
                })
            })
            .collect();

        debug!(
            "Vector store returned {} hits ({} usable) for tenant {}",
            raw,
            candidates.len(),
            tenant
        );

        if candidates.is_empty() {
            return Ok(candidates);
        }

        Ok(self.rerank(tenant, query, candidates, limit).await)
    }

    async fn rerank(
        &self,
        tenant: TenantId,
        query: &str,
        candidates: Vec<SearchCandidate>,
        limit: usize,
    ) -> Vec<SearchCandidate> {
        let top_n = limit.min(candidates.len());
        let documents = candidates.iter().map(|c| c.document.clone()).collect();

        match self.reranker.rerank(tenant, query, documents, top_n).await {
            Ok(RerankOutcome::Reranked(hits)) => {
                debug!("Applying {} rerank hits for tenant {}", hits.len(), tenant);
                apply_rerank(candidates, &hits, |c, score| c.score = score)
            }
            Ok(RerankOutcome::Unavailable) => candidates,
            Err(e) => {
                warn!(
                    "Rerank failed for tenant {}, keeping vector order: {}",
                    tenant, e
                );
                candidates
            }
        }
    }

    /// Top `limit` semantic results with metadata.
    ///
    /// Candidates that are not passed or not owned by the tenant are dropped
    /// rather than replaced.
    pub async fn search(
        &self,
        tenant: TenantId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let mut candidates = self.retrieve(tenant, query, limit, None).await?;
        candidates.truncate(limit);

        let ids = candidates.iter().map(|c| c.article_id).collect();
        let mut metadata = self.store.article_metadata(tenant, ids, false).await?;

        let results: Vec<SearchResult> = candidates
            .into_iter()
            .filter_map(|c| {
                metadata
                    .remove(&c.article_id)
                    .map(|meta| SearchResult::semantic(c.article_id, c.score, Some(meta)))
            })
            .collect();

        debug!(
            "Semantic search for tenant {} returned {} results",
            tenant,
            results.len()
        );
        Ok(results)
    }

    /// The embedding provider in use
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// The vector store registry in use
    pub fn registry(&self) -> &Arc<VectorStoreRegistry> {
        &self.registry
    }
}
