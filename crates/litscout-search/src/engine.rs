//! Mode dispatcher: the single entry point for every search.
//!
//! Validation runs before any I/O. Text modes fail soft: an upstream error is
//! logged and turned into an empty response, except hybrid search with
//! fallback disabled, which propagates. Related-article errors propagate.

use std::sync::Arc;

use litscout_config::LitscoutConfig;
use tracing::{info, warn};

use crate::embeddings::{EmbeddingProvider, OpenAIProvider};
use crate::error::{Result, SearchError};
use crate::hybrid::{FusionWeights, HybridSearcher};
use crate::keyword::KeywordSearcher;
use crate::registry::VectorStoreRegistry;
use crate::related::{RelatedArticleEngine, RelatedSizing};
use crate::rerank::{HttpReranker, HttpRerankerConfig, NoReranker, Reranker};
use crate::schema::{SearchMode, SearchRequest, SearchResponse, SearchResult};
use crate::semantic::SemanticSearcher;
use crate::store::ArticleStore;

/// Unified search engine
#[derive(Clone)]
pub struct SearchEngine {
    keyword: KeywordSearcher,
    semantic: SemanticSearcher,
    hybrid: HybridSearcher,
    related: RelatedArticleEngine,
    registry: Arc<VectorStoreRegistry>,
    store: ArticleStore,
}

impl SearchEngine {
    /// Assemble an engine from its collaborators.
    pub fn new(
        store: ArticleStore,
        embedder: Arc<dyn EmbeddingProvider>,
        registry: Arc<VectorStoreRegistry>,
        reranker: Arc<dyn Reranker>,
        overfetch_factor: usize,
        sizing: RelatedSizing,
    ) -> Self {
        let keyword = KeywordSearcher::new(store.clone(), overfetch_factor);
        let semantic = SemanticSearcher::new(
            embedder,
            Arc::clone(&registry),
            reranker,
            store.clone(),
            overfetch_factor,
        );
        let hybrid = HybridSearcher::new(keyword.clone(), semantic.clone());
        let related = RelatedArticleEngine::new(semantic.clone(), store.clone(), sizing);

        Self {
            keyword,
            semantic,
            hybrid,
            related,
            registry,
            store,
        }
    }

    /// Build the production engine: OpenAI-compatible embeddings, Qdrant,
    /// and an HTTP reranker when any tenant has reranking enabled.
    pub fn from_config(config: &LitscoutConfig, store: ArticleStore) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(OpenAIProvider::from_settings(&config.embedding)?);
        let registry = Arc::new(VectorStoreRegistry::from_config(config)?);

        let rerank_config = HttpRerankerConfig::from_config(config)?;
        let reranker: Arc<dyn Reranker> = if rerank_config.any_enabled() {
            Arc::new(HttpReranker::new(rerank_config)?)
        } else {
            Arc::new(NoReranker)
        };

        Ok(Self::new(
            store,
            embedder,
            registry,
            reranker,
            config.search.overfetch_factor,
            RelatedSizing::from(&config.search.related),
        ))
    }

    /// Check a request before any I/O.
    pub fn validate(request: &SearchRequest) -> Result<()> {
        if request.mode == SearchMode::Related && request.article_id.is_none() {
            return Err(SearchError::validation("article_id is required for related mode"));
        }
        if request.mode.requires_query() {
            let blank = request
                .query
                .as_deref()
                .map(|q| q.trim().is_empty())
                .unwrap_or(true);
            if blank {
                return Err(SearchError::validation(format!(
                    "query is required for {} mode",
                    request.mode
                )));
            }
        }
        Ok(())
    }

    /// Run a search.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        Self::validate(request)?;

        if request.limit == 0 {
            return Ok(SearchResponse::empty(request));
        }

        // Upstream paths materialize everything up to the end of the page
        let cap = request.offset.saturating_add(request.limit);

        if request.mode == SearchMode::Related {
            let article_id = request
                .article_id
                .ok_or_else(|| SearchError::validation("article_id is required for related mode"))?;
            let outcome = self
                .related
                .related(
                    request.tenant,
                    article_id,
                    cap,
                    request.use_cache,
                    request.refresh_cache,
                )
                .await?;
            return Ok(SearchResponse::paged(
                request,
                outcome.results,
                outcome.cached,
                false,
            ));
        }

        let query = request.query.as_deref().unwrap_or_default().trim();
        info!(
            "{} search for tenant {} (limit {}, offset {})",
            request.mode, request.tenant, request.limit, request.offset
        );

        match self.run_text(request, query, cap).await {
            Ok((results, fallback)) => Ok(SearchResponse::paged(request, results, false, fallback)),
            Err(e) if request.mode == SearchMode::Hybrid && !request.fallback_enabled => Err(e),
            Err(e) => {
                warn!(
                    "{} search failed for tenant {}, returning empty response: {}",
                    request.mode, request.tenant, e
                );
                Ok(SearchResponse::empty(request))
            }
        }
    }

    async fn run_text(
        &self,
        request: &SearchRequest,
        query: &str,
        cap: usize,
    ) -> Result<(Vec<SearchResult>, bool)> {
        match request.mode {
            SearchMode::Keyword => Ok((self.keyword.search(request.tenant, query, cap).await?, false)),
            SearchMode::Semantic => Ok((self.semantic.search(request.tenant, query, cap).await?, false)),
            SearchMode::Hybrid => {
                let weights = FusionWeights {
                    semantic: request.semantic_weight,
                    keyword: request.keyword_weight,
                    normalize: request.normalize_scores,
                };
                let outcome = self
                    .hybrid
                    .search(request.tenant, query, cap, weights, request.fallback_enabled)
                    .await?;
                Ok((outcome.results, outcome.fallback))
            }
            SearchMode::Related => Err(SearchError::validation(
                "related mode is not a text search",
            )),
        }
    }

    /// Article database handle
    pub fn store(&self) -> &ArticleStore {
        &self.store
    }

    /// Semantic searcher, for status checks
    pub fn semantic(&self) -> &SemanticSearcher {
        &self.semantic
    }

    /// Drop every cached vector store handle.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }
}
