//! Litscout Search - Unified article search and related-article retrieval
//!
//! This crate answers search requests over a tenant's collected articles,
//! combining an SQLite article database with a Qdrant vector index.
//!
//! # Features
//!
//! - **Multi-tenant**: every query is scoped to one user via `user_id`
//! - **Four modes**: keyword, semantic, hybrid (weighted fusion) and related articles
//! - **Optional reranking**: semantic candidates can be reordered by a rerank service
//! - **Related cache**: related-article lists are persisted per source article
//!
//! # Example
//!
//! ```ignore
//! use litscout_config::ConfigLoader;
//! use litscout_search::{ArticleStore, SearchEngine, SearchMode, SearchRequest, TenantId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().load(std::path::Path::new("."), None, None)?;
//!     let store = ArticleStore::open(&config.database.path)?;
//!     let engine = SearchEngine::from_config(&config, store)?;
//!
//!     let request = SearchRequest::text(SearchMode::Hybrid, TenantId(1), "sparse attention");
//!     let response = engine.search(&request).await?;
//!     for result in response.results {
//!         println!("{} {:.3}", result.article_id, result.score);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod hybrid;
pub mod keyword;
pub mod registry;
pub mod related;
pub mod rerank;
pub mod schema;
pub mod semantic;
pub mod store;

// Re-exports for convenience
pub use client::{QdrantStore, VectorFilter, VectorHit, VectorStore};
pub use embeddings::{EmbeddingProvider, OpenAIConfig, OpenAIProvider, ProviderStatus};
pub use engine::SearchEngine;
pub use error::{Result, SearchError};
pub use hybrid::{fuse_results, FusionWeights, HybridOutcome, HybridSearcher};
pub use keyword::KeywordSearcher;
pub use registry::{QdrantConnector, VectorStoreConnector, VectorStoreRegistry};
pub use related::{RelatedArticleEngine, RelatedOutcome, RelatedSizing};
pub use rerank::{HttpReranker, HttpRerankerConfig, NoReranker, RerankHit, RerankOutcome, Reranker};
pub use schema::{
    ArticleId, ArticleMetadata, RelatedCacheEntry, SearchCandidate, SearchMode, SearchRequest,
    SearchResponse, SearchResult, TenantId,
};
pub use semantic::SemanticSearcher;
pub use store::{ArticleStore, NewArticle, SourceDocument};
