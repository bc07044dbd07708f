//! Vector store abstraction and its Qdrant implementation
//!
//! Every query is scoped to one tenant through a payload filter on `user_id`.

use async_trait::async_trait;
use litscout_config::VectorStoreSettings;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, Condition, Filter, ScoredPoint, SearchPointsBuilder,
};
use qdrant_client::Qdrant;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, SearchError};
use crate::schema::{fields, ArticleId, TenantId};

/// Tenant scope and optional exclusion for a vector query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorFilter {
    pub tenant: TenantId,
    pub exclude_article: Option<ArticleId>,
}

impl VectorFilter {
    pub fn tenant(tenant: TenantId) -> Self {
        Self {
            tenant,
            exclude_article: None,
        }
    }

    pub fn excluding(mut self, article_id: ArticleId) -> Self {
        self.exclude_article = Some(article_id);
        self
    }

    fn to_qdrant(self) -> Filter {
        let mut filter = Filter::must([Condition::matches(fields::USER_ID, self.tenant.0)]);
        if let Some(id) = self.exclude_article {
            filter.must_not = vec![Condition::matches(fields::ARTICLE_ID, id)];
        }
        filter
    }
}

/// Raw nearest-neighbor hit. `article_id` is `None` when the point carries
/// no resolvable positive id.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub article_id: Option<ArticleId>,
    pub score: f32,
    pub document: String,
}

/// Approximate nearest-neighbor query over tenant-scoped vectors
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return up to `k` hits ordered by similarity, best first.
    async fn query(&self, vector: Vec<f32>, k: usize, filter: VectorFilter)
        -> Result<Vec<VectorHit>>;

    /// Check that the store is reachable.
    async fn health_check(&self) -> Result<()>;
}

/// Qdrant-backed vector store for one collection
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
}

impl QdrantStore {
    /// Build a client from connection settings.
    ///
    /// The connection itself is established lazily on first query.
    pub fn new(settings: &VectorStoreSettings) -> Result<Self> {
        let url = settings.url();
        info!(
            "Creating Qdrant client for {} (collection '{}')",
            url, settings.collection
        );

        let mut builder =
            Qdrant::from_url(&url).timeout(Duration::from_secs(settings.timeout_secs));
        if let Some(api_key) = settings.api_key() {
            builder = builder.api_key(api_key);
        }

        let client = builder.build().map_err(|e| {
            SearchError::Connection(format!("Failed to build Qdrant client: {}", e))
        })?;

        Ok(Self {
            client,
            collection: settings.collection.clone(),
        })
    }

    /// Collection queried by this store
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn query(
        &self,
        vector: Vec<f32>,
        k: usize,
        filter: VectorFilter,
    ) -> Result<Vec<VectorHit>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, vector, k as u64)
                    .filter(filter.to_qdrant())
                    .with_payload(true),
            )
            .await?;

        let hits: Vec<VectorHit> = response.result.into_iter().map(point_to_hit).collect();
        debug!(
            "Qdrant returned {} hits from '{}' for tenant {}",
            hits.len(),
            self.collection,
            filter.tenant
        );
        Ok(hits)
    }

    async fn health_check(&self) -> Result<()> {
        self.client
            .health_check()
            .await
            .map_err(|e| SearchError::Connection(format!("Qdrant unreachable: {}", e)))?;
        Ok(())
    }
}

fn point_to_hit(point: ScoredPoint) -> VectorHit {
    let payload_id = point
        .payload
        .get(fields::ARTICLE_ID)
        .and_then(|v| {
            v.as_integer()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
        });

    let point_id = point
        .id
        .and_then(|id| id.point_id_options)
        .and_then(|opts| match opts {
            PointIdOptions::Num(n) => i64::try_from(n).ok(),
            PointIdOptions::Uuid(_) => None,
        });

    let document = point
        .payload
        .get(fields::DOCUMENT)
        .and_then(|v| v.as_str())
        .cloned()
        .unwrap_or_default();

    VectorHit {
        article_id: resolve_article_id(payload_id, point_id),
        score: point.score,
        document,
    }
}

/// Prefer the payload id, fall back to a numeric point id; only positive ids
/// are usable.
fn resolve_article_id(payload_id: Option<i64>, point_id: Option<i64>) -> Option<ArticleId> {
    payload_id.or(point_id).filter(|id| *id > 0)
}
