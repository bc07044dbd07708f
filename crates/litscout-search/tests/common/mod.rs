//! Common test utilities for litscout-search integration tests.
//!
//! In-process fakes for the embedding provider, vector store and reranker,
//! plus an in-memory article database seeded with a small fixture.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use litscout_config::VectorStoreSettings;
use litscout_search::{
    ArticleId, ArticleStore, EmbeddingProvider, NewArticle, ProviderStatus, RelatedSizing,
    RerankHit, RerankOutcome, Reranker, Result, SearchEngine, SearchError, TenantId,
    VectorFilter, VectorHit, VectorStore, VectorStoreConnector, VectorStoreRegistry,
};
use parking_lot::Mutex;

pub const TENANT: TenantId = TenantId(1);
pub const OTHER_TENANT: TenantId = TenantId(2);

/// Source article for related-article scenarios
pub const SOURCE_ARTICLE: ArticleId = 42;

// ============================================================================
// Embedding provider
// ============================================================================

/// Returns a fixed vector per text, or fails every call.
#[derive(Default)]
pub struct FakeEmbedder {
    pub fail: bool,
    pub calls: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
}

impl FakeEmbedder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, _tenant: TenantId, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SearchError::ProviderUnavailable(
                "embedding endpoint down".to_string(),
            ));
        }
        self.texts.lock().extend(texts.iter().cloned());
        Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3, 0.4]).collect())
    }

    async fn check_status(&self) -> Result<ProviderStatus> {
        Ok(ProviderStatus::healthy("fake"))
    }

    fn embedding_dim(&self) -> usize {
        4
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

// ============================================================================
// Vector store
// ============================================================================

/// Returns scripted hits, honoring the exclusion filter like Qdrant would.
#[derive(Default)]
pub struct ScriptedStore {
    pub hits: Mutex<Vec<VectorHit>>,
    pub fail: bool,
    pub queries: Mutex<Vec<(usize, VectorFilter)>>,
}

impl ScriptedStore {
    pub fn with_hits(hits: Vec<VectorHit>) -> Self {
        Self {
            hits: Mutex::new(hits),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn set_hits(&self, hits: Vec<VectorHit>) {
        *self.hits.lock() = hits;
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().len()
    }
}

#[async_trait]
impl VectorStore for ScriptedStore {
    async fn query(
        &self,
        _vector: Vec<f32>,
        k: usize,
        filter: VectorFilter,
    ) -> Result<Vec<VectorHit>> {
        self.queries.lock().push((k, filter));
        if self.fail {
            return Err(SearchError::Connection("qdrant unreachable".to_string()));
        }
        Ok(self
            .hits
            .lock()
            .iter()
            .filter(|h| filter.exclude_article.is_none() || h.article_id != filter.exclude_article)
            .take(k)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<()> {
        if self.fail {
            return Err(SearchError::Connection("qdrant unreachable".to_string()));
        }
        Ok(())
    }
}

/// Hands out the same scripted store for every tenant.
pub struct ScriptedConnector {
    pub store: Arc<ScriptedStore>,
    pub connects: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(store: Arc<ScriptedStore>) -> Self {
        Self {
            store,
            connects: AtomicUsize::new(0),
        }
    }
}

impl VectorStoreConnector for ScriptedConnector {
    fn connect(&self, _settings: &VectorStoreSettings) -> Result<Arc<dyn VectorStore>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.clone())
    }
}

pub fn hit(article_id: ArticleId, score: f32) -> VectorHit {
    VectorHit {
        article_id: Some(article_id),
        score,
        document: format!("document {}", article_id),
    }
}

// ============================================================================
// Reranker
// ============================================================================

/// Returns a fixed outcome and records the requested `top_n`.
pub struct ScriptedReranker {
    pub outcome: Option<RerankOutcome>,
    pub top_n: Mutex<Vec<usize>>,
}

impl ScriptedReranker {
    pub fn reranked(hits: Vec<RerankHit>) -> Self {
        Self {
            outcome: Some(RerankOutcome::Reranked(hits)),
            top_n: Mutex::new(Vec::new()),
        }
    }

    /// Reranker whose every call fails
    pub fn failing() -> Self {
        Self {
            outcome: None,
            top_n: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Reranker for ScriptedReranker {
    async fn rerank(
        &self,
        _tenant: TenantId,
        _query: &str,
        _documents: Vec<String>,
        top_n: usize,
    ) -> Result<RerankOutcome> {
        self.top_n.lock().push(top_n);
        self.outcome
            .clone()
            .ok_or_else(|| SearchError::Rerank("rerank service returned 500".to_string()))
    }
}

// ============================================================================
// Article database fixture
// ============================================================================

/// Article row in the fixture
pub struct FixtureArticle {
    pub id: ArticleId,
    pub tenant: TenantId,
    pub title: &'static str,
    pub day: u32,
    pub filter_status: &'static str,
    pub process_status: &'static str,
}

impl FixtureArticle {
    pub const fn passed(id: ArticleId, title: &'static str, day: u32) -> Self {
        Self {
            id,
            tenant: TENANT,
            title,
            day,
            filter_status: "passed",
            process_status: "completed",
        }
    }
}

/// Tenant 1 owns articles 1-8 and the related-article source 42; tenant 2
/// owns article 100. Article 7 was filtered out and article 8 is still
/// being processed.
pub fn fixture_articles() -> Vec<FixtureArticle> {
    vec![
        FixtureArticle::passed(1, "Transformer attention explained", 1),
        FixtureArticle::passed(2, "GPT-4 technical report", 2),
        FixtureArticle::passed(3, "Scaling laws for GPT models", 3),
        FixtureArticle::passed(4, "Sparse attention patterns", 4),
        FixtureArticle::passed(5, "Diffusion models survey", 5),
        FixtureArticle::passed(6, "Retrieval augmented generation", 6),
        FixtureArticle {
            filter_status: "rejected",
            ..FixtureArticle::passed(7, "GPT spam", 7)
        },
        FixtureArticle {
            process_status: "pending",
            ..FixtureArticle::passed(8, "Attention in vision transformers", 8)
        },
        FixtureArticle::passed(SOURCE_ARTICLE, "Efficient transformers", 9),
        FixtureArticle {
            tenant: OTHER_TENANT,
            ..FixtureArticle::passed(100, "GPT for another tenant", 10)
        },
    ]
}

/// In-memory article database seeded with [`fixture_articles`].
pub async fn seeded_store() -> ArticleStore {
    let store = ArticleStore::in_memory().expect("in-memory store");
    let own_source = store
        .insert_source(TENANT, "arXiv cs.CL")
        .await
        .expect("insert source");
    let other_source = store
        .insert_source(OTHER_TENANT, "Other feed")
        .await
        .expect("insert source");

    for article in fixture_articles() {
        let source_id = if article.tenant == TENANT {
            own_source
        } else {
            other_source
        };
        store
            .insert_article(
                Some(article.id),
                NewArticle {
                    source_id,
                    title: article.title.to_string(),
                    url: format!("https://example.org/{}", article.id),
                    content: Some(format!("{} body text", article.title)),
                    cleaned_content: Some(format!("{} cleaned body", article.title)),
                    summary: None,
                    published_at: Some(Utc.with_ymd_and_hms(2024, 6, article.day, 0, 0, 0).unwrap()),
                    filter_status: article.filter_status.to_string(),
                    process_status: article.process_status.to_string(),
                },
            )
            .await
            .expect("insert article");
    }

    store
}

// ============================================================================
// Engine assembly
// ============================================================================

/// Engine wired to fakes, with handles kept for assertions.
pub struct TestEngine {
    pub engine: SearchEngine,
    pub store: ArticleStore,
    pub embedder: Arc<FakeEmbedder>,
    pub vectors: Arc<ScriptedStore>,
}

pub struct TestEngineBuilder {
    embedder: FakeEmbedder,
    vectors: ScriptedStore,
    reranker: Option<Arc<dyn Reranker>>,
    sizing: RelatedSizing,
}

impl TestEngineBuilder {
    pub fn new() -> Self {
        Self {
            embedder: FakeEmbedder::default(),
            vectors: ScriptedStore::default(),
            reranker: None,
            sizing: RelatedSizing::default(),
        }
    }

    pub fn embedder(mut self, embedder: FakeEmbedder) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn vectors(mut self, vectors: ScriptedStore) -> Self {
        self.vectors = vectors;
        self
    }

    pub fn hits(self, hits: Vec<VectorHit>) -> Self {
        self.vectors(ScriptedStore::with_hits(hits))
    }

    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn sizing(mut self, sizing: RelatedSizing) -> Self {
        self.sizing = sizing;
        self
    }

    pub async fn build(self) -> TestEngine {
        let store = seeded_store().await;
        let embedder = Arc::new(self.embedder);
        let vectors = Arc::new(self.vectors);
        let registry = Arc::new(VectorStoreRegistry::new(
            VectorStoreSettings::default(),
            Arc::new(ScriptedConnector::new(vectors.clone())),
        ));
        let reranker = self
            .reranker
            .unwrap_or_else(|| Arc::new(litscout_search::NoReranker));

        let engine = SearchEngine::new(
            store.clone(),
            embedder.clone(),
            registry,
            reranker,
            3,
            self.sizing,
        );

        TestEngine {
            engine,
            store,
            embedder,
            vectors,
        }
    }
}

impl Default for TestEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
