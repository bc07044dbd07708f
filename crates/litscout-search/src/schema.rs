//! Request, response and candidate types shared by every search path.
//!
//! Responses serialize with camelCase keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Article primary key in the article database.
pub type ArticleId = i64;

/// Tenant (user) identifier scoping every read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub i64);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload field names stored alongside each article vector
pub mod fields {
    /// Owning tenant, used as the mandatory query filter
    pub const USER_ID: &str = "user_id";
    /// Article primary key (integer or numeric string)
    pub const ARTICLE_ID: &str = "article_id";
    /// Text the vector was computed from, sent to the reranker
    pub const DOCUMENT: &str = "document";
}

/// Requested retrieval mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Lexical title scoring over SQL matches
    Keyword,
    /// Embedding + vector similarity, optionally reranked
    Semantic,
    /// Keyword and semantic results fused by weighted score
    #[default]
    Hybrid,
    /// More-like-this over a source article, cached per tenant
    Related,
}

impl SearchMode {
    /// Whether this mode needs a non-empty query string.
    pub fn requires_query(self) -> bool {
        !matches!(self, SearchMode::Related)
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Keyword => write!(f, "keyword"),
            SearchMode::Semantic => write!(f, "semantic"),
            SearchMode::Hybrid => write!(f, "hybrid"),
            SearchMode::Related => write!(f, "related"),
        }
    }
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keyword" => Ok(SearchMode::Keyword),
            "semantic" => Ok(SearchMode::Semantic),
            "hybrid" => Ok(SearchMode::Hybrid),
            "related" => Ok(SearchMode::Related),
            other => Err(format!("unknown search mode: {}", other)),
        }
    }
}

/// A single call into the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub mode: SearchMode,
    pub tenant: TenantId,
    pub query: Option<String>,
    pub article_id: Option<ArticleId>,
    pub limit: usize,
    pub offset: usize,
    pub semantic_weight: f32,
    pub keyword_weight: f32,
    /// Divide semantic scores by the batch maximum before weighting
    pub normalize_scores: bool,
    /// Serve related results from the persisted cache when present
    pub use_cache: bool,
    /// Recompute related results even if cached
    pub refresh_cache: bool,
    /// Fall back to keyword-only results when semantic search fails
    pub fallback_enabled: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            mode: SearchMode::Hybrid,
            tenant: TenantId(0),
            query: None,
            article_id: None,
            limit: 10,
            offset: 0,
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            normalize_scores: true,
            use_cache: true,
            refresh_cache: false,
            fallback_enabled: true,
        }
    }
}

impl SearchRequest {
    /// Text search request for a tenant.
    pub fn text(mode: SearchMode, tenant: TenantId, query: impl Into<String>) -> Self {
        Self {
            mode,
            tenant,
            query: Some(query.into()),
            ..Default::default()
        }
    }

    /// Related-article request for a tenant.
    pub fn related(tenant: TenantId, article_id: ArticleId) -> Self {
        Self {
            mode: SearchMode::Related,
            tenant,
            article_id: Some(article_id),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Display metadata joined from the article and source tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleMetadata {
    pub title: String,
    pub url: String,
    pub summary: Option<String>,
    #[serde(rename = "published_at")]
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: String,
}

/// One scored article in a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub article_id: ArticleId,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ArticleMetadata>,
}

impl SearchResult {
    /// Semantic hit with its similarity (or rerank) score.
    pub fn semantic(article_id: ArticleId, score: f32, metadata: Option<ArticleMetadata>) -> Self {
        Self {
            article_id,
            score,
            semantic_score: Some(score),
            keyword_score: None,
            metadata,
        }
    }

    /// Keyword hit with its title score.
    pub fn keyword(article_id: ArticleId, score: f32, metadata: Option<ArticleMetadata>) -> Self {
        Self {
            article_id,
            score,
            semantic_score: None,
            keyword_score: Some(score),
            metadata,
        }
    }
}

/// Dispatcher output envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub mode: SearchMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    pub limit: usize,
    pub cached: bool,
    pub fallback: bool,
}

impl SearchResponse {
    /// Empty response for a request.
    pub fn empty(request: &SearchRequest) -> Self {
        Self {
            results: Vec::new(),
            mode: request.mode,
            query: request.query.clone(),
            total: 0,
            page: page_number(request),
            limit: request.limit,
            cached: false,
            fallback: false,
        }
    }

    /// Build a response from the fully materialized list, applying the
    /// offset/limit slice.
    pub fn paged(
        request: &SearchRequest,
        results: Vec<SearchResult>,
        cached: bool,
        fallback: bool,
    ) -> Self {
        let total = results.len();
        let results = results
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .collect();

        Self {
            results,
            mode: request.mode,
            query: request.query.clone(),
            total,
            page: page_number(request),
            limit: request.limit,
            cached,
            fallback,
        }
    }
}

fn page_number(request: &SearchRequest) -> Option<usize> {
    if request.mode == SearchMode::Related || request.limit == 0 {
        return None;
    }
    Some((request.offset / request.limit).saturating_add(1))
}

/// Transient vector-search candidate, never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCandidate {
    pub article_id: ArticleId,
    pub score: f32,
    pub document: String,
}

/// Persisted related-article row
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedCacheEntry {
    pub source_article_id: ArticleId,
    pub related_article_id: ArticleId,
    pub score: f32,
    pub created_at: DateTime<Utc>,
}
