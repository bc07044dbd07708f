//! HTTP reranker for Jina/Cohere-compatible endpoints
//!
//! # Endpoint Format
//!
//! - POST `{base_url}/v1/rerank`
//! - Request: `{"model": "...", "query": "...", "documents": [...], "top_n": 5}`
//! - Response: `{"results": [{"index": 2, "relevance_score": 0.93}, ...]}`

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use litscout_config::LitscoutConfig;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{RerankHit, RerankOutcome, Reranker};
use crate::error::{Result, SearchError};
use crate::schema::TenantId;

/// Configuration for [`HttpReranker`]
#[derive(Debug, Clone)]
pub struct HttpRerankerConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    /// Enablement for tenants without an override
    pub enabled: bool,
    /// Per-tenant enablement
    pub tenant_enabled: HashMap<TenantId, bool>,
}

impl HttpRerankerConfig {
    /// Build from configuration, resolving the API key from the environment.
    pub fn from_config(config: &LitscoutConfig) -> Result<Self> {
        let settings = &config.rerank;
        let api_key = settings
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty());

        let tenant_enabled = config
            .tenant_overrides()?
            .into_iter()
            .filter(|(_, tenant)| tenant.rerank_enabled.is_some())
            .map(|(id, _)| (TenantId(id), config.rerank_enabled_for(id)))
            .collect();

        Ok(Self {
            base_url: settings.url.clone(),
            api_key,
            model: settings.model.clone(),
            timeout_secs: settings.timeout_secs,
            enabled: settings.enabled,
            tenant_enabled,
        })
    }

    /// Whether any tenant can use the reranker.
    pub fn any_enabled(&self) -> bool {
        self.enabled || self.tenant_enabled.values().any(|on| *on)
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: Vec<String>,
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

/// Reranker backed by a remote `/v1/rerank` endpoint
pub struct HttpReranker {
    client: Client,
    config: HttpRerankerConfig,
}

impl HttpReranker {
    pub fn new(config: HttpRerankerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Whether reranking is enabled for a tenant.
    pub fn enabled_for(&self, tenant: TenantId) -> bool {
        self.config
            .tenant_enabled
            .get(&tenant)
            .copied()
            .unwrap_or(self.config.enabled)
    }

    fn rerank_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{}/rerank", base)
        } else {
            format!("{}/v1/rerank", base)
        }
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        tenant: TenantId,
        query: &str,
        documents: Vec<String>,
        top_n: usize,
    ) -> Result<RerankOutcome> {
        if !self.enabled_for(tenant) {
            return Ok(RerankOutcome::Unavailable);
        }
        if documents.is_empty() || top_n == 0 {
            return Ok(RerankOutcome::Reranked(Vec::new()));
        }

        let body = RerankRequest {
            model: &self.config.model,
            query,
            documents,
            top_n,
        };

        let mut request = self.client.post(self.rerank_url()).json(&body);
        if let Some(ref api_key) = self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Rerank("Rerank request timed out".into())
            } else {
                SearchError::Rerank(format!("Rerank request failed: {}", e))
            }
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Rerank(format!(
                "Rerank failed with status {}: {}",
                status, body
            )));
        }

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Rerank(format!("Invalid rerank response: {}", e)))?;

        debug!(
            "Reranker returned {} hits for tenant {}",
            parsed.results.len(),
            tenant
        );

        Ok(RerankOutcome::Reranked(
            parsed
                .results
                .into_iter()
                .map(|r| RerankHit {
                    index: r.index,
                    score: r.relevance_score,
                })
                .collect(),
        ))
    }
}

impl std::fmt::Debug for HttpReranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpReranker")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("enabled", &self.config.enabled)
            .finish()
    }
}
