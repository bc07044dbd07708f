//! OpenAI-compatible embedding provider
//!
//! # Endpoint Format
//!
//! - POST `{base_url}/v1/embeddings`
//! - Request: `{"model": "...", "input": ["text1", ...], "user": "tenant-7"}`
//! - Response: `{"data": [{"embedding": [...], "index": 0}, ...], ...}`
//!
//! A failed request is reported once; the caller decides whether to degrade.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use litscout_config::EmbeddingSettings;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(feature = "rate-limit")]
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
#[cfg(feature = "rate-limit")]
use std::num::NonZeroU32;
#[cfg(feature = "rate-limit")]
use std::sync::Arc;

use super::provider::{EmbeddingProvider, ProviderStatus};
use crate::error::{Result, SearchError};
use crate::schema::TenantId;

/// Default requests per second limit
#[cfg(feature = "rate-limit")]
const DEFAULT_REQUESTS_PER_SECOND: u32 = 10;

#[cfg(feature = "rate-limit")]
type EmbeddingRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Configuration for the OpenAI-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API (e.g., "https://api.openai.com/v1")
    pub base_url: String,
    /// API key (optional for local servers)
    pub api_key: Option<String>,
    /// Embedding model name
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Requests per second limit (when rate-limit feature enabled)
    #[cfg(feature = "rate-limit")]
    pub requests_per_second: u32,
}

impl OpenAIConfig {
    /// Build from configuration, resolving the API key from the environment.
    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        let api_key = settings
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty());

        Self {
            base_url: settings.url.clone(),
            api_key,
            model: settings.model.clone(),
            timeout_secs: settings.timeout_secs,
            #[cfg(feature = "rate-limit")]
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
        }
    }

    /// Set requests per second limit (when rate-limit feature enabled)
    #[cfg(feature = "rate-limit")]
    pub fn with_requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = rps;
        self
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest {
    model: String,
    input: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

/// OpenAI-compatible embedding provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
    /// Embedding dimension detected from the first response
    dimension: AtomicUsize,
    #[cfg(feature = "rate-limit")]
    rate_limiter: Arc<EmbeddingRateLimiter>,
}

impl OpenAIProvider {
    /// Create a new provider
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchError::ProviderUnavailable(format!("HTTP client error: {}", e)))?;

        #[cfg(feature = "rate-limit")]
        let rate_limiter = {
            let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
            Arc::new(RateLimiter::direct(Quota::per_second(rps)))
        };

        Ok(Self {
            client,
            config,
            dimension: AtomicUsize::new(0),
            #[cfg(feature = "rate-limit")]
            rate_limiter,
        })
    }

    /// Create a provider from configuration.
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        Self::new(OpenAIConfig::from_settings(settings))
    }

    #[cfg(feature = "rate-limit")]
    async fn wait_for_permit(&self) {
        self.rate_limiter.until_ready().await;
    }

    #[cfg(not(feature = "rate-limit"))]
    async fn wait_for_permit(&self) {}

    fn embeddings_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{}/embeddings", base)
        } else {
            format!("{}/v1/embeddings", base)
        }
    }

    fn request(&self, body: &EmbeddingsRequest) -> reqwest::RequestBuilder {
        let request = self.client.post(self.embeddings_url()).json(body);
        match self.config.api_key {
            Some(ref api_key) => request.bearer_auth(api_key),
            None => request,
        }
    }

    async fn send_request(&self, body: EmbeddingsRequest) -> Result<Vec<Vec<f32>>> {
        self.wait_for_permit().await;

        let expected = body.input.len();
        let response = self.request(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::ProviderUnavailable("Embedding request timed out".into())
            } else if e.is_connect() {
                SearchError::ProviderUnavailable(format!("Connection failed: {}", e))
            } else {
                SearchError::ProviderUnavailable(format!("Request failed: {}", e))
            }
        })?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let mut parsed: EmbeddingsResponse = response.json().await.map_err(|e| {
                    SearchError::Embedding(format!("Invalid embeddings response: {}", e))
                })?;

                parsed.data.sort_by_key(|d| d.index);
                let embeddings: Vec<Vec<f32>> =
                    parsed.data.into_iter().map(|d| d.embedding).collect();

                if embeddings.len() != expected {
                    return Err(SearchError::Embedding(format!(
                        "Expected {} embeddings, got {}",
                        expected,
                        embeddings.len()
                    )));
                }

                if let Some(first) = embeddings.first() {
                    let dim = first.len();
                    let cached = self.dimension.load(Ordering::Relaxed);
                    if cached == 0 {
                        self.dimension.store(dim, Ordering::Relaxed);
                    } else if cached != dim {
                        return Err(SearchError::DimensionMismatch {
                            expected: cached,
                            actual: dim,
                        });
                    }
                }

                Ok(embeddings)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                Err(SearchError::ProviderAuth(body))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok());

                Err(SearchError::RateLimited { retry_after })
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(SearchError::ProviderUnavailable(format!(
                    "Embedding request failed with status {}: {}",
                    status, body
                )))
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed(&self, tenant: TenantId, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!("Embedding {} texts for tenant {}", texts.len(), tenant);
        self.send_request(EmbeddingsRequest {
            model: self.config.model.clone(),
            input: texts,
            user: Some(format!("tenant-{}", tenant)),
        })
        .await
    }

    async fn check_status(&self) -> Result<ProviderStatus> {
        let start = Instant::now();
        let body = EmbeddingsRequest {
            model: self.config.model.clone(),
            input: vec!["health check".into()],
            user: None,
        };

        let outcome = self.request(&body).send().await;
        let latency = start.elapsed().as_millis() as u64;
        let endpoint = self.embeddings_url();

        Ok(match outcome {
            Ok(response) => match response.status() {
                // Rate limited still means reachable
                StatusCode::OK | StatusCode::TOO_MANY_REQUESTS => {
                    ProviderStatus::healthy(endpoint).with_latency(latency)
                }
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ProviderStatus::unavailable(endpoint, "Invalid API key")
                }
                StatusCode::NOT_FOUND => ProviderStatus::unavailable(
                    endpoint,
                    format!("Model '{}' not found", self.config.model),
                ),
                other => ProviderStatus::unavailable(
                    endpoint,
                    format!("Health check failed with status {}", other),
                ),
            },
            Err(e) => ProviderStatus::unavailable(endpoint, e.to_string()),
        })
    }

    fn embedding_dim(&self) -> usize {
        let dim = self.dimension.load(Ordering::Relaxed);
        if dim > 0 {
            return dim;
        }
        match self.config.model.as_str() {
            "text-embedding-3-large" => 3072,
            "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
            _ => 768,
        }
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

impl std::fmt::Debug for OpenAIProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIProvider")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("timeout_secs", &self.config.timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mock_response(dim: usize, count: usize) -> serde_json::Value {
        let data: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "object": "embedding",
                    "embedding": vec![0.1_f32 * (i as f32 + 1.0); dim],
                    "index": i
                })
            })
            .collect();

        serde_json::json!({
            "object": "list",
            "data": data,
            "model": "test-model",
            "usage": {"prompt_tokens": 10, "total_tokens": 10}
        })
    }

    fn test_config(server: &MockServer) -> OpenAIConfig {
        OpenAIConfig {
            base_url: server.uri(),
            api_key: Some("test-key".into()),
            model: "test-model".into(),
            timeout_secs: 5,
            #[cfg(feature = "rate-limit")]
            requests_per_second: 100,
        }
    }

    #[tokio::test]
    async fn test_embed_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "input": ["transformer attention"],
                "user": "tenant-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(768, 1)))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let embeddings = provider
            .embed(TenantId(1), vec!["transformer attention".into()])
            .await
            .unwrap();

        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].len(), 768);
        assert_eq!(provider.embedding_dim(), 768);
    }

    #[tokio::test]
    async fn test_embed_restores_input_order() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"embedding": [2.0, 2.0], "index": 1},
                    {"embedding": [1.0, 1.0], "index": 0}
                ]
            })))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let embeddings = provider
            .embed(TenantId(1), vec!["a".into(), "b".into()])
            .await
            .unwrap();

        assert_eq!(embeddings[0], vec![1.0, 1.0]);
        assert_eq!(embeddings[1], vec![2.0, 2.0]);
    }

    #[tokio::test]
    async fn test_empty_input_skips_request() {
        let server = MockServer::start().await;
        let provider = OpenAIProvider::new(test_config(&server)).unwrap();

        let result = provider.embed(TenantId(1), vec![]).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let result = provider.embed(TenantId(1), vec!["test".into()]).await;

        assert!(matches!(result, Err(SearchError::ProviderAuth(_))));
    }

    #[tokio::test]
    async fn test_rate_limit_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "60")
                    .set_body_string("Rate limited"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let result = provider.embed(TenantId(1), vec!["test".into()]).await;

        match result {
            Err(SearchError::RateLimited { retry_after }) => {
                assert_eq!(retry_after, Some(60));
            }
            other => panic!("Expected RateLimited error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let result = provider.embed(TenantId(1), vec!["test".into()]).await;

        assert!(matches!(result, Err(SearchError::ProviderUnavailable(_))));
    }

    #[tokio::test]
    async fn test_count_mismatch_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(8, 1)))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let result = provider
            .embed(TenantId(1), vec!["a".into(), "b".into()])
            .await;

        assert!(matches!(result, Err(SearchError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let server = MockServer::start().await;
        let provider = OpenAIProvider::new(test_config(&server)).unwrap();

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(768, 1)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        provider
            .embed(TenantId(1), vec!["first".into()])
            .await
            .unwrap();

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(384, 1)))
            .mount(&server)
            .await;
        let result = provider.embed(TenantId(1), vec!["second".into()]).await;

        assert!(matches!(
            result,
            Err(SearchError::DimensionMismatch {
                expected: 768,
                actual: 384
            })
        ));
    }

    #[tokio::test]
    async fn test_check_status_healthy() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response(768, 1)))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let status = provider.check_status().await.unwrap();

        assert!(status.available);
        assert!(status.latency_ms.is_some());
    }

    #[tokio::test]
    async fn test_check_status_unauthorized() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(test_config(&server)).unwrap();
        let status = provider.check_status().await.unwrap();

        assert!(!status.available);
        assert_eq!(status.error.as_deref(), Some("Invalid API key"));
    }

    #[test]
    fn test_config_from_settings() {
        let settings = EmbeddingSettings {
            url: "http://localhost:11434/v1".into(),
            api_key_env: None,
            model: "nomic-embed-text".into(),
            timeout_secs: 12,
        };
        let config = OpenAIConfig::from_settings(&settings);

        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert!(config.api_key.is_none());
        assert_eq!(config.model, "nomic-embed-text");
        assert_eq!(config.timeout_secs, 12);
    }

    #[test]
    fn test_embeddings_url_handles_v1_suffix() {
        let mut config = OpenAIConfig::from_settings(&EmbeddingSettings::default());
        config.base_url = "http://host/v1/".into();
        let provider = OpenAIProvider::new(config.clone()).unwrap();
        assert_eq!(provider.embeddings_url(), "http://host/v1/embeddings");

        config.base_url = "http://host".into();
        let provider = OpenAIProvider::new(config).unwrap();
        assert_eq!(provider.embeddings_url(), "http://host/v1/embeddings");
    }
}
