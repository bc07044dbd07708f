//! Embedding provider trait and status types

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::TenantId;

/// Status of an embedding provider
///
/// Contains health information for diagnostics.
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    /// Whether the provider is available and responding
    pub available: bool,
    /// Endpoint or backend description
    pub endpoint: String,
    /// Last health check latency in milliseconds
    pub latency_ms: Option<u64>,
    /// Error message if provider is unavailable
    pub error: Option<String>,
}

impl ProviderStatus {
    /// Create a status for a healthy provider
    pub fn healthy(endpoint: impl Into<String>) -> Self {
        Self {
            available: true,
            endpoint: endpoint.into(),
            latency_ms: None,
            error: None,
        }
    }

    /// Create a status for an unavailable provider
    pub fn unavailable(endpoint: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            available: false,
            endpoint: endpoint.into(),
            latency_ms: None,
            error: Some(error.into()),
        }
    }

    /// Set latency from a health check
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// Text → vector, scoped to a tenant.
///
/// Implementations must be `Send + Sync`; the engine shares one provider
/// across all tenants and concurrent requests.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `texts` on behalf of `tenant`, one vector per input in order.
    async fn embed(&self, tenant: TenantId, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Check provider health.
    async fn check_status(&self) -> Result<ProviderStatus>;

    /// Vector dimension (detected or estimated)
    fn embedding_dim(&self) -> usize;

    /// Short provider name for logs
    fn provider_name(&self) -> &'static str;
}
