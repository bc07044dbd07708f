//! litscout Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.litscout/config.toml`
//! - Local config: `.litscout/config.toml` (in the working directory)
//! - An explicit config file passed on the command line
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → explicit → CLI overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration for litscout.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct LitscoutConfig {
    /// Article database
    pub database: DatabaseConfig,

    /// Default vector store connection (tenants may override)
    pub vector_store: VectorStoreSettings,

    /// Embedding endpoint
    pub embedding: EmbeddingSettings,

    /// Optional rerank endpoint
    pub rerank: RerankSettings,

    /// Search tuning
    pub search: SearchSettings,

    /// Per-tenant overrides keyed by user id
    pub tenants: HashMap<String, TenantConfig>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// SQLite database location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database holding articles and the related cache
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("litscout.db"),
        }
    }
}

/// Qdrant connection settings.
///
/// A tenant's cached client is recreated whenever any of these fields change.
///
/// # Example TOML
///
/// ```toml
/// [vector_store]
/// host = "localhost"
/// port = 6334
/// collection = "articles"
/// api_key_env = "QDRANT_API_KEY"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Qdrant host name
    pub host: String,

    /// Qdrant gRPC port
    pub port: u16,

    /// Use https when connecting
    pub tls: bool,

    /// Collection holding article vectors
    pub collection: String,

    /// Environment variable name containing the API key
    pub api_key_env: Option<String>,

    /// Query timeout in seconds
    pub timeout_secs: u64,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6334,
            tls: false,
            collection: "articles".to_string(),
            api_key_env: None,
            timeout_secs: 10,
        }
    }
}

impl VectorStoreSettings {
    /// Full URL of the Qdrant endpoint.
    pub fn url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty())
    }

    fn validate(&self, prefix: &str) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::invalid_value(
                format!("{}.host", prefix),
                "must not be empty",
            ));
        }
        if self.port == 0 {
            return Err(ConfigError::invalid_value(
                format!("{}.port", prefix),
                "must be non-zero",
            ));
        }
        if self.collection.is_empty() {
            return Err(ConfigError::invalid_value(
                format!("{}.collection", prefix),
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// OpenAI-compatible embedding endpoint settings.
///
/// # Example TOML
///
/// ```toml
/// [embedding]
/// url = "https://api.openai.com/v1"
/// api_key_env = "OPENAI_API_KEY"
/// model = "text-embedding-3-small"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// API base URL
    pub url: String,

    /// Environment variable name containing the API key
    pub api_key_env: Option<String>,

    /// Embedding model name
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            url: "https://api.openai.com/v1".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            model: "text-embedding-3-small".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Rerank endpoint settings (Jina/Cohere-compatible `/v1/rerank`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RerankSettings {
    /// Enable reranking for tenants without an explicit override
    pub enabled: bool,

    /// API base URL
    pub url: String,

    /// Environment variable name containing the API key
    pub api_key_env: Option<String>,

    /// Rerank model name
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "https://api.jina.ai/v1".to_string(),
            api_key_env: Some("RERANK_API_KEY".to_string()),
            model: "jina-reranker-v2-base-multilingual".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Search tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchSettings {
    /// Candidate over-fetch multiplier applied before post-filtering
    pub overfetch_factor: usize,

    /// Default semantic weight for hybrid fusion
    pub semantic_weight: f32,

    /// Default keyword weight for hybrid fusion
    pub keyword_weight: f32,

    /// Default page size
    pub default_limit: usize,

    /// Related-article sizing
    pub related: RelatedSettings,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            overfetch_factor: 3,
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            default_limit: 10,
            related: RelatedSettings::default(),
        }
    }
}

/// Related-article result sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelatedSettings {
    /// Scores strictly above this count as high confidence
    pub high_score_threshold: f32,

    /// Number of high-confidence candidates needed for the wide tier
    pub min_high_confidence: usize,

    /// Result cap when enough high-confidence candidates exist
    pub high_confidence_cap: usize,

    /// Result cap otherwise
    pub low_confidence_cap: usize,

    /// Character budget for article content in the synthetic query
    pub max_content_chars: usize,
}

impl Default for RelatedSettings {
    fn default() -> Self {
        Self {
            high_score_threshold: 0.5,
            min_high_confidence: 3,
            high_confidence_cap: 5,
            low_confidence_cap: 3,
            max_content_chars: 2000,
        }
    }
}

/// Per-tenant overrides.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct TenantConfig {
    /// Dedicated vector store for this tenant
    pub vector_store: Option<VectorStoreSettings>,

    /// Enable or disable reranking for this tenant
    pub rerank_enabled: Option<bool>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

/// CLI overrides for configuration values.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override database path
    pub database_path: Option<PathBuf>,

    /// Override default Qdrant host
    pub qdrant_host: Option<String>,

    /// Override default Qdrant port
    pub qdrant_port: Option<u16>,

    /// Override rerank enablement
    pub rerank_enabled: Option<bool>,

    /// Override log level
    pub log_level: Option<String>,
}

impl LitscoutConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref path) = overrides.database_path {
            self.database.path = path.clone();
        }

        if let Some(ref host) = overrides.qdrant_host {
            self.vector_store.host = host.clone();
        }

        if let Some(port) = overrides.qdrant_port {
            self.vector_store.port = port;
        }

        if let Some(enabled) = overrides.rerank_enabled {
            self.rerank.enabled = enabled;
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Vector store settings for a tenant, falling back to the default store.
    pub fn vector_store_for(&self, tenant: i64) -> &VectorStoreSettings {
        self.tenants
            .get(&tenant.to_string())
            .and_then(|t| t.vector_store.as_ref())
            .unwrap_or(&self.vector_store)
    }

    /// Whether reranking is enabled for a tenant.
    pub fn rerank_enabled_for(&self, tenant: i64) -> bool {
        self.tenants
            .get(&tenant.to_string())
            .and_then(|t| t.rerank_enabled)
            .unwrap_or(self.rerank.enabled)
    }

    /// Parsed tenant overrides.
    pub fn tenant_overrides(&self) -> Result<Vec<(i64, &TenantConfig)>, ConfigError> {
        self.tenants
            .iter()
            .map(|(key, tenant)| {
                key.parse::<i64>()
                    .map(|id| (id, tenant))
                    .map_err(|_| ConfigError::InvalidTenantKey { key: key.clone() })
            })
            .collect()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.vector_store.validate("vector_store")?;

        for (id, tenant) in self.tenant_overrides()? {
            if let Some(ref store) = tenant.vector_store {
                store.validate(&format!("tenants.{}.vector_store", id))?;
            }
        }

        if self.embedding.url.is_empty() {
            return Err(ConfigError::invalid_value(
                "embedding.url",
                "must not be empty",
            ));
        }
        if self.embedding.model.is_empty() {
            return Err(ConfigError::invalid_value(
                "embedding.model",
                "must not be empty",
            ));
        }
        if self.rerank.enabled && self.rerank.url.is_empty() {
            return Err(ConfigError::invalid_value(
                "rerank.url",
                "is required when rerank is enabled",
            ));
        }

        let search = &self.search;
        for (key, weight) in [
            ("search.semantic_weight", search.semantic_weight),
            ("search.keyword_weight", search.keyword_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ConfigError::invalid_value(key, "must be within [0, 1]"));
            }
        }
        if search.overfetch_factor == 0 {
            return Err(ConfigError::invalid_value(
                "search.overfetch_factor",
                "must be at least 1",
            ));
        }
        if search.related.low_confidence_cap > search.related.high_confidence_cap {
            return Err(ConfigError::invalid_value(
                "search.related.low_confidence_cap",
                "must not exceed high_confidence_cap",
            ));
        }

        Ok(())
    }
}
