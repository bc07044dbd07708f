//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.litscout/config.toml`
//! 2. Local config: `.litscout/config.toml` (in the working directory)
//! 3. An explicit file (`--config`)
//! 4. CLI overrides
//!
//! Later sources override earlier ones. A field in a later file replaces the
//! earlier value only when it differs from the built-in default.

use crate::error::ConfigError;
use crate::{
    ConfigOverrides, DatabaseConfig, EmbeddingSettings, LitscoutConfig, LoggingConfig,
    RelatedSettings, RerankSettings, SearchSettings, VectorStoreSettings,
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global and local configuration directory name.
const CONFIG_DIR: &str = ".litscout";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.litscout`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<LitscoutConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader rooted at `~/.litscout`.
    pub fn new() -> Self {
        Self {
            global_config_dir: dirs::home_dir().map(|h| h.join(CONFIG_DIR)),
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path under a working directory.
    pub fn local_config_path(&self, root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration with optional explicit file and CLI overrides.
    ///
    /// Merges config in order: global → local → explicit → overrides, then
    /// validates the result.
    pub fn load(
        &mut self,
        root: &Path,
        explicit: Option<&Path>,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<LitscoutConfig, ConfigError> {
        let mut config = LitscoutConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(root)? {
            config = merge_configs(config, local_config);
        }

        if let Some(path) = explicit {
            debug!("Loading explicit config from {:?}", path);
            config = merge_configs(config, load_config_file(path)?);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<LitscoutConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let config = load_config_file(&global_path)?;
        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Load only the local configuration.
    pub fn load_local(&self, root: &Path) -> Result<Option<LitscoutConfig>, ConfigError> {
        let local_path = self.local_config_path(root);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }

    /// Create `~/.litscout/config.toml` with default values if missing.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };

        let config_path = global_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            save_config_file(&config_path, &LitscoutConfig::default())?;
        }

        Ok(config_path)
    }
}

fn load_config_file(path: &Path) -> Result<LitscoutConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

fn save_config_file(path: &Path, config: &LitscoutConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// Pick `overlay` when it was set to something other than the default.
fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

/// Merge two configurations, with `overlay` taking precedence.
fn merge_configs(base: LitscoutConfig, overlay: LitscoutConfig) -> LitscoutConfig {
    let mut tenants = base.tenants;
    tenants.extend(overlay.tenants);

    LitscoutConfig {
        database: merge_database(base.database, overlay.database),
        vector_store: merge_vector_store(base.vector_store, overlay.vector_store),
        embedding: merge_embedding(base.embedding, overlay.embedding),
        rerank: merge_rerank(base.rerank, overlay.rerank),
        search: merge_search(base.search, overlay.search),
        tenants,
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn merge_database(base: DatabaseConfig, overlay: DatabaseConfig) -> DatabaseConfig {
    DatabaseConfig {
        path: pick(base.path, overlay.path, DatabaseConfig::default().path),
    }
}

fn merge_vector_store(
    base: VectorStoreSettings,
    overlay: VectorStoreSettings,
) -> VectorStoreSettings {
    let d = VectorStoreSettings::default();
    VectorStoreSettings {
        host: pick(base.host, overlay.host, d.host),
        port: pick(base.port, overlay.port, d.port),
        tls: pick(base.tls, overlay.tls, d.tls),
        collection: pick(base.collection, overlay.collection, d.collection),
        api_key_env: overlay.api_key_env.or(base.api_key_env),
        timeout_secs: pick(base.timeout_secs, overlay.timeout_secs, d.timeout_secs),
    }
}

fn merge_embedding(base: EmbeddingSettings, overlay: EmbeddingSettings) -> EmbeddingSettings {
    let d = EmbeddingSettings::default();
    EmbeddingSettings {
        url: pick(base.url, overlay.url, d.url),
        api_key_env: pick(base.api_key_env, overlay.api_key_env, d.api_key_env),
        model: pick(base.model, overlay.model, d.model),
        timeout_secs: pick(base.timeout_secs, overlay.timeout_secs, d.timeout_secs),
    }
}

fn merge_rerank(base: RerankSettings, overlay: RerankSettings) -> RerankSettings {
    let d = RerankSettings::default();
    RerankSettings {
        enabled: pick(base.enabled, overlay.enabled, d.enabled),
        url: pick(base.url, overlay.url, d.url),
        api_key_env: pick(base.api_key_env, overlay.api_key_env, d.api_key_env),
        model: pick(base.model, overlay.model, d.model),
        timeout_secs: pick(base.timeout_secs, overlay.timeout_secs, d.timeout_secs),
    }
}

fn merge_search(base: SearchSettings, overlay: SearchSettings) -> SearchSettings {
    let d = SearchSettings::default();
    let r = RelatedSettings::default();
    SearchSettings {
        overfetch_factor: pick(
            base.overfetch_factor,
            overlay.overfetch_factor,
            d.overfetch_factor,
        ),
        semantic_weight: pick(
            base.semantic_weight,
            overlay.semantic_weight,
            d.semantic_weight,
        ),
        keyword_weight: pick(base.keyword_weight, overlay.keyword_weight, d.keyword_weight),
        default_limit: pick(base.default_limit, overlay.default_limit, d.default_limit),
        related: RelatedSettings {
            high_score_threshold: pick(
                base.related.high_score_threshold,
                overlay.related.high_score_threshold,
                r.high_score_threshold,
            ),
            min_high_confidence: pick(
                base.related.min_high_confidence,
                overlay.related.min_high_confidence,
                r.min_high_confidence,
            ),
            high_confidence_cap: pick(
                base.related.high_confidence_cap,
                overlay.related.high_confidence_cap,
                r.high_confidence_cap,
            ),
            low_confidence_cap: pick(
                base.related.low_confidence_cap,
                overlay.related.low_confidence_cap,
                r.low_confidence_cap,
            ),
            max_content_chars: pick(
                base.related.max_content_chars,
                overlay.related.max_content_chars,
                r.max_content_chars,
            ),
        },
    }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    let d = LoggingConfig::default();
    LoggingConfig {
        level: pick(base.level, overlay.level, d.level),
        format: pick(base.format, overlay.format, d.format),
    }
}
