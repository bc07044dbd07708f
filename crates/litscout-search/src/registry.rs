//! Per-tenant vector store registry.
//!
//! Lazily creates one store handle per tenant and caches it. A cached handle
//! is replaced only when that tenant's connection settings change.

use std::collections::HashMap;
use std::sync::Arc;

use litscout_config::{LitscoutConfig, VectorStoreSettings};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::client::{QdrantStore, VectorStore};
use crate::error::Result;
use crate::schema::TenantId;

/// Creates store handles from connection settings
pub trait VectorStoreConnector: Send + Sync {
    fn connect(&self, settings: &VectorStoreSettings) -> Result<Arc<dyn VectorStore>>;
}

/// Connector producing [`QdrantStore`] handles
#[derive(Debug, Clone, Copy, Default)]
pub struct QdrantConnector;

impl VectorStoreConnector for QdrantConnector {
    fn connect(&self, settings: &VectorStoreSettings) -> Result<Arc<dyn VectorStore>> {
        Ok(Arc::new(QdrantStore::new(settings)?))
    }
}

struct CachedStore {
    settings: VectorStoreSettings,
    store: Arc<dyn VectorStore>,
}

/// Registry of vector store handles keyed by tenant.
pub struct VectorStoreRegistry {
    connector: Arc<dyn VectorStoreConnector>,

    /// Settings for tenants without an override
    default_settings: RwLock<VectorStoreSettings>,

    /// Tenant-specific connection settings
    overrides: RwLock<HashMap<TenantId, VectorStoreSettings>>,

    /// Cached handles with the settings they were built from
    stores: RwLock<HashMap<TenantId, CachedStore>>,
}

impl VectorStoreRegistry {
    /// Create a registry with default settings and a connector.
    pub fn new(
        default_settings: VectorStoreSettings,
        connector: Arc<dyn VectorStoreConnector>,
    ) -> Self {
        Self {
            connector,
            default_settings: RwLock::new(default_settings),
            overrides: RwLock::new(HashMap::new()),
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// Create a Qdrant-backed registry from configuration, including tenant
    /// overrides.
    pub fn from_config(config: &LitscoutConfig) -> Result<Self> {
        Self::with_connector(config, Arc::new(QdrantConnector))
    }

    /// Create a registry from configuration with a custom connector.
    pub fn with_connector(
        config: &LitscoutConfig,
        connector: Arc<dyn VectorStoreConnector>,
    ) -> Result<Self> {
        let overrides = config
            .tenant_overrides()?
            .into_iter()
            .filter(|(_, tenant)| tenant.vector_store.is_some())
            .map(|(id, _)| (TenantId(id), config.vector_store_for(id).clone()))
            .collect();

        Ok(Self {
            connector,
            default_settings: RwLock::new(config.vector_store.clone()),
            overrides: RwLock::new(overrides),
            stores: RwLock::new(HashMap::new()),
        })
    }

    /// Effective settings for a tenant.
    pub async fn settings_for(&self, tenant: TenantId) -> VectorStoreSettings {
        if let Some(settings) = self.overrides.read().await.get(&tenant) {
            return settings.clone();
        }
        self.default_settings.read().await.clone()
    }

    /// Store handle for a tenant, created on first use.
    ///
    /// If the tenant's settings changed since the handle was cached, the old
    /// handle is dropped and a new one is created.
    pub async fn store_for(&self, tenant: TenantId) -> Result<Arc<dyn VectorStore>> {
        let settings = self.settings_for(tenant).await;

        {
            let stores = self.stores.read().await;
            if let Some(cached) = stores.get(&tenant) {
                if cached.settings == settings {
                    return Ok(Arc::clone(&cached.store));
                }
            }
        }

        let mut stores = self.stores.write().await;
        // Another task may have reconnected while we waited for the lock
        if let Some(cached) = stores.get(&tenant) {
            if cached.settings == settings {
                return Ok(Arc::clone(&cached.store));
            }
            info!(
                "Vector store settings changed for tenant {}, reconnecting",
                tenant
            );
        }

        let store = self.connector.connect(&settings)?;
        stores.insert(
            tenant,
            CachedStore {
                settings,
                store: Arc::clone(&store),
            },
        );
        debug!("Created vector store handle for tenant {}", tenant);

        Ok(store)
    }

    /// Set or clear a tenant's dedicated connection settings.
    pub async fn set_tenant_settings(
        &self,
        tenant: TenantId,
        settings: Option<VectorStoreSettings>,
    ) {
        let mut overrides = self.overrides.write().await;
        match settings {
            Some(settings) => {
                overrides.insert(tenant, settings);
            }
            None => {
                overrides.remove(&tenant);
            }
        }
    }

    /// Replace the default connection settings.
    pub async fn set_default_settings(&self, settings: VectorStoreSettings) {
        *self.default_settings.write().await = settings;
    }

    /// Number of cached handles
    pub async fn cached_count(&self) -> usize {
        self.stores.read().await.len()
    }

    /// Drop every cached handle.
    pub async fn shutdown(&self) {
        let mut stores = self.stores.write().await;
        let count = stores.len();
        stores.clear();
        info!("Vector store registry shut down ({} handles dropped)", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{VectorFilter, VectorHit};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullStore;

    #[async_trait]
    impl VectorStore for NullStore {
        async fn query(
            &self,
            _vector: Vec<f32>,
            _k: usize,
            _filter: VectorFilter,
        ) -> Result<Vec<VectorHit>> {
            Ok(Vec::new())
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingConnector {
        connects: AtomicUsize,
    }

    impl VectorStoreConnector for CountingConnector {
        fn connect(&self, _settings: &VectorStoreSettings) -> Result<Arc<dyn VectorStore>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullStore))
        }
    }

    fn registry() -> (VectorStoreRegistry, Arc<CountingConnector>) {
        let connector = Arc::new(CountingConnector::default());
        let registry = VectorStoreRegistry::new(
            VectorStoreSettings::default(),
            Arc::clone(&connector) as Arc<dyn VectorStoreConnector>,
        );
        (registry, connector)
    }

    #[tokio::test]
    async fn test_handle_is_cached_per_tenant() {
        let (registry, connector) = registry();

        registry.store_for(TenantId(1)).await.unwrap();
        registry.store_for(TenantId(1)).await.unwrap();
        registry.store_for(TenantId(2)).await.unwrap();

        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert_eq!(registry.cached_count().await, 2);
    }

    #[tokio::test]
    async fn test_settings_change_reconnects() {
        let (registry, connector) = registry();
        registry.store_for(TenantId(1)).await.unwrap();

        registry
            .set_tenant_settings(
                TenantId(1),
                Some(VectorStoreSettings {
                    collection: "tenant_1".to_string(),
                    ..Default::default()
                }),
            )
            .await;
        registry.store_for(TenantId(1)).await.unwrap();
        registry.store_for(TenantId(1)).await.unwrap();

        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_default_change_only_affects_tenants_without_override() {
        let (registry, connector) = registry();
        registry
            .set_tenant_settings(
                TenantId(2),
                Some(VectorStoreSettings {
                    host: "dedicated".to_string(),
                    ..Default::default()
                }),
            )
            .await;
        registry.store_for(TenantId(1)).await.unwrap();
        registry.store_for(TenantId(2)).await.unwrap();

        registry
            .set_default_settings(VectorStoreSettings {
                port: 7000,
                ..Default::default()
            })
            .await;
        registry.store_for(TenantId(1)).await.unwrap();
        registry.store_for(TenantId(2)).await.unwrap();

        assert_eq!(connector.connects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_shutdown_drops_handles() {
        let (registry, connector) = registry();
        registry.store_for(TenantId(1)).await.unwrap();

        registry.shutdown().await;
        assert_eq!(registry.cached_count().await, 0);

        registry.store_for(TenantId(1)).await.unwrap();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_from_config_reads_tenant_overrides() {
        let mut config = LitscoutConfig::default();
        config.tenants.insert(
            "9".to_string(),
            litscout_config::TenantConfig {
                vector_store: Some(VectorStoreSettings {
                    collection: "user_9".to_string(),
                    ..Default::default()
                }),
                rerank_enabled: None,
            },
        );

        let registry =
            VectorStoreRegistry::with_connector(&config, Arc::new(CountingConnector::default()))
                .unwrap();
        let settings = registry.settings_for(TenantId(9)).await;
        assert_eq!(settings.collection, "user_9");
        assert_eq!(
            registry.settings_for(TenantId(1)).await.collection,
            "articles"
        );
    }
}
