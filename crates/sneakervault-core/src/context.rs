// Wires config, storage, providers and coordinators together
use crate::{
    config::Config,
    detail::DetailCoordinator,
    providers::{IdentityProvider, RowStoreProvider, SneakerProvider, SneaksProvider, VaultStore},
    search::SearchCoordinator,
    vault::VaultService,
    Result,
};
use sneakervault_cache::{EphemeralCache, SqliteStorage, Storage};
use std::sync::Arc;
use tracing::{debug, info};

/// Everything a frontend needs, built from one [`Config`].
///
/// Both caches share one storage backend and one namespace. They only
/// differ in TTL, so clearing either one wipes the lot.
pub struct AppContext {
    pub content_cache: Arc<EphemeralCache>,
    pub status_cache: Arc<EphemeralCache>,
    pub vault: Arc<VaultService>,
    pub search: SearchCoordinator,
    pub detail: DetailCoordinator,
}

impl AppContext {
    /// Open the on-disk cache and connect to the configured services
    pub fn from_config(config: &Config) -> Result<Self> {
        let db_path = config.cache_db_path()?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!("Opening cache at {}", db_path.display());
        let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(&db_path)?);

        let catalog: Arc<dyn SneakerProvider> = Arc::new(SneaksProvider::new(
            &config.provider.base_url,
            config.provider.timeout(),
        )?);

        let rowstore = Arc::new(RowStoreProvider::new(
            &config.rowstore.url,
            &config.rowstore.anon_key,
            config.rowstore.access_token.clone(),
        )?);

        info!("Using sneaker API at {}", config.provider.base_url);
        Ok(Self::assemble(config, storage, catalog, rowstore.clone(), rowstore))
    }

    /// Build from explicit parts. Handy for tests and alternate backends.
    pub fn assemble(
        config: &Config,
        storage: Arc<dyn Storage>,
        catalog: Arc<dyn SneakerProvider>,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn VaultStore>,
    ) -> Self {
        let content_cache = Arc::new(EphemeralCache::new(
            storage.clone(),
            config.cache.namespace.clone(),
            config.cache.content_ttl(),
        ));
        let status_cache = Arc::new(EphemeralCache::new(
            storage,
            config.cache.namespace.clone(),
            config.cache.status_ttl(),
        ));

        let vault = Arc::new(VaultService::new(identity, store, status_cache.clone()));
        let search = SearchCoordinator::new(catalog.clone(), content_cache.clone(), &config.search);
        let detail = DetailCoordinator::new(catalog, vault.clone(), content_cache.clone());

        Self {
            content_cache,
            status_cache,
            vault,
            search,
            detail,
        }
    }
}
