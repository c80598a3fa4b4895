// Vault and collection management on top of the row store
use crate::{
    models::{status_cache_key, Collection, CollectionItem, Identity, Sneaker, VaultItem},
    providers::{IdentityProvider, VaultStore},
    Error, Result,
};
use sneakervault_api::{NewCollection, NewCollectionItem, NewVaultItem};
use sneakervault_cache::EphemeralCache;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Identity-gated access to the user's vault and collections.
///
/// Every mutation needs a signed-in user, and every duplicate row comes
/// back as `Error::AlreadyExists` no matter which table it hit. The service
/// also owns the short-lived "is this saved" cache, so adding or removing
/// an item writes the new answer straight through.
pub struct VaultService {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn VaultStore>,
    status_cache: Arc<EphemeralCache>,
}

impl VaultService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn VaultStore>,
        status_cache: Arc<EphemeralCache>,
    ) -> Self {
        Self {
            identity,
            store,
            status_cache,
        }
    }

    pub async fn current_identity(&self) -> Result<Option<Identity>> {
        self.identity.current_identity().await
    }

    async fn require_identity(&self) -> Result<Identity> {
        self.current_identity()
            .await?
            .ok_or(Error::NotAuthenticated)
    }

    pub fn cached_status(&self, user_id: &Uuid, style_id: &str) -> Option<bool> {
        self.status_cache.get(&status_cache_key(user_id, style_id))
    }

    pub fn remember_status(&self, user_id: &Uuid, style_id: &str, saved: bool) {
        self.status_cache
            .set(&status_cache_key(user_id, style_id), &saved);
    }

    /// Ask the row store directly. Callers handle caching.
    pub async fn fetch_status(&self, user_id: Uuid, style_id: &str) -> Result<bool> {
        self.store.is_saved(user_id, style_id).await
    }

    pub async fn list_vault(&self) -> Result<Vec<VaultItem>> {
        let user = self.require_identity().await?;
        self.store.list_vault(user.id).await
    }

    /// Save a sneaker. Already-saved still updates the cached status.
    pub async fn add_to_vault(&self, sneaker: &Sneaker) -> Result<VaultItem> {
        let user = self.require_identity().await?;
        let item = NewVaultItem {
            user_id: user.id,
            sneaker_id: sneaker.style_id.clone(),
            name: sneaker.name.clone(),
            brand: sneaker.brand.clone(),
            thumbnail: sneaker.thumbnail.clone(),
        };

        match self.store.add_to_vault(item).await {
            Ok(saved) => {
                info!("Added {} to vault", sneaker.style_id);
                self.remember_status(&user.id, &sneaker.style_id, true);
                Ok(saved)
            }
            Err(Error::AlreadyExists(_)) => {
                debug!("{} was already in the vault", sneaker.style_id);
                self.remember_status(&user.id, &sneaker.style_id, true);
                Err(Error::AlreadyExists(format!(
                    "{} is already in your vault",
                    sneaker.style_id
                )))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn remove_from_vault(&self, style_id: &str) -> Result<()> {
        let user = self.require_identity().await?;
        self.store.remove_from_vault(user.id, style_id).await?;
        info!("Removed {} from vault", style_id);
        self.remember_status(&user.id, style_id, false);
        Ok(())
    }

    pub async fn list_collections(&self) -> Result<Vec<Collection>> {
        let user = self.require_identity().await?;
        self.store.list_collections(user.id).await
    }

    pub async fn create_collection(&self, name: &str, description: Option<&str>) -> Result<Collection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("collection name can't be empty".into()));
        }

        let user = self.require_identity().await?;
        let collection = NewCollection {
            user_id: user.id,
            name: name.to_string(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        };

        self.store
            .create_collection(collection)
            .await
            .map_err(|e| match e {
                Error::AlreadyExists(_) => {
                    Error::AlreadyExists(format!("a collection named '{}' already exists", name))
                }
                other => other,
            })
    }

    pub async fn delete_collection(&self, collection_id: Uuid) -> Result<()> {
        let user = self.require_identity().await?;
        self.store.delete_collection(user.id, collection_id).await?;
        info!("Deleted collection {}", collection_id);
        Ok(())
    }

    pub async fn collection_items(&self, collection_id: Uuid) -> Result<Vec<CollectionItem>> {
        self.require_identity().await?;
        self.store.list_collection_items(collection_id).await
    }

    pub async fn add_to_collection(&self, collection_id: Uuid, sneaker: &Sneaker) -> Result<CollectionItem> {
        self.require_identity().await?;
        let item = NewCollectionItem {
            collection_id,
            sneaker_id: sneaker.style_id.clone(),
            name: sneaker.name.clone(),
            brand: sneaker.brand.clone(),
            thumbnail: sneaker.thumbnail.clone(),
        };

        self.store
            .add_to_collection(item)
            .await
            .map_err(|e| match e {
                Error::AlreadyExists(_) => Error::AlreadyExists(format!(
                    "{} is already in that collection",
                    sneaker.style_id
                )),
                other => other,
            })
    }

    pub async fn remove_from_collection(&self, collection_id: Uuid, style_id: &str) -> Result<()> {
        self.require_identity().await?;
        self.store.remove_from_collection(collection_id, style_id).await
    }
}
