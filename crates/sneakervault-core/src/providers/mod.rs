// The seams between coordinators and the outside world.
// Real implementations wrap the HTTP clients; tests swap in mocks.
pub mod rowstore;
pub mod sneaks;

pub use rowstore::RowStoreProvider;
pub use sneaks::SneaksProvider;

use crate::models::{Identity, Sneaker, SneakerDetail};
use crate::Result;
use async_trait::async_trait;
use sneakervault_api::{
    Collection, CollectionItem, NewCollection, NewCollectionItem, NewVaultItem, VaultItem,
};
use uuid::Uuid;

/// Where sneaker data comes from.
///
/// `get_sneaker` must report a missing item as `Error::NotFound` - the
/// detail view treats that differently from every other failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SneakerProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Sneaker>>;
    async fn get_sneaker(&self, style_id: &str) -> Result<SneakerDetail>;
}

/// Session lookup. `Ok(None)` means nobody is signed in.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_identity(&self) -> Result<Option<Identity>>;
}

/// Rows in the vault and collection tables.
///
/// Duplicate rows must come back as `Error::AlreadyExists`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VaultStore: Send + Sync {
    async fn is_saved(&self, user_id: Uuid, style_id: &str) -> Result<bool>;
    async fn list_vault(&self, user_id: Uuid) -> Result<Vec<VaultItem>>;
    async fn add_to_vault(&self, item: NewVaultItem) -> Result<VaultItem>;
    async fn remove_from_vault(&self, user_id: Uuid, style_id: &str) -> Result<()>;

    async fn list_collections(&self, user_id: Uuid) -> Result<Vec<Collection>>;
    async fn create_collection(&self, collection: NewCollection) -> Result<Collection>;
    async fn delete_collection(&self, user_id: Uuid, collection_id: Uuid) -> Result<()>;
    async fn list_collection_items(&self, collection_id: Uuid) -> Result<Vec<CollectionItem>>;
    async fn add_to_collection(&self, item: NewCollectionItem) -> Result<CollectionItem>;
    async fn remove_from_collection(&self, collection_id: Uuid, style_id: &str) -> Result<()>;
}
