// Row-store provider - the hosted database doubles as our identity service
use async_trait::async_trait;
use sneakervault_api::{
    Collection, CollectionItem, NewCollection, NewCollectionItem, NewVaultItem, RowStoreClient,
    VaultItem,
};
use uuid::Uuid;

use crate::{
    models::Identity,
    providers::{IdentityProvider, VaultStore},
    Result,
};

pub struct RowStoreProvider {
    client: RowStoreClient,
}

impl RowStoreProvider {
    pub fn new(url: &str, anon_key: &str, access_token: Option<String>) -> Result<Self> {
        let client = RowStoreClient::new(url, anon_key, access_token)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl IdentityProvider for RowStoreProvider {
    async fn current_identity(&self) -> Result<Option<Identity>> {
        let user = self.client.current_user().await?;
        Ok(user.map(|u| Identity {
            id: u.id,
            email: u.email,
        }))
    }
}

#[async_trait]
impl VaultStore for RowStoreProvider {
    async fn is_saved(&self, user_id: Uuid, style_id: &str) -> Result<bool> {
        Ok(self.client.vault_item_exists(user_id, style_id).await?)
    }

    async fn list_vault(&self, user_id: Uuid) -> Result<Vec<VaultItem>> {
        Ok(self.client.list_vault(user_id).await?)
    }

    async fn add_to_vault(&self, item: NewVaultItem) -> Result<VaultItem> {
        Ok(self.client.insert_vault_item(&item).await?)
    }

    async fn remove_from_vault(&self, user_id: Uuid, style_id: &str) -> Result<()> {
        Ok(self.client.delete_vault_item(user_id, style_id).await?)
    }

    async fn list_collections(&self, user_id: Uuid) -> Result<Vec<Collection>> {
        Ok(self.client.list_collections(user_id).await?)
    }

    async fn create_collection(&self, collection: NewCollection) -> Result<Collection> {
        Ok(self.client.insert_collection(&collection).await?)
    }

    async fn delete_collection(&self, user_id: Uuid, collection_id: Uuid) -> Result<()> {
        Ok(self.client.delete_collection(user_id, collection_id).await?)
    }

    async fn list_collection_items(&self, collection_id: Uuid) -> Result<Vec<CollectionItem>> {
        Ok(self.client.list_collection_items(collection_id).await?)
    }

    async fn add_to_collection(&self, item: NewCollectionItem) -> Result<CollectionItem> {
        Ok(self.client.insert_collection_item(&item).await?)
    }

    async fn remove_from_collection(&self, collection_id: Uuid, style_id: &str) -> Result<()> {
        Ok(self
            .client
            .delete_collection_item(collection_id, style_id)
            .await?)
    }
}
