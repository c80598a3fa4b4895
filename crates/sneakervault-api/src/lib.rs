// HTTP clients for the services we lean on:
// the sneaker-data provider and the row-store (which also does auth)
pub mod rowstore;
pub mod sneaks;

pub use rowstore::{
    AuthUser, Collection, CollectionItem, NewCollection, NewCollectionItem, NewVaultItem,
    RowStoreClient, RowStoreError, VaultItem,
};
pub use sneaks::{Sneaker, SneakerDetail, SneaksClient, SneaksError};
