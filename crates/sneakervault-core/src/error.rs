use thiserror::Error;

/// All the ways things can go wrong in SneakerVault
///
/// Coordinators never hand these to the render layer - they turn them into
/// state. Everything else (vault service, CLI plumbing) propagates them.
#[derive(Error, Debug)]
pub enum Error {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Sneaker not found: {0}")]
    NotFound(String),

    #[error("Sign in to manage your vault")]
    NotAuthenticated,

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Nothing loaded yet: {0}")]
    InvalidState(String),

    #[error("Cache setup failed: {0}")]
    CacheError(#[from] sneakervault_cache::CacheError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sneakervault_api::SneaksError> for Error {
    fn from(err: sneakervault_api::SneaksError) -> Self {
        match err {
            sneakervault_api::SneaksError::NotFound(id) => Error::NotFound(id),
            other => Error::ApiError(other.to_string()),
        }
    }
}

impl From<sneakervault_api::RowStoreError> for Error {
    fn from(err: sneakervault_api::RowStoreError) -> Self {
        match err {
            sneakervault_api::RowStoreError::Conflict(msg) => Error::AlreadyExists(msg),
            sneakervault_api::RowStoreError::Unauthorized => Error::NotAuthenticated,
            other => Error::ApiError(other.to_string()),
        }
    }
}
