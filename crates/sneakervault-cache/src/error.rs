use thiserror::Error;

/// Everything that can go wrong underneath the cache.
///
/// None of these ever reach a caller of `EphemeralCache` - they get logged
/// and turned into a cache miss. Storage backends still return them so the
/// failure shows up in the logs with some context.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Storage backend error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage quota exceeded: need {needed} bytes, limit is {limit}")]
    QuotaExceeded { needed: usize, limit: usize },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
