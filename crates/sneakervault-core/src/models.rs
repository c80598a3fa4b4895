use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use sneakervault_api::{
    Collection, CollectionItem, Sneaker, SneakerDetail, VaultItem,
};

const SEARCH_KEY_PREFIX: &str = "search_";
const DETAIL_KEY_PREFIX: &str = "sneaker_";
const STATUS_KEY_PREFIX: &str = "vault_status_";

/// Whoever is signed in right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
}

/// A search string that's been trimmed and is long enough to bother with.
///
/// If you're holding one of these, it's worth a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery(String);

impl SearchQuery {
    /// Trim and length-check raw input. Length is counted in characters.
    pub fn parse(raw: &str, min_len: usize) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.chars().count() < min_len {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive: "Air Max" and "air max" share an entry
    pub fn cache_key(&self) -> String {
        format!("{}{}", SEARCH_KEY_PREFIX, self.0.to_lowercase())
    }
}

impl std::fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn detail_cache_key(style_id: &str) -> String {
    format!("{}{}", DETAIL_KEY_PREFIX, style_id)
}

pub fn status_cache_key(user_id: &Uuid, style_id: &str) -> String {
    format!("{}{}_{}", STATUS_KEY_PREFIX, user_id, style_id)
}

/// Where a single fetch flow stands.
///
/// `idle -> loading -> {success, not_found, failed}`. Anything cancelled
/// before it finishes never reaches a terminal state.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState<T> {
    Idle,
    Loading,
    Success(T),
    NotFound,
    Failed(String),
}

// Manual impl: the derive would demand `T: Default`
impl<T> Default for FetchState<T> {
    fn default() -> Self {
        FetchState::Idle
    }
}

impl<T> FetchState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            FetchState::Success(value) => Some(value),
            _ => None,
        }
    }
}

/// Is the item on screen already in the signed-in user's vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Unknown,
    Checking,
    Saved,
    NotSaved,
}

impl From<bool> for SaveStatus {
    fn from(saved: bool) -> Self {
        if saved {
            SaveStatus::Saved
        } else {
            SaveStatus::NotSaved
        }
    }
}
