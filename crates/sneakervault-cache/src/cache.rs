use crate::clock::{Clock, SystemClock};
use crate::storage::Storage;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Prefix every key gets before it hits storage.
pub const DEFAULT_NAMESPACE: &str = "sneaker_vault_";

/// What actually lands in storage for each key.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    value: serde_json::Value,
    #[serde(rename = "storedAt")]
    stored_at: i64,
}

/// Hit/miss counters, handy when staring at debug logs
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    failures: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Namespaced key-value cache where every entry expires after a fixed TTL.
///
/// The contract is deliberately forgiving: storage or serialization failures
/// are logged and then treated as a miss. Callers never see an error, they
/// just go to the network.
///
/// Expired entries are purged lazily, on the read that notices them.
pub struct EphemeralCache {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    namespace: String,
    ttl: Duration,
    stats: CacheStats,
}

impl EphemeralCache {
    pub fn new(storage: Arc<dyn Storage>, namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
            namespace: namespace.into(),
            ttl,
            stats: CacheStats::default(),
        }
    }

    /// Swap the clock - tests use this to step over TTL boundaries
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    /// Fetch a value if it exists and hasn't outlived the TTL.
    ///
    /// An entry is stale once `now - stored_at > ttl`. Stale or unreadable
    /// entries are removed as a side effect.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let storage_key = self.storage_key(key);

        let raw = match self.storage.get_raw(&storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Cache miss for {}", storage_key);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                warn!("Cache read error for {}: {}", storage_key, e);
                self.record_failure();
                return None;
            }
        };

        let envelope: CacheEnvelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping unreadable cache entry {}: {}", storage_key, e);
                self.record_failure();
                self.purge(&storage_key);
                return None;
            }
        };

        let age_ms = self.clock.now_millis() - envelope.stored_at;
        if age_ms > self.ttl.as_millis() as i64 {
            debug!("Cache entry {} expired ({}ms old)", storage_key, age_ms);
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            self.purge(&storage_key);
            return None;
        }

        match serde_json::from_value(envelope.value) {
            Ok(value) => {
                debug!("Cache hit for {}", storage_key);
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(e) => {
                warn!("Cached value for {} has the wrong shape: {}", storage_key, e);
                self.record_failure();
                self.purge(&storage_key);
                None
            }
        }
    }

    /// Store a value stamped with the current time, replacing whatever was there.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        let storage_key = self.storage_key(key);

        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!("Cache write error for {}: {}", storage_key, e);
                self.record_failure();
                return;
            }
        };

        let envelope = CacheEnvelope {
            value,
            stored_at: self.clock.now_millis(),
        };

        let written = serde_json::to_string(&envelope)
            .map_err(crate::CacheError::from)
            .and_then(|raw| self.storage.set_raw(&storage_key, &raw));

        match written {
            Ok(()) => {
                self.stats.writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!("Cache write error for {}: {}", storage_key, e);
                self.record_failure();
            }
        }
    }

    /// Drop a single entry
    pub fn remove(&self, key: &str) {
        self.purge(&self.storage_key(key));
    }

    /// Remove every entry in this namespace. Keys outside it are left alone.
    pub fn clear(&self) {
        let keys = match self.storage.keys_with_prefix(&self.namespace) {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Cache clear error: {}", e);
                self.record_failure();
                return;
            }
        };

        debug!("Clearing {} cache entries under {}", keys.len(), self.namespace);
        for key in keys {
            self.purge(&key);
        }
    }

    fn purge(&self, storage_key: &str) {
        if let Err(e) = self.storage.remove(storage_key) {
            warn!("Failed to remove cache entry {}: {}", storage_key, e);
            self.record_failure();
        }
    }

    fn record_failure(&self) {
        self.stats.failures.fetch_add(1, Ordering::Relaxed);
    }
}
