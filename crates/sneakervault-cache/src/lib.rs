// Time-boxed key-value caching layer
// Purely an optimization - nothing in here is ever the source of truth

pub mod cache;
pub mod clock;
pub mod error;
pub mod storage;

pub use cache::{CacheStats, EphemeralCache, DEFAULT_NAMESPACE};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, Result};
pub use storage::{MemoryStorage, SqliteStorage, Storage};
