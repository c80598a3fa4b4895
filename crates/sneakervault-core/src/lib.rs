// Core business logic - request coordination on top of the cache and the APIs
pub mod cancel;
pub mod config;
pub mod context;
pub mod debounce;
pub mod detail;
pub mod error;
pub mod models;
pub mod providers;
pub mod search;
pub mod vault;

pub use config::Config;
pub use context::AppContext;
pub use debounce::Debouncer;
pub use detail::{AddOutcome, DetailCoordinator, DetailOutcome, DetailState, StatusOutcome};
pub use error::Error;
pub use search::{SearchCoordinator, SearchOutcome, SearchState};
pub use vault::VaultService;

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;
