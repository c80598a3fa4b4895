// Search-as-you-type: debounce -> cache -> cancellable fetch -> render
use crate::{
    cancel::InFlight,
    config::SearchConfig,
    debounce::Debouncer,
    models::{FetchState, SearchQuery, Sneaker},
    providers::SneakerProvider,
};
use sneakervault_cache::EphemeralCache;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What the search view should be showing right now
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchState {
    /// Exactly what's in the text field, updated on every keystroke
    pub query: String,
    pub status: FetchState<Vec<Sneaker>>,
}

impl SearchState {
    /// Results to render. Empty unless the last search succeeded.
    pub fn results(&self) -> &[Sneaker] {
        self.status.value().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_loading(&self) -> bool {
        self.status.is_loading()
    }
}

/// How one pass through the search routine ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Query too short - results cleared, nothing looked up
    TooShort,
    CacheHit(usize),
    Fetched(usize),
    /// Superseded by a newer request; nothing was rendered
    Cancelled,
    Failed,
}

struct SearchInner {
    provider: Arc<dyn SneakerProvider>,
    cache: Arc<EphemeralCache>,
    in_flight: InFlight,
    state: watch::Sender<SearchState>,
    min_query_len: usize,
}

impl SearchInner {
    fn publish(&self, status: FetchState<Vec<Sneaker>>) {
        self.state.send_modify(|state| state.status = status);
    }

    async fn run(&self, raw: &str) -> SearchOutcome {
        let Some(query) = SearchQuery::parse(raw, self.min_query_len) else {
            // Whatever was in flight belongs to text that isn't there anymore
            self.in_flight.cancel(|_| self.publish(FetchState::Idle));
            return SearchOutcome::TooShort;
        };

        let key = query.cache_key();
        if let Some(results) = self.cache.get::<Vec<Sneaker>>(&key) {
            debug!("Cache hit for '{}' ({} results)", query, results.len());
            let count = results.len();
            self.in_flight
                .cancel(|_| self.publish(FetchState::Success(results)));
            return SearchOutcome::CacheHit(count);
        }

        let ticket = self.in_flight.begin(|| self.publish(FetchState::Loading));
        let generation = ticket.generation();

        info!("Searching provider for '{}'", query);
        let Some(result) = self
            .in_flight
            .run(ticket, self.provider.search(query.as_str()))
            .await
        else {
            debug!("Search for '{}' was cancelled", query);
            return SearchOutcome::Cancelled;
        };

        let settled = self.in_flight.settle(generation, || match result {
            Ok(results) => {
                // Empty results get cached too - "nothing found" is an answer
                self.cache.set(&key, &results);
                let count = results.len();
                self.publish(FetchState::Success(results));
                SearchOutcome::Fetched(count)
            }
            Err(e) => {
                warn!("Search for '{}' failed: {}", query, e);
                self.publish(FetchState::Failed(e.to_string()));
                SearchOutcome::Failed
            }
        });

        settled.unwrap_or_else(|| {
            debug!("Dropping stale response for '{}'", query);
            SearchOutcome::Cancelled
        })
    }
}

/// Turns keystrokes into at most one settled result set per debounce window.
///
/// Input goes through [`SearchCoordinator::input_changed`]; the text updates
/// immediately, the search itself runs once typing pauses. Only the most
/// recently *issued* request ever gets rendered, no matter what order
/// responses come back in.
///
/// Watch the state with [`SearchCoordinator::subscribe`].
pub struct SearchCoordinator {
    inner: Arc<SearchInner>,
    debouncer: Debouncer<String>,
}

impl SearchCoordinator {
    pub fn new(
        provider: Arc<dyn SneakerProvider>,
        cache: Arc<EphemeralCache>,
        settings: &SearchConfig,
    ) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        let inner = Arc::new(SearchInner {
            provider,
            cache,
            in_flight: InFlight::new(),
            state,
            min_query_len: settings.min_query_len,
        });

        let debounced = Arc::clone(&inner);
        let debouncer = Debouncer::new(settings.debounce(), move |query: String| {
            let inner = Arc::clone(&debounced);
            async move {
                inner.run(&query).await;
            }
        });

        Self { inner, debouncer }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> SearchState {
        self.inner.state.borrow().clone()
    }

    /// A keystroke. Updates the visible query now, searches later.
    pub fn input_changed(&self, raw: &str) {
        self.inner
            .state
            .send_modify(|state| state.query = raw.to_string());
        self.debouncer.call(raw.to_string());
    }

    /// Enter / search button: skip the debounce and search the current text now
    pub async fn submit(&self) -> SearchOutcome {
        self.debouncer.cancel();
        let query = self.inner.state.borrow().query.clone();
        self.inner.run(&query).await
    }

    /// Run the search routine directly for `raw`.
    ///
    /// Same cache and cancellation rules as the debounced path. Calling it
    /// again for the same text is how you retry.
    pub async fn search(&self, raw: &str) -> SearchOutcome {
        self.inner.run(raw).await
    }

    /// Drop any pending keystroke and abort the in-flight request
    pub fn cancel(&self) {
        self.debouncer.cancel();
        self.inner.in_flight.cancel(|was_active| {
            // The aborted request won't settle, so someone has to clear loading
            if was_active {
                self.inner.publish(FetchState::Idle);
            }
        });
    }

    pub fn is_searching(&self) -> bool {
        self.inner.in_flight.is_active()
    }
}
