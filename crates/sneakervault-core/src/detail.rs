// Single-item detail view: cached detail fetch plus a rate-limited "saved?" check
use crate::{
    cancel::InFlight,
    models::{detail_cache_key, FetchState, SaveStatus, SneakerDetail},
    providers::SneakerProvider,
    vault::VaultService,
    Error, Result,
};
use sneakervault_cache::EphemeralCache;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailState {
    pub style_id: Option<String>,
    pub item: FetchState<SneakerDetail>,
    pub saved: SaveStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailOutcome {
    CacheHit,
    Fetched,
    NotFound,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    /// Nobody signed in, so nothing can be saved. No lookup made.
    SignedOut,
    Cached(bool),
    Checked(bool),
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadySaved,
}

/// What a status check found before it settles
enum StatusLookup {
    SignedOut,
    SessionFailed(Error),
    Cached(bool),
    Fetched(Uuid, Result<bool>),
}

/// Drives the detail view for one sneaker at a time.
///
/// Two independent flows, each with its own in-flight slot:
/// - the detail payload, cached for the content TTL
/// - whether the current user has it saved, cached per (user, item) for the
///   much shorter status TTL
pub struct DetailCoordinator {
    provider: Arc<dyn SneakerProvider>,
    vault: Arc<VaultService>,
    cache: Arc<EphemeralCache>,
    detail_flight: InFlight,
    status_flight: InFlight,
    state: watch::Sender<DetailState>,
}

impl DetailCoordinator {
    pub fn new(
        provider: Arc<dyn SneakerProvider>,
        vault: Arc<VaultService>,
        cache: Arc<EphemeralCache>,
    ) -> Self {
        let (state, _) = watch::channel(DetailState::default());
        Self {
            provider,
            vault,
            cache,
            detail_flight: InFlight::new(),
            status_flight: InFlight::new(),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DetailState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> DetailState {
        self.state.borrow().clone()
    }

    fn publish_item(&self, item: FetchState<SneakerDetail>) {
        self.state.send_modify(|state| state.item = item);
    }

    fn publish_saved(&self, saved: SaveStatus) {
        self.state.send_modify(|state| state.saved = saved);
    }

    /// Open the page: fetch the detail and check saved status side by side
    pub async fn open(&self, style_id: &str) -> (DetailOutcome, StatusOutcome) {
        tokio::join!(self.load(style_id), self.check_saved(style_id))
    }

    /// Fetch the detail payload, from cache if we've seen it recently
    pub async fn load(&self, style_id: &str) -> DetailOutcome {
        self.state
            .send_modify(|state| state.style_id = Some(style_id.to_string()));

        let key = detail_cache_key(style_id);
        if let Some(detail) = self.cache.get::<SneakerDetail>(&key) {
            debug!("Detail cache hit for {}", style_id);
            self.detail_flight
                .cancel(|_| self.publish_item(FetchState::Success(detail)));
            return DetailOutcome::CacheHit;
        }

        let ticket = self
            .detail_flight
            .begin(|| self.publish_item(FetchState::Loading));
        let generation = ticket.generation();

        info!("Fetching detail for {}", style_id);
        let Some(result) = self
            .detail_flight
            .run(ticket, self.provider.get_sneaker(style_id))
            .await
        else {
            return DetailOutcome::Cancelled;
        };

        self.detail_flight
            .settle(generation, || match result {
                Ok(detail) => {
                    self.cache.set(&key, &detail);
                    self.publish_item(FetchState::Success(detail));
                    DetailOutcome::Fetched
                }
                Err(Error::NotFound(_)) => {
                    self.publish_item(FetchState::NotFound);
                    DetailOutcome::NotFound
                }
                Err(e) => {
                    warn!("Detail fetch for {} failed: {}", style_id, e);
                    self.publish_item(FetchState::Failed(e.to_string()));
                    DetailOutcome::Failed
                }
            })
            .unwrap_or(DetailOutcome::Cancelled)
    }

    /// Is `style_id` in the signed-in user's vault?
    ///
    /// Answers are cached per (user, item), so repeat checks inside the
    /// status TTL never reach the row store. No identity, no lookup.
    pub async fn check_saved(&self, style_id: &str) -> StatusOutcome {
        let ticket = self
            .status_flight
            .begin(|| self.publish_saved(SaveStatus::Checking));
        let generation = ticket.generation();

        // Session lookup included - an older check stuck on it must not settle
        let Some(lookup) = self
            .status_flight
            .run(ticket, self.lookup_status(style_id))
            .await
        else {
            return StatusOutcome::Cancelled;
        };

        self.status_flight
            .settle(generation, || match lookup {
                StatusLookup::SignedOut => {
                    self.publish_saved(SaveStatus::NotSaved);
                    StatusOutcome::SignedOut
                }
                StatusLookup::SessionFailed(e) => {
                    warn!("Session lookup failed: {}", e);
                    self.publish_saved(SaveStatus::NotSaved);
                    StatusOutcome::Failed
                }
                StatusLookup::Cached(saved) => {
                    self.publish_saved(saved.into());
                    StatusOutcome::Cached(saved)
                }
                StatusLookup::Fetched(user_id, Ok(saved)) => {
                    self.vault.remember_status(&user_id, style_id, saved);
                    self.publish_saved(saved.into());
                    StatusOutcome::Checked(saved)
                }
                StatusLookup::Fetched(_, Err(e)) => {
                    // Don't cache a guess - next check should ask again
                    warn!("Vault status check for {} failed: {}", style_id, e);
                    self.publish_saved(SaveStatus::NotSaved);
                    StatusOutcome::Failed
                }
            })
            .unwrap_or(StatusOutcome::Cancelled)
    }

    async fn lookup_status(&self, style_id: &str) -> StatusLookup {
        let identity = match self.vault.current_identity().await {
            Ok(Some(identity)) => identity,
            Ok(None) => return StatusLookup::SignedOut,
            Err(e) => return StatusLookup::SessionFailed(e),
        };

        if let Some(saved) = self.vault.cached_status(&identity.id, style_id) {
            return StatusLookup::Cached(saved);
        }

        let saved = self.vault.fetch_status(identity.id, style_id).await;
        StatusLookup::Fetched(identity.id, saved)
    }

    /// Save whatever sneaker is currently loaded
    pub async fn add_to_vault(&self) -> Result<AddOutcome> {
        let detail = self
            .state
            .borrow()
            .item
            .value()
            .cloned()
            .ok_or_else(|| Error::InvalidState("no sneaker loaded".into()))?;

        let style_id = detail.sneaker.style_id.clone();
        let outcome = match self.vault.add_to_vault(&detail.sneaker).await {
            Ok(_) => AddOutcome::Added,
            Err(Error::AlreadyExists(_)) => AddOutcome::AlreadySaved,
            Err(e) => return Err(e),
        };

        // The page may have moved on while the insert was running
        if self.showing(&style_id) {
            // Any check still running predates this write
            self.status_flight.cancel(|was_active| {
                let marked = self.state.send_if_modified(|state| {
                    if state.style_id.as_deref() != Some(style_id.as_str()) {
                        return false;
                    }
                    state.saved = SaveStatus::Saved;
                    true
                });
                if !marked && was_active {
                    self.publish_saved(SaveStatus::Unknown);
                }
            });
        }
        Ok(outcome)
    }

    fn showing(&self, style_id: &str) -> bool {
        self.state.borrow().style_id.as_deref() == Some(style_id)
    }

    /// Abort both flows. Nothing in flight settles after this.
    pub fn cancel(&self) {
        self.detail_flight.cancel(|was_active| {
            if was_active {
                self.publish_item(FetchState::Idle);
            }
        });
        self.status_flight.cancel(|was_active| {
            if was_active {
                self.publish_saved(SaveStatus::Unknown);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Identity, Sneaker};
    use crate::models::{Collection, CollectionItem, VaultItem};
    use crate::providers::{
        IdentityProvider, MockIdentityProvider, MockSneakerProvider, MockVaultStore, VaultStore,
    };
    use async_trait::async_trait;
    use sneakervault_api::{NewCollection, NewCollectionItem, NewVaultItem};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use sneakervault_cache::{ManualClock, MemoryStorage, DEFAULT_NAMESPACE};
    use std::collections::BTreeMap;
    use std::time::Duration;
    use uuid::Uuid;

    const FIVE_MINUTES: Duration = Duration::from_secs(5 * 60);

    fn detail(style_id: &str) -> SneakerDetail {
        SneakerDetail {
            sneaker: Sneaker {
                style_id: style_id.to_string(),
                name: "Nike Air Max 1 '86".into(),
                brand: "Nike".into(),
                thumbnail: "https://images.stockx.com/images/air-max.jpg".into(),
                colorway: Some("Black/White".into()),
                release_date: Some("2023-03-26".into()),
                retail_price: Some(150.0),
            },
            description: Some("The one that started it all.".into()),
            image_links: vec![],
            resell_prices: BTreeMap::from([("stockX".to_string(), Some(210.0))]),
            resell_links: BTreeMap::new(),
        }
    }

    fn user_id() -> Uuid {
        Uuid::from_u128(42)
    }

    fn identity(signed_in: bool) -> MockIdentityProvider {
        let mut mock = MockIdentityProvider::new();
        mock.expect_current_identity().returning(move || {
            Ok(signed_in.then(|| Identity {
                id: user_id(),
                email: None,
            }))
        });
        mock
    }

    fn cache(ttl: Duration, clock: Arc<ManualClock>) -> Arc<EphemeralCache> {
        Arc::new(
            EphemeralCache::new(Arc::new(MemoryStorage::new()), DEFAULT_NAMESPACE, ttl)
                .with_clock(clock),
        )
    }

    struct Harness {
        clock: Arc<ManualClock>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                clock: Arc::new(ManualClock::new(1_700_000_000_000)),
            }
        }

        fn build(
            &self,
            provider: impl SneakerProvider + 'static,
            signed_in: bool,
            store: impl VaultStore + 'static,
        ) -> DetailCoordinator {
            self.build_with(provider, identity(signed_in), store)
        }

        fn build_with(
            &self,
            provider: impl SneakerProvider + 'static,
            identity: impl IdentityProvider + 'static,
            store: impl VaultStore + 'static,
        ) -> DetailCoordinator {
            let vault = VaultService::new(
                Arc::new(identity),
                Arc::new(store),
                cache(FIVE_MINUTES, self.clock.clone()),
            );
            DetailCoordinator::new(
                Arc::new(provider),
                Arc::new(vault),
                cache(Duration::from_secs(24 * 60 * 60), self.clock.clone()),
            )
        }
    }

    #[tokio::test]
    async fn test_not_found_is_its_own_state() {
        let mut provider = MockSneakerProvider::new();
        provider
            .expect_get_sneaker()
            .returning(|_| Err(Error::NotFound("NOPE-000".into())));

        let detail = Harness::new().build(provider, false, MockVaultStore::new());

        assert_eq!(detail.load("NOPE-000").await, DetailOutcome::NotFound);
        assert_eq!(detail.state().item, FetchState::NotFound);
    }

    #[tokio::test]
    async fn test_transport_error_is_generic_failure() {
        let mut provider = MockSneakerProvider::new();
        provider
            .expect_get_sneaker()
            .returning(|_| Err(Error::ApiError("connection reset".into())));

        let detail = Harness::new().build(provider, false, MockVaultStore::new());

        assert_eq!(detail.load("DZ4549-001").await, DetailOutcome::Failed);
        assert!(matches!(detail.state().item, FetchState::Failed(msg) if msg.contains("connection reset")));
    }

    #[tokio::test]
    async fn test_detail_is_cached() {
        let mut provider = MockSneakerProvider::new();
        provider
            .expect_get_sneaker()
            .times(1)
            .returning(|_| Ok(detail("DZ4549-001")));

        let detail = Harness::new().build(provider, false, MockVaultStore::new());

        assert_eq!(detail.load("DZ4549-001").await, DetailOutcome::Fetched);
        assert_eq!(detail.load("DZ4549-001").await, DetailOutcome::CacheHit);
        assert_eq!(
            detail.state().item.value().map(|d| d.sneaker.name.as_str()),
            Some("Nike Air Max 1 '86")
        );
    }

    #[tokio::test]
    async fn test_status_check_is_rate_limited() {
        let mut store = MockVaultStore::new();
        store
            .expect_is_saved()
            .times(2)
            .returning(|_, _| Ok(true));

        let harness = Harness::new();
        let detail = harness.build(MockSneakerProvider::new(), true, store);

        assert_eq!(detail.check_saved("DZ4549-001").await, StatusOutcome::Checked(true));
        assert_eq!(detail.check_saved("DZ4549-001").await, StatusOutcome::Cached(true));
        assert_eq!(detail.state().saved, SaveStatus::Saved);

        harness.clock.advance(FIVE_MINUTES + Duration::from_secs(1));
        assert_eq!(detail.check_saved("DZ4549-001").await, StatusOutcome::Checked(true));
    }

    #[tokio::test]
    async fn test_signed_out_skips_status_lookup() {
        let mut store = MockVaultStore::new();
        store.expect_is_saved().times(0);

        let detail = Harness::new().build(MockSneakerProvider::new(), false, store);

        assert_eq!(detail.check_saved("DZ4549-001").await, StatusOutcome::SignedOut);
        assert_eq!(detail.state().saved, SaveStatus::NotSaved);
    }

    #[tokio::test]
    async fn test_failed_status_check_is_not_cached() {
        let mut store = MockVaultStore::new();
        store
            .expect_is_saved()
            .times(2)
            .returning(|_, _| Err(Error::ApiError("Status 503".into())));

        let detail = Harness::new().build(MockSneakerProvider::new(), true, store);

        assert_eq!(detail.check_saved("DZ4549-001").await, StatusOutcome::Failed);
        assert_eq!(detail.check_saved("DZ4549-001").await, StatusOutcome::Failed);
        assert_eq!(detail.state().saved, SaveStatus::NotSaved);
    }

    #[tokio::test]
    async fn test_open_runs_both_flows() {
        let mut provider = MockSneakerProvider::new();
        provider
            .expect_get_sneaker()
            .returning(|_| Ok(detail("DZ4549-001")));
        let mut store = MockVaultStore::new();
        store.expect_is_saved().returning(|_, _| Ok(false));

        let detail = Harness::new().build(provider, true, store);
        let outcome = detail.open("DZ4549-001").await;

        assert_eq!(outcome, (DetailOutcome::Fetched, StatusOutcome::Checked(false)));
        let state = detail.state();
        assert_eq!(state.style_id.as_deref(), Some("DZ4549-001"));
        assert_eq!(state.saved, SaveStatus::NotSaved);
    }

    #[tokio::test]
    async fn test_add_duplicate_counts_as_saved() {
        let mut provider = MockSneakerProvider::new();
        provider
            .expect_get_sneaker()
            .returning(|_| Ok(detail("DZ4549-001")));
        let mut store = MockVaultStore::new();
        store
            .expect_add_to_vault()
            .returning(|_| Err(Error::AlreadyExists("duplicate key".into())));
        // Write-through means the follow-up check never reaches the store
        store.expect_is_saved().times(0);

        let detail = Harness::new().build(provider, true, store);
        detail.load("DZ4549-001").await;

        assert_eq!(detail.add_to_vault().await.unwrap(), AddOutcome::AlreadySaved);
        assert_eq!(detail.state().saved, SaveStatus::Saved);
        assert_eq!(detail.check_saved("DZ4549-001").await, StatusOutcome::Cached(true));
    }

    #[tokio::test]
    async fn test_add_without_loaded_item() {
        let detail = Harness::new().build(MockSneakerProvider::new(), true, MockVaultStore::new());
        assert!(matches!(
            detail.add_to_vault().await,
            Err(Error::InvalidState(_))
        ));
    }

    /// Provider that takes its time, so requests can overlap
    struct SlowProvider;

    #[async_trait]
    impl SneakerProvider for SlowProvider {
        async fn search(&self, _query: &str) -> Result<Vec<Sneaker>> {
            Ok(vec![])
        }

        async fn get_sneaker(&self, style_id: &str) -> Result<SneakerDetail> {
            let delay = if style_id == "SLOW" { 300 } else { 50 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(detail(style_id))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_load_never_renders() {
        let detail = Arc::new(Harness::new().build(SlowProvider, false, MockVaultStore::new()));

        let slow = {
            let detail = Arc::clone(&detail);
            tokio::spawn(async move { detail.load("SLOW").await })
        };
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert!(detail.state().item.is_loading());

        assert_eq!(detail.load("FAST").await, DetailOutcome::Fetched);
        assert_eq!(slow.await.unwrap(), DetailOutcome::Cancelled);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let state = detail.state();
        assert_eq!(state.item.value().map(|d| d.sneaker.style_id.as_str()), Some("FAST"));
        assert_eq!(state.style_id.as_deref(), Some("FAST"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_returns_to_idle() {
        let detail = Arc::new(Harness::new().build(SlowProvider, false, MockVaultStore::new()));

        let pending = {
            let detail = Arc::clone(&detail);
            tokio::spawn(async move { detail.load("SLOW").await })
        };
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        detail.cancel();
        assert_eq!(pending.await.unwrap(), DetailOutcome::Cancelled);
        assert_eq!(detail.state().item, FetchState::Idle);
    }

    /// Session lookup that hangs on the first call only
    #[derive(Default)]
    struct SlowFirstSession {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IdentityProvider for SlowFirstSession {
        async fn current_identity(&self) -> Result<Option<Identity>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
            Ok(Some(Identity {
                id: user_id(),
                email: None,
            }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_status_check_never_overwrites_newer() {
        let mut store = MockVaultStore::new();
        store
            .expect_is_saved()
            .returning(|_, style_id| Ok(style_id == "555088-134"));

        let detail = Arc::new(Harness::new().build_with(
            MockSneakerProvider::new(),
            SlowFirstSession::default(),
            store,
        ));

        let older = {
            let detail = Arc::clone(&detail);
            tokio::spawn(async move { detail.check_saved("DZ4549-001").await })
        };
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        // Checking shows up before the session lookup returns
        assert_eq!(detail.state().saved, SaveStatus::Checking);

        assert_eq!(
            detail.check_saved("555088-134").await,
            StatusOutcome::Checked(true)
        );
        assert_eq!(older.await.unwrap(), StatusOutcome::Cancelled);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(detail.state().saved, SaveStatus::Saved);
    }

    /// Row store whose inserts take a while
    struct SlowInsertStore;

    #[async_trait]
    impl VaultStore for SlowInsertStore {
        async fn is_saved(&self, _user_id: Uuid, _style_id: &str) -> Result<bool> {
            Ok(false)
        }

        async fn list_vault(&self, _user_id: Uuid) -> Result<Vec<VaultItem>> {
            Ok(vec![])
        }

        async fn add_to_vault(&self, item: NewVaultItem) -> Result<VaultItem> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(VaultItem {
                id: Uuid::new_v4(),
                user_id: item.user_id,
                sneaker_id: item.sneaker_id,
                name: item.name,
                brand: item.brand,
                thumbnail: item.thumbnail,
                created_at: "2024-05-01T12:00:00Z".parse().unwrap(),
            })
        }

        async fn remove_from_vault(&self, _user_id: Uuid, _style_id: &str) -> Result<()> {
            Ok(())
        }

        async fn list_collections(&self, _user_id: Uuid) -> Result<Vec<Collection>> {
            Ok(vec![])
        }

        async fn create_collection(&self, _collection: NewCollection) -> Result<Collection> {
            Err(Error::ApiError("not used".into()))
        }

        async fn delete_collection(&self, _user_id: Uuid, _collection_id: Uuid) -> Result<()> {
            Ok(())
        }

        async fn list_collection_items(&self, _collection_id: Uuid) -> Result<Vec<CollectionItem>> {
            Ok(vec![])
        }

        async fn add_to_collection(&self, _item: NewCollectionItem) -> Result<CollectionItem> {
            Err(Error::ApiError("not used".into()))
        }

        async fn remove_from_collection(&self, _collection_id: Uuid, _style_id: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_does_not_mark_a_different_item() {
        let mut provider = MockSneakerProvider::new();
        provider
            .expect_get_sneaker()
            .returning(|style_id| Ok(detail(style_id)));

        let detail = Arc::new(Harness::new().build(provider, true, SlowInsertStore));
        detail.load("DZ4549-001").await;

        let adding = {
            let detail = Arc::clone(&detail);
            tokio::spawn(async move { detail.add_to_vault().await })
        };
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        // User navigates away while the insert is still running
        assert_eq!(detail.load("555088-134").await, DetailOutcome::Fetched);
        assert_eq!(adding.await.unwrap().unwrap(), AddOutcome::Added);

        let state = detail.state();
        assert_eq!(state.style_id.as_deref(), Some("555088-134"));
        assert_eq!(state.saved, SaveStatus::Unknown);
    }
}
