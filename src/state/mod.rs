pub mod context;
pub mod court;

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use dashmap::DashMap;
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::{
    config::{AppConfig, CourtCount},
    dao::{
        clock::{SharedClock, SystemClock},
        document_store::DocumentStore,
    },
    error::ServiceError,
    services::live_view::LiveView,
};

pub use self::context::DayContext;

pub type SharedState = Arc<AppState>;

/// Central application state holding the storage handle and club settings.
pub struct AppState {
    store: RwLock<Option<Arc<dyn DocumentStore>>>,
    degraded: watch::Sender<bool>,
    clock: SharedClock,
    config: AppConfig,
    court_count: AtomicU32,
    live_views: DashMap<Uuid, Arc<LiveView>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Same as [`AppState::new`] with an explicit clock.
    pub fn with_clock(config: AppConfig, clock: SharedClock) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            degraded: degraded_tx,
            clock,
            court_count: AtomicU32::new(config.court_count.get()),
            config,
            live_views: DashMap::new(),
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn DocumentStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn DocumentStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn DocumentStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Number of courts the composer currently distributes matches over.
    pub fn court_count(&self) -> CourtCount {
        CourtCount::new(self.court_count.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub fn set_court_count(&self, count: CourtCount) {
        self.court_count.store(count.get(), Ordering::Relaxed);
    }

    /// Realtime views of the open SSE connections, by view id.
    pub fn live_views(&self) -> &DashMap<Uuid, Arc<LiveView>> {
        &self.live_views
    }

    /// Build the context of one club day, using the configured group when the
    /// request names none.
    pub async fn day_context(
        &self,
        date_key: &str,
        group_id: Option<String>,
    ) -> Result<DayContext, ServiceError> {
        let store = self.require_store().await?;
        let group_id = group_id.or_else(|| self.config.group_id.clone());
        Ok(DayContext::new(
            store,
            self.clock.clone(),
            group_id,
            date_key,
        ))
    }
}
