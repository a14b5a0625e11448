//! Realtime listeners built on top of [`DocumentStore::changes`].
//!
//! A listener first delivers the current snapshot, then a fresh snapshot
//! after every write touching what it watches. Each listener is a Tokio task
//! owned by a [`Subscription`] handle; dropping or cancelling the handle stops
//! the task.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::{
    sync::broadcast::error::RecvError,
    task::JoinHandle,
};
use tracing::debug;

use super::{
    document::{DocPath, Document, Query},
    document_store::DocumentStore,
    storage::StorageResult,
};

/// Handle of a running listener.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stop the listener; no callback runs afterwards.
    pub fn cancel(self) {
        drop(self);
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Watch every document matched by `query`.
pub fn subscribe<F>(store: Arc<dyn DocumentStore>, query: Query, mut on_change: F) -> Subscription
where
    F: FnMut(StorageResult<Vec<Document>>) + Send + 'static,
{
    // Subscribe before the first read so no write slips between the two.
    let mut changes = store.changes();
    let handle = tokio::spawn(async move {
        on_change(store.query(query.clone()).await);
        loop {
            match changes.recv().await {
                Ok(change) if change.path.collection() == &query.collection => {}
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, collection = %query.collection, "listener lagged; re-reading");
                }
                Err(RecvError::Closed) => break,
            }
            on_change(store.query(query.clone()).await);
        }
    });
    Subscription { handle }
}

/// Watch a single document.
pub fn subscribe_doc<F>(store: Arc<dyn DocumentStore>, path: DocPath, mut on_change: F) -> Subscription
where
    F: FnMut(StorageResult<Option<Document>>) + Send + 'static,
{
    let mut changes = store.changes();
    let handle = tokio::spawn(async move {
        on_change(store.get(path.clone()).await);
        loop {
            match changes.recv().await {
                Ok(change) if change.path == path => {}
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, path = %path, "listener lagged; re-reading");
                }
                Err(RecvError::Closed) => break,
            }
            on_change(store.get(path.clone()).await);
        }
    });
    Subscription { handle }
}

/// Identifies a listener inside a [`SubscriptionRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub date_key: String,
    /// What is watched, e.g. `queue` or `court1/live`.
    pub scope: String,
}

impl SubscriptionKey {
    pub fn new(date_key: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            date_key: date_key.into(),
            scope: scope.into(),
        }
    }
}

/// Set of active listeners; replacing or clearing an entry cancels it.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    handles: DashMap<SubscriptionKey, Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `subscription` under `key`, cancelling whatever held the key before.
    pub fn insert(&self, key: SubscriptionKey, subscription: Subscription) {
        if let Some(previous) = self.handles.insert(key, subscription) {
            previous.cancel();
        }
    }

    /// Cancel one listener; returns whether it existed.
    pub fn cancel(&self, key: &SubscriptionKey) -> bool {
        match self.handles.remove(key) {
            Some((_, subscription)) => {
                subscription.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every listener and empty the registry.
    pub fn cancel_all(&self) {
        self.handles.clear();
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn contains(&self, key: &SubscriptionKey) -> bool {
        self.handles.contains_key(key)
    }
}
