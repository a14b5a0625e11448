//! Realtime view of one club day held by a single SSE connection.
//!
//! A view keeps one listener per watched scope in a [`SubscriptionRegistry`].
//! Switching to another day cancels every listener before the new ones start,
//! so a connection never receives snapshots from two days at once.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        document::{Direction, Query},
        document_store::DocumentStore,
        models::{Identified, LiveMatchEntity},
        paths::{DayPaths, court_id},
        storage::StorageResult,
        subscription::{SubscriptionKey, SubscriptionRegistry, subscribe, subscribe_doc},
    },
    dto::sse::{
        CourtLiveSnapshot, ExcludedSnapshot, ListenerError, QueueSnapshot, ServerEvent,
        StandbySnapshot,
    },
};

/// Per-connection set of day listeners feeding one event channel.
pub struct LiveView {
    id: Uuid,
    store: Arc<dyn DocumentStore>,
    group_id: Option<String>,
    court_count: u32,
    events: mpsc::UnboundedSender<ServerEvent>,
    registry: SubscriptionRegistry,
    date_key: Mutex<Option<String>>,
}

impl LiveView {
    /// View with no listeners yet; call [`LiveView::watch_day`] to start one.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        group_id: Option<String>,
        court_count: u32,
        events: mpsc::UnboundedSender<ServerEvent>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            store,
            group_id,
            court_count,
            events,
            registry: SubscriptionRegistry::new(),
            date_key: Mutex::new(None),
        }
    }

    /// Identifier handed to the client in the handshake.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of courts whose slots are watched.
    pub fn court_count(&self) -> u32 {
        self.court_count
    }

    /// Day currently watched, if any.
    pub fn date_key(&self) -> Option<String> {
        self.date_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of running listeners.
    pub fn active_listeners(&self) -> usize {
        self.registry.len()
    }

    /// Whether a listener for `scope` of `date_key` is registered.
    pub fn is_watching(&self, date_key: &str, scope: &str) -> bool {
        self.registry
            .contains(&SubscriptionKey::new(date_key, scope))
    }

    /// Watch `date_key`: queue, exclusions, and the live slot and standby
    /// list of every court. Listeners of the previous day are cancelled first.
    pub fn watch_day(&self, date_key: &str) {
        let mut current = self
            .date_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.registry.cancel_all();

        let paths = DayPaths::new(self.group_id.as_deref(), date_key);
        self.watch_queue(&paths);
        self.watch_excluded(&paths);
        for number in 1..=self.court_count {
            let court = court_id(number);
            self.watch_live(&paths, &court);
            self.watch_standby(&paths, &court);
        }

        info!(
            view_id = %self.id,
            date = date_key,
            listeners = self.registry.len(),
            "live view watching day"
        );
        *current = Some(date_key.to_owned());
    }

    /// Cancel every listener.
    pub fn close(&self) {
        self.registry.cancel_all();
        debug!(view_id = %self.id, "live view closed");
    }

    fn watch_queue(&self, paths: &DayPaths) {
        let sink = self.sink(paths.date_key(), "queue");
        let query = Query::new(paths.queue()).order_by("joinedAt", Direction::Ascending);
        let subscription = subscribe(self.store.clone(), query, move |result| {
            sink.send("queue", result.and_then(|documents| {
                Ok(QueueSnapshot {
                    date_key: sink.date_key.clone(),
                    entries: Identified::decode_all(&documents)?,
                })
            }));
        });
        self.registry
            .insert(SubscriptionKey::new(paths.date_key(), "queue"), subscription);
    }

    fn watch_excluded(&self, paths: &DayPaths) {
        let sink = self.sink(paths.date_key(), "excluded");
        let subscription = subscribe(self.store.clone(), Query::new(paths.excluded()), move |result| {
            sink.send("excluded", result.map(|documents| ExcludedSnapshot {
                date_key: sink.date_key.clone(),
                player_ids: documents
                    .iter()
                    .map(|document| document.id().to_owned())
                    .collect(),
            }));
        });
        self.registry
            .insert(SubscriptionKey::new(paths.date_key(), "excluded"), subscription);
    }

    fn watch_live(&self, paths: &DayPaths, court: &str) {
        let scope = format!("{court}/live");
        let sink = self.sink(paths.date_key(), &scope);
        let court_id = court.to_owned();
        let subscription = subscribe_doc(self.store.clone(), paths.live_slot(court), move |result| {
            sink.send("live", result.and_then(|document| {
                let live = document
                    .map(|document| document.decode::<LiveMatchEntity>())
                    .transpose()?;
                Ok(CourtLiveSnapshot {
                    date_key: sink.date_key.clone(),
                    court_id: court_id.clone(),
                    live,
                })
            }));
        });
        self.registry
            .insert(SubscriptionKey::new(paths.date_key(), scope), subscription);
    }

    fn watch_standby(&self, paths: &DayPaths, court: &str) {
        let scope = format!("{court}/standby");
        let sink = self.sink(paths.date_key(), &scope);
        let court_id = court.to_owned();
        let query = Query::new(paths.standby(court)).order_by("createdAt", Direction::Ascending);
        let subscription = subscribe(self.store.clone(), query, move |result| {
            sink.send("standby", result.and_then(|documents| {
                Ok(StandbySnapshot {
                    date_key: sink.date_key.clone(),
                    court_id: court_id.clone(),
                    matches: Identified::decode_all(&documents)?,
                })
            }));
        });
        self.registry
            .insert(SubscriptionKey::new(paths.date_key(), scope), subscription);
    }

    fn sink(&self, date_key: &str, scope: &str) -> EventSink {
        EventSink {
            view_id: self.id,
            date_key: date_key.to_owned(),
            scope: scope.to_owned(),
            events: self.events.clone(),
        }
    }
}

impl Drop for LiveView {
    fn drop(&mut self) {
        self.registry.cancel_all();
    }
}

/// Serialises listener snapshots onto the view's channel.
struct EventSink {
    view_id: Uuid,
    date_key: String,
    scope: String,
    events: mpsc::UnboundedSender<ServerEvent>,
}

impl EventSink {
    fn send<T: Serialize>(&self, event: &str, snapshot: StorageResult<T>) {
        let event = match snapshot {
            Ok(payload) => ServerEvent::json(Some(event.to_owned()), &payload),
            Err(err) => {
                warn!(
                    view_id = %self.view_id,
                    date = %self.date_key,
                    scope = %self.scope,
                    error = %err,
                    "listener read failed"
                );
                ServerEvent::json(
                    Some("listener_error".to_owned()),
                    &ListenerError {
                        date_key: self.date_key.clone(),
                        scope: self.scope.clone(),
                        message: err.to_string(),
                    },
                )
            }
        };

        match event {
            Ok(event) => {
                // A closed channel means the connection is gone; the view is dropped with it.
                let _ = self.events.send(event);
            }
            Err(err) => warn!(scope = %self.scope, error = %err, "failed to serialise snapshot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::dao::{clock::ManualClock, document_store::memory::MemoryDocumentStore};

    fn view(court_count: u32) -> (LiveView, mpsc::UnboundedReceiver<ServerEvent>) {
        let store = Arc::new(MemoryDocumentStore::new(Arc::new(ManualClock::new(0))));
        let (tx, rx) = mpsc::unbounded_channel();
        (LiveView::new(store, None, court_count, tx), rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn watches_queue_exclusions_and_each_court() {
        let (view, mut rx) = view(2);
        view.watch_day("2024-01-01");

        assert_eq!(view.active_listeners(), 6);
        assert!(view.is_watching("2024-01-01", "court2/standby"));

        let mut names = Vec::new();
        for _ in 0..6 {
            names.push(next(&mut rx).await.event.unwrap());
        }
        names.sort();
        assert_eq!(
            names,
            ["excluded", "live", "live", "queue", "standby", "standby"]
        );
    }

    #[tokio::test]
    async fn switching_day_replaces_listeners() {
        let (view, _rx) = view(1);
        view.watch_day("2024-01-01");
        view.watch_day("2024-01-02");

        assert_eq!(view.active_listeners(), 4);
        assert!(!view.is_watching("2024-01-01", "queue"));
        assert!(view.is_watching("2024-01-02", "queue"));
        assert_eq!(view.date_key().as_deref(), Some("2024-01-02"));

        view.close();
        assert_eq!(view.active_listeners(), 0);
    }
}
