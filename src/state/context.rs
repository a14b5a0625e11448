use std::sync::Arc;

use crate::dao::{clock::SharedClock, document_store::DocumentStore, paths::DayPaths};

/// Everything a core operation needs for one club day: the store handle, the
/// clock, and the tenant/day the paths resolve to.
#[derive(Clone)]
pub struct DayContext {
    store: Arc<dyn DocumentStore>,
    clock: SharedClock,
    group_id: Option<String>,
    paths: DayPaths,
}

impl DayContext {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: SharedClock,
        group_id: Option<String>,
        date_key: &str,
    ) -> Self {
        let paths = DayPaths::new(group_id.as_deref(), date_key);
        Self {
            store,
            clock,
            group_id,
            paths,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Current server time in epoch milliseconds.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn paths(&self) -> &DayPaths {
        &self.paths
    }

    pub fn date_key(&self) -> &str {
        self.paths.date_key()
    }

    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }
}
