use tokio::sync::broadcast;

use super::document::DocPath;

/// What happened to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Upserted,
    Deleted,
}

/// Notification emitted after every successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChange {
    pub path: DocPath,
    pub kind: ChangeKind,
}

/// Broadcast hub fanning out document changes to realtime subscribers.
pub struct ChangeFeed {
    sender: broadcast::Sender<DocumentChange>,
}

impl ChangeFeed {
    /// Construct a new feed backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent changes.
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentChange> {
        self.sender.subscribe()
    }

    /// Publish a change to all current subscribers, ignoring delivery errors.
    pub fn publish(&self, path: DocPath, kind: ChangeKind) {
        let _ = self.sender.send(DocumentChange { path, kind });
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}
