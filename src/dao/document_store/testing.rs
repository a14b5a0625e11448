//! Store wrappers that reproduce interleavings of concurrent requests.

use futures::future::BoxFuture;
use tokio::sync::broadcast;

use super::{DocumentStore, memory::MemoryDocumentStore};
use crate::dao::{
    document::{CollectionPath, DocPath, Document, Fields, Query, SetOptions},
    feed::DocumentChange,
    storage::StorageResult,
};
use crate::dao::{clock::ManualClock, models::Player};
use crate::services::queue_service;
use crate::state::DayContext;

/// When documents disappear under a [`VanishingStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Vanish {
    /// Right after `get` hands a document out.
    AfterRead,
    /// Just before `take` would claim it.
    BeforeTake,
}

/// Memory store where another request always removes a document first.
pub struct VanishingStore {
    inner: MemoryDocumentStore,
    vanish: Vanish,
}

impl VanishingStore {
    /// Every document read is deleted before the reader can write it back.
    pub fn new(inner: MemoryDocumentStore) -> Self {
        Self {
            inner,
            vanish: Vanish::AfterRead,
        }
    }

    /// Every `take` finds its document already gone.
    pub fn before_take(inner: MemoryDocumentStore) -> Self {
        Self {
            inner,
            vanish: Vanish::BeforeTake,
        }
    }
}

impl DocumentStore for VanishingStore {
    fn get(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        if self.vanish != Vanish::AfterRead {
            return self.inner.get(path);
        }
        let inner = self.inner.clone();
        Box::pin(async move {
            let document = inner.get(path.clone()).await?;
            inner.delete(path).await?;
            Ok(document)
        })
    }

    fn set(
        &self,
        path: DocPath,
        fields: Fields,
        options: SetOptions,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.set(path, fields, options)
    }

    fn update(&self, path: DocPath, fields: Fields) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.update(path, fields)
    }

    fn create(&self, path: DocPath, fields: Fields) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.create(path, fields)
    }

    fn add(
        &self,
        collection: CollectionPath,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<String>> {
        self.inner.add(collection, fields)
    }

    fn delete(&self, path: DocPath) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.delete(path)
    }

    fn take(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        if self.vanish != Vanish::BeforeTake {
            return self.inner.take(path);
        }
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.delete(path).await?;
            Ok(None)
        })
    }

    fn increment(
        &self,
        path: DocPath,
        deltas: Vec<(String, i64)>,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.increment(path, deltas, fields)
    }

    fn query(&self, query: Query) -> BoxFuture<'static, StorageResult<Vec<Document>>> {
        self.inner.query(query)
    }

    fn changes(&self) -> broadcast::Receiver<DocumentChange> {
        self.inner.changes()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}

pub(crate) async fn queue(ctx: &DayContext, clock: &ManualClock, ids: &[&str]) {
    for id in ids {
        queue_service::join(ctx, Player::new(*id, id.to_uppercase(), 1))
            .await
            .unwrap();
        clock.advance(1);
    }
}

pub(crate) fn seat_ids(team: &[Player; 2]) -> [&str; 2] {
    [team[0].id.as_str(), team[1].id.as_str()]
}
