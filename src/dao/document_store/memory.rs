//! In-process document store used by default and throughout the tests.

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{DocumentStore, apply_deltas, merge_fields};
use crate::dao::{
    clock::SharedClock,
    document::{CollectionPath, DocPath, Document, Fields, Query, SetOptions},
    feed::{ChangeFeed, ChangeKind, DocumentChange},
    storage::{StorageError, StorageResult},
    timestamp::resolve_server_timestamps,
};

/// Failures of the in-memory backend.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    /// The store was switched offline.
    #[error("in-memory store is offline")]
    Offline,
}

impl From<MemoryStoreError> for StorageError {
    fn from(err: MemoryStoreError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

/// Document store keeping every collection in a concurrent map.
///
/// Each operation locks a single collection shard, which makes `create`,
/// `take` and `increment` atomic with respect to each other.
#[derive(Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    collections: DashMap<CollectionPath, BTreeMap<String, Fields>>,
    feed: ChangeFeed,
    clock: SharedClock,
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    /// Empty store resolving server timestamps with `clock`.
    pub fn new(clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                collections: DashMap::new(),
                feed: ChangeFeed::default(),
                clock,
                offline: AtomicBool::new(false),
            }),
        }
    }

    /// Make every subsequent operation fail as if the backend were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }
}

impl MemoryInner {
    fn ensure_online(&self) -> Result<(), MemoryStoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(MemoryStoreError::Offline)
        } else {
            Ok(())
        }
    }

    fn resolved(&self, mut fields: Fields) -> Fields {
        resolve_server_timestamps(&mut fields, self.clock.now_ms());
        fields
    }

    fn get(&self, path: &DocPath) -> Result<Option<Document>, MemoryStoreError> {
        self.ensure_online()?;
        Ok(self.collections.get(path.collection()).and_then(|docs| {
            docs.get(path.id())
                .map(|fields| Document::new(path.clone(), fields.clone()))
        }))
    }

    fn set(&self, path: DocPath, fields: Fields, options: SetOptions) -> Result<(), MemoryStoreError> {
        self.ensure_online()?;
        let fields = self.resolved(fields);
        {
            let mut docs = self.collections.entry(path.collection().clone()).or_default();
            let doc = docs.entry(path.id().to_owned()).or_default();
            if options.merge {
                merge_fields(doc, fields);
            } else {
                *doc = fields;
            }
        }
        self.feed.publish(path, ChangeKind::Upserted);
        Ok(())
    }

    fn update(&self, path: DocPath, fields: Fields) -> Result<bool, MemoryStoreError> {
        self.ensure_online()?;
        let fields = self.resolved(fields);
        let updated = self
            .collections
            .get_mut(path.collection())
            .and_then(|mut docs| {
                docs.get_mut(path.id()).map(|doc| merge_fields(doc, fields))
            })
            .is_some();
        if updated {
            self.feed.publish(path, ChangeKind::Upserted);
        }
        Ok(updated)
    }

    fn create(&self, path: DocPath, fields: Fields) -> Result<bool, MemoryStoreError> {
        self.ensure_online()?;
        let fields = self.resolved(fields);
        let created = {
            let mut docs = self.collections.entry(path.collection().clone()).or_default();
            if docs.contains_key(path.id()) {
                false
            } else {
                docs.insert(path.id().to_owned(), fields);
                true
            }
        };
        if created {
            self.feed.publish(path, ChangeKind::Upserted);
        }
        Ok(created)
    }

    fn take(&self, path: DocPath) -> Result<Option<Document>, MemoryStoreError> {
        self.ensure_online()?;
        let removed = self
            .collections
            .get_mut(path.collection())
            .and_then(|mut docs| docs.remove(path.id()));
        Ok(removed.map(|fields| {
            self.feed.publish(path.clone(), ChangeKind::Deleted);
            Document::new(path, fields)
        }))
    }

    fn increment(
        &self,
        path: DocPath,
        deltas: Vec<(String, i64)>,
        fields: Fields,
    ) -> Result<(), MemoryStoreError> {
        self.ensure_online()?;
        let fields = self.resolved(fields);
        {
            let mut docs = self.collections.entry(path.collection().clone()).or_default();
            let doc = docs.entry(path.id().to_owned()).or_default();
            apply_deltas(doc, &deltas);
            merge_fields(doc, fields);
        }
        self.feed.publish(path, ChangeKind::Upserted);
        Ok(())
    }

    fn query(&self, query: &Query) -> Result<Vec<Document>, MemoryStoreError> {
        self.ensure_online()?;
        let documents = self
            .collections
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(query.collection.doc(id.clone()), fields.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(query.apply(documents))
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        let store = self.clone();
        Box::pin(async move { store.inner.get(&path).map_err(Into::into) })
    }

    fn set(
        &self,
        path: DocPath,
        fields: Fields,
        options: SetOptions,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.set(path, fields, options).map_err(Into::into) })
    }

    fn update(&self, path: DocPath, fields: Fields) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.inner.update(path, fields).map_err(Into::into) })
    }

    fn create(&self, path: DocPath, fields: Fields) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.inner.create(path, fields).map_err(Into::into) })
    }

    fn add(
        &self,
        collection: CollectionPath,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<String>> {
        let store = self.clone();
        Box::pin(async move {
            let id = Uuid::new_v4().simple().to_string();
            store.inner.set(collection.doc(id.clone()), fields, SetOptions::replace())?;
            Ok(id)
        })
    }

    fn delete(&self, path: DocPath) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.take(path)?.is_some()) })
    }

    fn take(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        let store = self.clone();
        Box::pin(async move { store.inner.take(path).map_err(Into::into) })
    }

    fn increment(
        &self,
        path: DocPath,
        deltas: Vec<(String, i64)>,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.increment(path, deltas, fields).map_err(Into::into) })
    }

    fn query(&self, query: Query) -> BoxFuture<'static, StorageResult<Vec<Document>>> {
        let store = self.clone();
        Box::pin(async move { store.inner.query(&query).map_err(Into::into) })
    }

    fn changes(&self) -> broadcast::Receiver<DocumentChange> {
        self.inner.feed.subscribe()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ensure_online().map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ensure_online().map_err(Into::into) })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dao::clock::ManualClock;

    fn store() -> MemoryDocumentStore {
        MemoryDocumentStore::new(Arc::new(ManualClock::new(10_000)))
    }

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn path(id: &str) -> DocPath {
        CollectionPath::root("things").doc(id)
    }

    #[tokio::test]
    async fn merge_keeps_unspecified_fields() {
        let store = store();
        store
            .set(path("a"), fields(json!({"x": 1, "y": 2})), SetOptions::replace())
            .await
            .unwrap();
        store
            .set(path("a"), fields(json!({"y": 3})), SetOptions::merge())
            .await
            .unwrap();

        let doc = store.get(path("a")).await.unwrap().unwrap();
        assert_eq!(doc.fields, fields(json!({"x": 1, "y": 3})));
    }

    #[tokio::test]
    async fn create_refuses_existing_documents() {
        let store = store();
        assert!(store.create(path("a"), fields(json!({"v": 1}))).await.unwrap());
        assert!(!store.create(path("a"), fields(json!({"v": 2}))).await.unwrap());
        let doc = store.get(path("a")).await.unwrap().unwrap();
        assert_eq!(doc.fields["v"], json!(1));
    }

    #[tokio::test]
    async fn update_only_touches_existing_documents() {
        let store = store();
        assert!(!store.update(path("a"), fields(json!({"y": 1}))).await.unwrap());
        assert!(store.get(path("a")).await.unwrap().is_none());

        store
            .set(path("a"), fields(json!({"x": 1})), SetOptions::replace())
            .await
            .unwrap();
        assert!(store.update(path("a"), fields(json!({"y": 2}))).await.unwrap());
        let doc = store.get(path("a")).await.unwrap().unwrap();
        assert_eq!(doc.fields, fields(json!({"x": 1, "y": 2})));
    }

    #[tokio::test]
    async fn take_returns_contents_once() {
        let store = store();
        store
            .set(path("a"), fields(json!({"v": 1})), SetOptions::replace())
            .await
            .unwrap();
        assert!(store.take(path("a")).await.unwrap().is_some());
        assert!(store.take(path("a")).await.unwrap().is_none());
        assert!(!store.delete(path("a")).await.unwrap());
    }

    #[tokio::test]
    async fn increment_creates_and_accumulates() {
        let store = store();
        let deltas = vec![("games".to_string(), 1), ("playTimeMsTotal".to_string(), 500)];
        store
            .increment(path("p"), deltas.clone(), Fields::new())
            .await
            .unwrap();
        store.increment(path("p"), deltas, Fields::new()).await.unwrap();

        let doc = store.get(path("p")).await.unwrap().unwrap();
        assert_eq!(doc.fields["games"], json!(2));
        assert_eq!(doc.fields["playTimeMsTotal"], json!(1_000));
    }

    #[tokio::test]
    async fn writes_resolve_server_timestamps_with_clock() {
        let store = store();
        store
            .set(
                path("a"),
                fields(json!({"at": {"$serverTimestamp": true}})),
                SetOptions::replace(),
            )
            .await
            .unwrap();
        let doc = store.get(path("a")).await.unwrap().unwrap();
        assert_eq!(doc.fields["at"], json!({"seconds": 10, "nanoseconds": 0}));
    }

    #[tokio::test]
    async fn writes_are_published() {
        let store = store();
        let mut changes = store.changes();
        let id = store
            .add(CollectionPath::root("things"), fields(json!({"v": 1})))
            .await
            .unwrap();
        let change = changes.recv().await.unwrap();
        assert_eq!(change.path.id(), id);
        assert_eq!(change.kind, ChangeKind::Upserted);
    }

    #[tokio::test]
    async fn offline_store_fails_every_operation() {
        let store = store();
        store.set_offline(true);
        assert!(store.get(path("a")).await.is_err());
        assert!(store.health_check().await.is_err());
        store.set_offline(false);
        assert!(store.health_check().await.is_ok());
    }
}
