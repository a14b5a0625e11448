#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;
#[cfg(test)]
pub(crate) mod testing;

use futures::future::BoxFuture;
use tokio::sync::broadcast;

use crate::dao::{
    document::{CollectionPath, DocPath, Document, Fields, Query, SetOptions},
    feed::DocumentChange,
    storage::StorageResult,
};

/// Abstraction over the document database holding a club's daily state.
///
/// Every write resolves pending server timestamps with the backend clock and
/// publishes a [`DocumentChange`] on [`DocumentStore::changes`].
pub trait DocumentStore: Send + Sync {
    /// Read one document.
    fn get(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<Document>>>;
    /// Write a document, replacing it or merging the given top-level fields.
    fn set(
        &self,
        path: DocPath,
        fields: Fields,
        options: SetOptions,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Merge `fields` into an existing document; writes nothing and returns
    /// `false` when the document is absent.
    fn update(&self, path: DocPath, fields: Fields) -> BoxFuture<'static, StorageResult<bool>>;
    /// Write a document only if none exists at `path`; returns whether it was written.
    fn create(&self, path: DocPath, fields: Fields) -> BoxFuture<'static, StorageResult<bool>>;
    /// Insert a document under a generated id and return that id.
    fn add(&self, collection: CollectionPath, fields: Fields)
    -> BoxFuture<'static, StorageResult<String>>;
    /// Delete a document; returns whether one existed.
    fn delete(&self, path: DocPath) -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete a document and return its last contents, if any.
    fn take(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<Document>>>;
    /// Atomically add `deltas` to numeric fields (missing fields count as zero)
    /// and merge `fields`, creating the document when absent.
    fn increment(
        &self,
        path: DocPath,
        deltas: Vec<(String, i64)>,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Run a query over the direct children of a collection.
    fn query(&self, query: Query) -> BoxFuture<'static, StorageResult<Vec<Document>>>;
    /// Subscribe to the stream of document changes.
    fn changes(&self) -> broadcast::Receiver<DocumentChange>;
    /// Probe the backend; an error means it is unreachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Merge `incoming` into `existing` top-level fields.
pub(crate) fn merge_fields(existing: &mut Fields, incoming: Fields) {
    for (key, value) in incoming {
        existing.insert(key, value);
    }
}

/// Apply numeric deltas in place, treating missing or non-numeric fields as zero.
pub(crate) fn apply_deltas(fields: &mut Fields, deltas: &[(String, i64)]) {
    for (field, delta) in deltas {
        let current = fields.get(field).and_then(|value| value.as_i64()).unwrap_or(0);
        fields.insert(field.clone(), (current + delta).into());
    }
}
