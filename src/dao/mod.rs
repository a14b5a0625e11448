/// Clock abstraction for server timestamps.
pub mod clock;
/// Path-addressed documents, queries and their encoding.
pub mod document;
/// Storage backends implementing the document store contract.
pub mod document_store;
/// Change notifications emitted after writes.
pub mod feed;
/// Persisted document models.
pub mod models;
/// Document layout of a club day.
pub mod paths;
/// Storage error types shared by every backend.
pub mod storage;
/// Realtime listeners and their registry.
pub mod subscription;
/// Timestamp representations and elapsed-time helpers.
pub mod timestamp;
