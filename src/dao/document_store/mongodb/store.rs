use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{Document as BsonDocument, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        PARENT_KEY, field_key, fields_to_bson, from_record, insert_keys, json_to_bson, key_filter,
        to_record,
    },
};
use crate::dao::{
    clock::{SharedClock, SystemClock},
    document::{CollectionPath, DocPath, Document, Fields, Query, SetOptions},
    document_store::DocumentStore,
    feed::{ChangeFeed, ChangeKind, DocumentChange},
    storage::StorageResult,
    timestamp::resolve_server_timestamps,
};

const DOCUMENT_COLLECTION_NAME: &str = "documents";
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct MongoDocumentStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
    feed: ChangeFeed,
    clock: SharedClock,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoDocumentStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        Self::connect_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Same as [`MongoDocumentStore::connect`] with an explicit clock for server timestamps.
    pub async fn connect_with_clock(config: MongoConfig, clock: SharedClock) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
            feed: ChangeFeed::default(),
            clock,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! { PARENT_KEY: 1 })
            .options(
                IndexOptions::builder()
                    .name(Some("document_parent_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: DOCUMENT_COLLECTION_NAME,
                index: PARENT_KEY,
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<BsonDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<BsonDocument>(DOCUMENT_COLLECTION_NAME)
    }

    fn resolved(&self, mut fields: Fields) -> Fields {
        resolve_server_timestamps(&mut fields, self.inner.clock.now_ms());
        fields
    }

    async fn get(&self, path: &DocPath) -> MongoResult<Option<Document>> {
        let record = self
            .collection()
            .await
            .find_one(key_filter(path))
            .await
            .map_err(|source| MongoDaoError::Read {
                key: path.key(),
                source,
            })?;
        record.map(from_record).transpose()
    }

    async fn set(&self, path: DocPath, fields: Fields, options: SetOptions) -> MongoResult<()> {
        let fields = self.resolved(fields);
        let collection = self.collection().await;

        let outcome = if options.merge {
            let mut update = doc! { "$setOnInsert": insert_keys(&path) };
            if !fields.is_empty() {
                update.insert("$set", dotted_fields(&fields));
            }
            collection
                .update_one(key_filter(&path), update)
                .upsert(true)
                .await
                .map(|_| ())
        } else {
            collection
                .replace_one(key_filter(&path), to_record(&path, &fields))
                .upsert(true)
                .await
                .map(|_| ())
        };

        outcome.map_err(|source| MongoDaoError::Write {
            key: path.key(),
            source,
        })?;
        self.inner.feed.publish(path, ChangeKind::Upserted);
        Ok(())
    }

    async fn update(&self, path: DocPath, fields: Fields) -> MongoResult<bool> {
        let fields = self.resolved(fields);
        // no upsert: a missing record matches nothing and stays missing
        let mut update = doc! { "$setOnInsert": insert_keys(&path) };
        if !fields.is_empty() {
            update.insert("$set", dotted_fields(&fields));
        }

        let result = self
            .collection()
            .await
            .update_one(key_filter(&path), update)
            .await
            .map_err(|source| MongoDaoError::Write {
                key: path.key(),
                source,
            })?;
        let updated = result.matched_count > 0;
        if updated {
            self.inner.feed.publish(path, ChangeKind::Upserted);
        }
        Ok(updated)
    }

    async fn create(&self, path: DocPath, fields: Fields) -> MongoResult<bool> {
        let fields = self.resolved(fields);
        match self
            .collection()
            .await
            .insert_one(to_record(&path, &fields))
            .await
        {
            Ok(_) => {
                self.inner.feed.publish(path, ChangeKind::Upserted);
                Ok(true)
            }
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::Write {
                key: path.key(),
                source,
            }),
        }
    }

    async fn take(&self, path: DocPath) -> MongoResult<Option<Document>> {
        let record = self
            .collection()
            .await
            .find_one_and_delete(key_filter(&path))
            .await
            .map_err(|source| MongoDaoError::Write {
                key: path.key(),
                source,
            })?;

        match record {
            Some(record) => {
                self.inner.feed.publish(path, ChangeKind::Deleted);
                from_record(record).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, path: DocPath) -> MongoResult<bool> {
        let result = self
            .collection()
            .await
            .delete_one(key_filter(&path))
            .await
            .map_err(|source| MongoDaoError::Write {
                key: path.key(),
                source,
            })?;
        let deleted = result.deleted_count > 0;
        if deleted {
            self.inner.feed.publish(path, ChangeKind::Deleted);
        }
        Ok(deleted)
    }

    async fn increment(
        &self,
        path: DocPath,
        deltas: Vec<(String, i64)>,
        fields: Fields,
    ) -> MongoResult<()> {
        let fields = self.resolved(fields);

        let mut inc = BsonDocument::new();
        for (field, delta) in &deltas {
            inc.insert(field_key(field), *delta);
        }

        let mut update = doc! { "$setOnInsert": insert_keys(&path) };
        if !inc.is_empty() {
            update.insert("$inc", inc);
        }
        if !fields.is_empty() {
            update.insert("$set", dotted_fields(&fields));
        }

        self.collection()
            .await
            .update_one(key_filter(&path), update)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                key: path.key(),
                source,
            })?;

        self.inner.feed.publish(path, ChangeKind::Upserted);
        Ok(())
    }

    async fn query(&self, query: &Query) -> MongoResult<Vec<Document>> {
        let mut filter = doc! { PARENT_KEY: query.collection.as_str() };
        for clause in &query.filters {
            filter.insert(field_key(&clause.field), json_to_bson(&clause.value));
        }

        let records: Vec<BsonDocument> = self
            .collection()
            .await
            .find(filter)
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: query.collection.to_string(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: query.collection.to_string(),
                source,
            })?;

        let documents = records
            .into_iter()
            .map(from_record)
            .collect::<MongoResult<Vec<_>>>()?;
        Ok(query.apply(documents))
    }
}

/// `$set` payload addressing each top-level field inside the record.
fn dotted_fields(fields: &Fields) -> BsonDocument {
    let nested = fields_to_bson(fields);
    let mut dotted = BsonDocument::new();
    for (key, value) in nested {
        dotted.insert(field_key(&key), value);
    }
    dotted
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE
    )
}

impl DocumentStore for MongoDocumentStore {
    fn get(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        let store = self.clone();
        Box::pin(async move { store.get(&path).await.map_err(Into::into) })
    }

    fn set(
        &self,
        path: DocPath,
        fields: Fields,
        options: SetOptions,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.set(path, fields, options).await.map_err(Into::into) })
    }

    fn update(&self, path: DocPath, fields: Fields) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.update(path, fields).await.map_err(Into::into) })
    }

    fn create(&self, path: DocPath, fields: Fields) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.create(path, fields).await.map_err(Into::into) })
    }

    fn add(
        &self,
        collection: CollectionPath,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<String>> {
        let store = self.clone();
        Box::pin(async move {
            let id = Uuid::new_v4().simple().to_string();
            store
                .set(collection.doc(id.clone()), fields, SetOptions::replace())
                .await?;
            Ok(id)
        })
    }

    fn delete(&self, path: DocPath) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete(path).await.map_err(Into::into) })
    }

    fn take(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        let store = self.clone();
        Box::pin(async move { store.take(path).await.map_err(Into::into) })
    }

    fn increment(
        &self,
        path: DocPath,
        deltas: Vec<(String, i64)>,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .increment(path, deltas, fields)
                .await
                .map_err(Into::into)
        })
    }

    fn query(&self, query: Query) -> BoxFuture<'static, StorageResult<Vec<Document>>> {
        let store = self.clone();
        Box::pin(async move { store.query(&query).await.map_err(Into::into) })
    }

    fn changes(&self) -> broadcast::Receiver<DocumentChange> {
        self.inner.feed.subscribe()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
