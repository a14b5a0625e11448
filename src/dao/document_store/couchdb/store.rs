use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{CouchRecord, FindResponse, find_request, parent_index_request},
};
use crate::dao::{
    clock::{SharedClock, SystemClock},
    document::{CollectionPath, DocPath, Document, Fields, Query, SetOptions},
    document_store::{DocumentStore, apply_deltas, merge_fields},
    feed::{ChangeFeed, ChangeKind, DocumentChange},
    storage::StorageResult,
    timestamp::resolve_server_timestamps,
};

const WRITE_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct CouchDocumentStore {
    client: Client,
    database_url: Arc<Url>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    feed: Arc<ChangeFeed>,
    clock: SharedClock,
}

/// Outcome of a conditional document write.
enum PutOutcome {
    Written,
    Conflict,
}

impl CouchDocumentStore {
    /// Connect to CouchDB, creating the database and its index when missing.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        Self::connect_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Same as [`CouchDocumentStore::connect`] with an explicit clock for server timestamps.
    pub async fn connect_with_clock(config: CouchConfig, clock: SharedClock) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let database_url = database_url(&config.base_url, &config.database)?;
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            database_url: Arc::new(database_url),
            database: Arc::from(config.database),
            auth,
            feed: Arc::new(ChangeFeed::default()),
            clock,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn url(&self, segment: &str) -> Url {
        let mut url = (*self.database_url).clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(segment);
        }
        url
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.authorize(self.client.request(method, url))
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> CouchResult<reqwest::Response> {
        builder
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.to_owned(),
                source,
            })
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = (*self.database_url).clone();

        let response = self
            .send(self.request(Method::GET, url.clone()), &database)
            .await?;
        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                let create = self.send(self.request(Method::PUT, url), &database).await?;
                // 412 means another instance created it first.
                if !create.status().is_success()
                    && create.status() != StatusCode::PRECONDITION_FAILED
                {
                    return Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    });
                }
            }
            other => {
                return Err(CouchDaoError::DatabaseStatus {
                    database,
                    status: other,
                });
            }
        }

        let response = self
            .send(
                self.request(Method::POST, self.url("_index"))
                    .json(&parent_index_request()),
                "_index",
            )
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::DatabaseStatus {
                database,
                status: response.status(),
            })
        }
    }

    fn resolved(&self, mut fields: Fields) -> Fields {
        resolve_server_timestamps(&mut fields, self.clock.now_ms());
        fields
    }

    async fn get_record(&self, path: &DocPath) -> CouchResult<Option<CouchRecord>> {
        let key = path.key();
        let response = self
            .send(self.request(Method::GET, self.url(&key)), &key)
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<CouchRecord>()
                .await
                .map(Some)
                .map_err(|source| CouchDaoError::DecodeResponse { path: key, source }),
            other => Err(CouchDaoError::RequestStatus {
                path: key,
                status: other,
            }),
        }
    }

    async fn put_record(&self, record: &CouchRecord) -> CouchResult<PutOutcome> {
        let response = self
            .send(
                self.request(Method::PUT, self.url(&record.id)).json(record),
                &record.id,
            )
            .await?;

        match response.status() {
            StatusCode::CONFLICT => Ok(PutOutcome::Conflict),
            status if status.is_success() => Ok(PutOutcome::Written),
            other => Err(CouchDaoError::RequestStatus {
                path: record.id.clone(),
                status: other,
            }),
        }
    }

    /// Read-modify-write loop retried on revision conflicts. `apply` returning
    /// `None` skips the write; the result tells whether a revision was stored.
    async fn modify<F>(&self, path: &DocPath, mut apply: F) -> CouchResult<bool>
    where
        F: FnMut(Option<Fields>) -> Option<Fields>,
    {
        for _ in 0..WRITE_ATTEMPTS {
            let existing = self.get_record(path).await?;
            let (current, rev) = match existing {
                Some(record) => (Some(record.fields), record.rev),
                None => (None, None),
            };
            let Some(fields) = apply(current) else {
                return Ok(false);
            };
            let record = CouchRecord::new(path, fields, rev);
            if let PutOutcome::Written = self.put_record(&record).await? {
                self.feed.publish(path.clone(), ChangeKind::Upserted);
                return Ok(true);
            }
        }
        Err(CouchDaoError::Conflict {
            path: path.key(),
            attempts: WRITE_ATTEMPTS,
        })
    }

    async fn set(&self, path: DocPath, fields: Fields, options: SetOptions) -> CouchResult<()> {
        let fields = self.resolved(fields);
        self.modify(&path, |current| match (options.merge, current) {
            (true, Some(mut current)) => {
                merge_fields(&mut current, fields.clone());
                Some(current)
            }
            _ => Some(fields.clone()),
        })
        .await
        .map(|_| ())
    }

    async fn update(&self, path: DocPath, fields: Fields) -> CouchResult<bool> {
        let fields = self.resolved(fields);
        self.modify(&path, |current| {
            current.map(|mut current| {
                merge_fields(&mut current, fields.clone());
                current
            })
        })
        .await
    }

    async fn create(&self, path: DocPath, fields: Fields) -> CouchResult<bool> {
        let record = CouchRecord::new(&path, self.resolved(fields), None);
        match self.put_record(&record).await? {
            PutOutcome::Written => {
                self.feed.publish(path, ChangeKind::Upserted);
                Ok(true)
            }
            PutOutcome::Conflict => Ok(false),
        }
    }

    async fn increment(
        &self,
        path: DocPath,
        deltas: Vec<(String, i64)>,
        fields: Fields,
    ) -> CouchResult<()> {
        let fields = self.resolved(fields);
        self.modify(&path, |current| {
            let mut current = current.unwrap_or_default();
            apply_deltas(&mut current, &deltas);
            merge_fields(&mut current, fields.clone());
            Some(current)
        })
        .await
        .map(|_| ())
    }

    async fn take(&self, path: DocPath) -> CouchResult<Option<Document>> {
        let key = path.key();
        for _ in 0..WRITE_ATTEMPTS {
            let Some(record) = self.get_record(&path).await? else {
                return Ok(None);
            };
            let rev = record.rev.clone().unwrap_or_default();
            let response = self
                .send(
                    self.request(Method::DELETE, self.url(&key))
                        .query(&[("rev", rev)]),
                    &key,
                )
                .await?;

            match response.status() {
                StatusCode::CONFLICT => continue,
                StatusCode::NOT_FOUND => return Ok(None),
                status if status.is_success() => {
                    self.feed.publish(path, ChangeKind::Deleted);
                    return Ok(Some(record.into_document()));
                }
                other => {
                    return Err(CouchDaoError::RequestStatus {
                        path: key,
                        status: other,
                    });
                }
            }
        }
        Err(CouchDaoError::Conflict {
            path: key,
            attempts: WRITE_ATTEMPTS,
        })
    }

    async fn query(&self, query: &Query) -> CouchResult<Vec<Document>> {
        const FIND: &str = "_find";
        let response = self
            .send(
                self.request(Method::POST, self.url(FIND))
                    .json(&find_request(query)),
                FIND,
            )
            .await?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: FIND.to_owned(),
                status: response.status(),
            });
        }

        let payload = response
            .json::<FindResponse>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: FIND.to_owned(),
                source,
            })?;

        let documents = payload
            .docs
            .into_iter()
            .map(CouchRecord::into_document)
            .collect();
        Ok(query.apply(documents))
    }

    async fn ping(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let response = self
            .send(
                self.request(Method::GET, (*self.database_url).clone()),
                &database,
            )
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::DatabaseStatus {
                database,
                status: response.status(),
            })
        }
    }
}

fn database_url(base_url: &str, database: &str) -> CouchResult<Url> {
    let invalid = |reason: String| CouchDaoError::InvalidBaseUrl {
        url: base_url.to_owned(),
        reason,
    };
    let mut url = Url::parse(base_url.trim_end_matches('/')).map_err(|err| invalid(err.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("URL cannot carry a path".to_owned()))?
        .pop_if_empty()
        .push(database);
    Ok(url)
}

impl DocumentStore for CouchDocumentStore {
    fn get(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        let store = self.clone();
        Box::pin(async move {
            let record = store.get_record(&path).await?;
            Ok(record.map(CouchRecord::into_document))
        })
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
            store.create(collection.doc(id.clone()), fields).await?;
            Ok(id)
        })
    }

    fn delete(&self, path: DocPath) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.take(path).await?.is_some()) })
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
        self.feed.subscribe()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
