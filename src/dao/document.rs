//! Path-addressed JSON documents and the queries run against them.

use std::{cmp::Ordering, fmt};

use serde::{Serialize, de::DeserializeOwned, ser::Error as _};
use serde_json::{Map, Value};

use super::{
    storage::{StorageError, StorageResult},
    timestamp::Timestamp,
};

/// Field map of a stored document.
pub type Fields = Map<String, Value>;

/// Slash-separated path of a collection, e.g. `dates/2024-01-01/queue`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Top-level collection.
    pub fn root(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Address a document inside this collection.
    pub fn doc(&self, id: impl Into<String>) -> DocPath {
        DocPath {
            collection: self.clone(),
            id: id.into(),
        }
    }

    /// Raw path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path of a single document: its parent collection plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    collection: CollectionPath,
    id: String,
}

impl DocPath {
    /// Parent collection.
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    /// Document id (last path segment).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Nested collection under this document.
    pub fn child(&self, name: &str) -> CollectionPath {
        CollectionPath(format!("{}/{}/{}", self.collection.0, self.id, name))
    }

    /// Full path string used as the backend key.
    pub fn key(&self) -> String {
        format!("{}/{}", self.collection.0, self.id)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocPath,
    pub fields: Fields,
}

impl Document {
    pub fn new(path: DocPath, fields: Fields) -> Self {
        Self { path, fields }
    }

    /// Document id (last path segment).
    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Deserialize the fields into a model.
    pub fn decode<T: DeserializeOwned>(&self) -> StorageResult<T> {
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|source| StorageError::malformed(self.path.key(), source))
    }
}

/// Serialize a model into a field map; the model must serialize to a JSON object.
///
/// `location` names the document or collection the fields are meant for.
pub fn encode<T: Serialize>(location: &impl fmt::Display, value: &T) -> StorageResult<Fields> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(StorageError::malformed(
            location.to_string(),
            serde_json::Error::custom(format!("expected an object, got {other}")),
        )),
        Err(source) => Err(StorageError::malformed(location.to_string(), source)),
    }
}

/// Options for a set operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Only overwrite the supplied top-level fields, keeping the others.
    pub merge: bool,
}

impl SetOptions {
    pub fn merge() -> Self {
        Self { merge: true }
    }

    pub fn replace() -> Self {
        Self { merge: false }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality filter on a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

/// Ordering clause on a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Query over the direct children of one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: CollectionPath,
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
}

impl Query {
    /// Every document of `collection`, ordered by id.
    pub fn new(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: Vec::new(),
        }
    }

    /// Keep documents whose `field` equals `value`.
    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Order by `field`; ties always fall back to the document id.
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Whether a document of this query's collection passes every filter.
    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters
            .iter()
            .all(|filter| fields.get(&filter.field) == Some(&filter.value))
    }

    /// Filter and order documents that were fetched from `self.collection`.
    pub fn apply(&self, documents: Vec<Document>) -> Vec<Document> {
        let mut documents: Vec<Document> = documents
            .into_iter()
            .filter(|doc| self.matches(&doc.fields))
            .collect();
        documents.sort_by(|a, b| self.compare(a, b));
        documents
    }

    fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for clause in &self.order_by {
            let ordering = compare_values(a.fields.get(&clause.field), b.fields.get(&clause.field));
            let ordering = match clause.direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.id().cmp(b.id())
    }
}

/// Total order over field values: missing, null, booleans, numbers and
/// timestamps (by milliseconds), strings, then anything else.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    rank(a).cmp(&rank(b)).then_with(|| match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => match (as_millis(x), as_millis(y)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        _ => Ordering::Equal,
    })
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Bool(_)) => 2,
        Some(value) if as_millis(value).is_some() => 3,
        Some(Value::String(_)) => 4,
        Some(_) => 5,
    }
}

/// Numbers and timestamp objects both order numerically; pending timestamps
/// sort after everything resolved.
fn as_millis(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::Object(_) => serde_json::from_value::<Timestamp>(value.clone())
            .ok()
            .map(|ts| match ts {
                Timestamp::Pending { .. } => f64::INFINITY,
                other => other.to_millis(0) as f64,
            }),
        _ => None,
    }
}
