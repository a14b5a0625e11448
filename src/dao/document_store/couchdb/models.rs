//! Wire shapes exchanged with CouchDB.
//!
//! Each document is stored under its full path as
//! `{ _id, _rev, parent, docId, fields }` so collections can be listed with a
//! Mango selector on `parent`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::dao::document::{CollectionPath, DocPath, Document, Fields, Query};

/// Mango returns 25 documents unless told otherwise.
pub const FIND_LIMIT: u32 = 10_000;
pub const PARENT_INDEX_NAME: &str = "document-parent-idx";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub parent: String,
    #[serde(rename = "docId")]
    pub doc_id: String,
    #[serde(default)]
    pub fields: Fields,
}

impl CouchRecord {
    pub fn new(path: &DocPath, fields: Fields, rev: Option<String>) -> Self {
        Self {
            id: path.key(),
            rev,
            parent: path.collection().as_str().to_owned(),
            doc_id: path.id().to_owned(),
            fields,
        }
    }

    pub fn into_document(self) -> Document {
        Document::new(CollectionPath::root(self.parent).doc(self.doc_id), self.fields)
    }
}

#[derive(Debug, Deserialize)]
pub struct FindResponse {
    pub docs: Vec<CouchRecord>,
}

/// Mango request selecting the children of the queried collection.
pub fn find_request(query: &Query) -> Value {
    let mut selector = serde_json::Map::new();
    selector.insert("parent".into(), Value::from(query.collection.as_str()));
    for filter in &query.filters {
        selector.insert(format!("fields.{}", filter.field), filter.value.clone());
    }
    json!({ "selector": selector, "limit": FIND_LIMIT })
}

pub fn parent_index_request() -> Value {
    json!({
        "index": { "fields": ["parent"] },
        "name": PARENT_INDEX_NAME,
        "type": "json",
    })
}
