//! Mapping between path-addressed documents and the MongoDB records holding them.
//!
//! Every document lives in one collection as
//! `{ _id: <full path>, parent: <collection path>, docId: <id>, fields: {...} }`.

use mongodb::bson::{Bson, Document as BsonDocument, doc};
use serde_json::{Map, Number, Value};

use super::error::{MongoDaoError, MongoResult};
use crate::dao::document::{CollectionPath, DocPath, Document, Fields};

pub const PARENT_KEY: &str = "parent";
pub const DOC_ID_KEY: &str = "docId";
pub const FIELDS_KEY: &str = "fields";

/// Filter selecting a document by its full path.
pub fn key_filter(path: &DocPath) -> BsonDocument {
    doc! { "_id": path.key() }
}

/// Full record for inserts and replacements.
pub fn to_record(path: &DocPath, fields: &Fields) -> BsonDocument {
    doc! {
        "_id": path.key(),
        PARENT_KEY: path.collection().as_str(),
        DOC_ID_KEY: path.id(),
        FIELDS_KEY: fields_to_bson(fields),
    }
}

/// Keys written only when an upsert creates the record.
pub fn insert_keys(path: &DocPath) -> BsonDocument {
    doc! {
        PARENT_KEY: path.collection().as_str(),
        DOC_ID_KEY: path.id(),
    }
}

/// Dotted key addressing one document field inside the record.
pub fn field_key(field: &str) -> String {
    format!("{FIELDS_KEY}.{field}")
}

/// Rebuild a document from its stored record.
pub fn from_record(record: BsonDocument) -> MongoResult<Document> {
    let key = match record.get("_id") {
        Some(Bson::String(key)) => key.clone(),
        _ => String::from("<unknown>"),
    };
    let parent = match record.get(PARENT_KEY) {
        Some(Bson::String(parent)) => parent.clone(),
        _ => {
            return Err(MongoDaoError::MalformedRecord {
                key,
                field: PARENT_KEY,
            });
        }
    };
    let id = match record.get(DOC_ID_KEY) {
        Some(Bson::String(id)) => id.clone(),
        _ => {
            return Err(MongoDaoError::MalformedRecord {
                key,
                field: DOC_ID_KEY,
            });
        }
    };
    let fields = match record.get(FIELDS_KEY) {
        Some(Bson::Document(fields)) => bson_document_to_fields(fields.clone()),
        _ => Map::new(),
    };

    Ok(Document::new(CollectionPath::root(parent).doc(id), fields))
}

pub fn fields_to_bson(fields: &Fields) -> BsonDocument {
    let mut document = BsonDocument::new();
    for (key, value) in fields {
        document.insert(key.clone(), json_to_bson(value));
    }
    document
}

pub fn json_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(flag) => Bson::Boolean(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(int) => Bson::Int64(int),
            None => Bson::Double(number.as_f64().unwrap_or_default()),
        },
        Value::String(text) => Bson::String(text.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        Value::Object(map) => Bson::Document(fields_to_bson(map)),
    }
}

fn bson_document_to_fields(document: BsonDocument) -> Fields {
    document
        .into_iter()
        .map(|(key, value)| (key, bson_to_json(value)))
        .collect()
}

fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::Null => Value::Null,
        Bson::Boolean(flag) => Value::Bool(flag),
        Bson::Int32(int) => Value::from(int),
        Bson::Int64(int) => Value::from(int),
        Bson::Double(float) => Number::from_f64(float)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(text) => Value::String(text),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Document(document) => Value::Object(bson_document_to_fields(document)),
        other => Value::String(other.to_string()),
    }
}
