use serde::Serialize;
use uuid::Uuid;

use crate::{
    dao::models::{Identified, LiveMatchEntity, QueueEntryEntity, StandbyMatchEntity},
    dto::format_epoch_millis,
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
/// First event of a day stream, naming the view so the client can switch its date.
pub struct Handshake {
    pub view_id: Uuid,
    pub date_key: String,
    pub court_count: u32,
    /// Server time in RFC 3339.
    pub server_time: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

impl Handshake {
    pub fn new(view_id: Uuid, date_key: &str, court_count: u32, now_ms: i64, degraded: bool) -> Self {
        Self {
            view_id,
            date_key: date_key.to_owned(),
            court_count,
            server_time: format_epoch_millis(now_ms),
            degraded,
        }
    }
}

#[derive(Debug, Serialize)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub date_key: String,
    pub entries: Vec<Identified<QueueEntryEntity>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedSnapshot {
    pub date_key: String,
    pub player_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
/// Live slot of one court; `live` is `null` when the court is free.
pub struct CourtLiveSnapshot {
    pub date_key: String,
    pub court_id: String,
    pub live: Option<LiveMatchEntity>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandbySnapshot {
    pub date_key: String,
    pub court_id: String,
    pub matches: Vec<Identified<StandbyMatchEntity>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
/// A listener could not read its documents.
pub struct ListenerError {
    pub date_key: String,
    pub scope: String,
    pub message: String,
}
