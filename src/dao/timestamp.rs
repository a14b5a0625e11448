//! Timestamp values stored inside documents.
//!
//! A timestamp may be read back in three shapes: resolved
//! (`{seconds, nanoseconds}`), raw epoch milliseconds, or the pending
//! server-timestamp sentinel that backends replace with their own clock on
//! write. Elapsed-time computations go through [`Timestamp::to_millis`] so the
//! three shapes are handled uniformly.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::document::Fields;

/// Key marking a pending server timestamp inside a JSON object.
pub const SERVER_TIMESTAMP_KEY: &str = "$serverTimestamp";

/// Any timestamp representation that can appear in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Resolved server time.
    Resolved {
        seconds: i64,
        #[serde(default)]
        nanoseconds: u32,
    },
    /// Server time requested but not yet assigned.
    Pending {
        #[serde(rename = "$serverTimestamp")]
        server_timestamp: bool,
    },
    /// Raw milliseconds since the Unix epoch.
    Millis(i64),
}

impl Timestamp {
    /// Sentinel asking the backend to assign its own clock value on write.
    pub fn server() -> Self {
        Timestamp::Pending {
            server_timestamp: true,
        }
    }

    /// Build a resolved timestamp from epoch milliseconds.
    pub fn from_millis(millis: i64) -> Self {
        Timestamp::Resolved {
            seconds: millis.div_euclid(1_000),
            nanoseconds: (millis.rem_euclid(1_000) as u32) * 1_000_000,
        }
    }

    /// Whether the value is still waiting for the server to assign it.
    pub fn is_pending(&self) -> bool {
        matches!(self, Timestamp::Pending { .. })
    }

    /// Milliseconds since the epoch; a pending value counts as `now_ms`.
    pub fn to_millis(&self, now_ms: i64) -> i64 {
        match *self {
            Timestamp::Resolved {
                seconds,
                nanoseconds,
            } => seconds * 1_000 + i64::from(nanoseconds / 1_000_000),
            Timestamp::Pending { .. } => now_ms,
            Timestamp::Millis(millis) => millis,
        }
    }
}

/// Non-negative milliseconds between `from` and `to`.
///
/// Clock skew that puts `to` before `from` yields zero.
pub fn elapsed_ms(from: Timestamp, to: Timestamp, now_ms: i64) -> u64 {
    let delta = to.to_millis(now_ms) - from.to_millis(now_ms);
    delta.max(0) as u64
}

/// Replace every pending server-timestamp sentinel in `fields` with `now_ms`.
pub fn resolve_server_timestamps(fields: &mut Fields, now_ms: i64) {
    for value in fields.values_mut() {
        resolve_value(value, now_ms);
    }
}

fn resolve_value(value: &mut Value, now_ms: i64) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 && map.contains_key(SERVER_TIMESTAMP_KEY) {
                *value = resolved_value(now_ms);
            } else {
                for nested in map.values_mut() {
                    resolve_value(nested, now_ms);
                }
            }
        }
        Value::Array(items) => {
            for nested in items {
                resolve_value(nested, now_ms);
            }
        }
        _ => {}
    }
}

fn resolved_value(now_ms: i64) -> Value {
    Timestamp::from_millis(now_ms).into()
}

impl From<Timestamp> for Value {
    fn from(timestamp: Timestamp) -> Self {
        match timestamp {
            Timestamp::Resolved {
                seconds,
                nanoseconds,
            } => json!({ "seconds": seconds, "nanoseconds": nanoseconds }),
            Timestamp::Pending { server_timestamp } => {
                json!({ (SERVER_TIMESTAMP_KEY): server_timestamp })
            }
            Timestamp::Millis(millis) => Value::from(millis),
        }
    }
}
