//! Request and response payloads of the HTTP and SSE surface.

/// Standby, seat and court session payloads.
pub mod courts;
pub mod health;
/// Queue, exclusion and roster payloads.
pub mod queue;
/// Member and attendance payloads.
pub mod roster;
pub mod settings;
/// Events pushed over the day stream.
pub mod sse;
pub mod validation;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// RFC 3339 rendering of epoch milliseconds, in UTC.
fn format_epoch_millis(millis: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .ok()
        .and_then(|time| time.format(&Rfc3339).ok())
        .unwrap_or_else(|| "invalid-timestamp".into())
}
