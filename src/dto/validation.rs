//! Validation helpers for DTOs and path parameters.

use time::{Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};
use validator::ValidationError;

use crate::dao::paths::is_valid_segment;

/// `YYYY-MM-DD`, the form every day is keyed by.
const DATE_KEY_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Path value standing for the server's local date.
pub const TODAY: &str = "today";

/// Validates that a date key is a real calendar date written as `YYYY-MM-DD`.
///
/// ```ignore
/// validate_date_key("2024-02-29") // Ok
/// validate_date_key("2023-02-29") // Err - not a date
/// validate_date_key("2024-2-1")   // Err - not zero padded
/// ```
pub fn validate_date_key(key: &str) -> Result<(), ValidationError> {
    if key.len() != 10 || Date::parse(key, DATE_KEY_FORMAT).is_err() {
        let mut err = ValidationError::new("date_key_format");
        err.message = Some(format!("date key must be a YYYY-MM-DD date (got `{key}`)").into());
        return Err(err);
    }
    Ok(())
}

/// Resolve a `{dateKey}` path value, mapping `today` to the local date.
pub fn resolve_date_key(raw: &str) -> Result<String, ValidationError> {
    if raw == TODAY {
        return Ok(today_key());
    }
    validate_date_key(raw)?;
    Ok(raw.to_owned())
}

/// Local date as a date key; falls back to UTC when the offset is unknown.
pub fn today_key() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_date(now.date())
}

fn format_date(date: Date) -> String {
    date.format(DATE_KEY_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

/// Validates an id used as a single storage path segment.
pub fn validate_segment(id: &str) -> Result<(), ValidationError> {
    if is_valid_segment(id) {
        Ok(())
    } else {
        let mut err = ValidationError::new("path_segment");
        err.message = Some("id must be non-empty and free of `/` and control characters".into());
        Err(err)
    }
}
