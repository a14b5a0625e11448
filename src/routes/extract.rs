use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    dao::paths::is_valid_segment,
    dto::validation::resolve_date_key,
    error::AppError,
    state::{DayContext, SharedState},
};

/// Header selecting the tenant group of a request.
pub const GROUP_HEADER: &str = "x-group-id";

/// Tenant group named by the `x-group-id` header, if any.
#[derive(Debug, Clone, Default)]
pub struct GroupId(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for GroupId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(GROUP_HEADER) else {
            return Ok(Self(None));
        };
        let group = value
            .to_str()
            .map_err(|_| AppError::BadRequest(format!("{GROUP_HEADER} must be visible ASCII")))?
            .trim();
        if group.is_empty() {
            return Ok(Self(None));
        }
        if !is_valid_segment(group) {
            return Err(AppError::BadRequest(format!("invalid {GROUP_HEADER} `{group}`")));
        }
        Ok(Self(Some(group.to_owned())))
    }
}

/// Resolve a raw `{dateKey}` path value into a checked date key.
pub fn date_key(raw: &str) -> Result<String, AppError> {
    resolve_date_key(raw).map_err(|err| AppError::BadRequest(err.to_string()))
}

/// Context of the requested day for the request's group.
pub async fn day(state: &SharedState, raw_date: &str, group: GroupId) -> Result<DayContext, AppError> {
    let date_key = date_key(raw_date)?;
    state
        .day_context(&date_key, group.0)
        .await
        .map_err(AppError::from)
}
