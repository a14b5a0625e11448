use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    routing::{get, put},
};
use futures::Stream;
use serde::Deserialize;
use uuid::Uuid;

use super::extract::{GroupId, date_key};
use crate::{
    config::CourtCount,
    error::AppError,
    services::sse_service,
    state::SharedState,
};

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    /// Courts to watch; defaults to the configured court count.
    pub courts: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchDayRequest {
    pub date_key: String,
}

/// Stream realtime snapshots of one club day.
pub async fn day_stream(
    State(state): State<SharedState>,
    group: GroupId,
    Path(raw_date): Path<String>,
    Query(params): Query<StreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let date_key = date_key(&raw_date)?;
    let court_count = match params.courts {
        Some(courts) => CourtCount::new(courts)
            .ok_or_else(|| AppError::BadRequest(format!("invalid court count {courts}")))?,
        None => state.court_count(),
    };

    let (view, receiver) =
        sse_service::open_day_view(&state, &date_key, group.0, court_count.get()).await?;
    Ok(sse_service::to_sse_stream(state, view, receiver))
}

/// Move an open stream to another day, cancelling the previous day's listeners.
pub async fn switch_day(
    State(state): State<SharedState>,
    Path(view_id): Path<Uuid>,
    Json(request): Json<SwitchDayRequest>,
) -> Result<StatusCode, AppError> {
    let date_key = date_key(&request.date_key)?;
    sse_service::switch_day(&state, view_id, &date_key)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/days/{date_key}", get(day_stream))
        .route("/sse/views/{view_id}/day", put(switch_day))
}
