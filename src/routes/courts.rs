use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use axum_valid::Valid;

use super::extract::{GroupId, day};
use crate::{
    dao::models::{Identified, LiveMatchEntity, MatchHistoryEntity, Player, StandbyMatchEntity},
    dto::{
        courts::{RandomizeRequest, SeatRequest, StartRequest, TeamsRequest, UpdatedResponse},
        queue::RemovedResponse,
    },
    error::AppError,
    services::{
        court_service::{self, FinishedMatch},
        match_composer::{self, ComposedMatch},
    },
    state::SharedState,
};

/// Standby composition and court session endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/days/{date_key}/standby/randomize", post(randomize))
        .route(
            "/days/{date_key}/courts/{court_id}/standby",
            get(list_standby).post(create_standby),
        )
        .route(
            "/days/{date_key}/courts/{court_id}/standby/{match_id}",
            delete(cancel_standby),
        )
        .route(
            "/days/{date_key}/courts/{court_id}/standby/{match_id}/seat",
            put(swap_seat),
        )
        .route(
            "/days/{date_key}/courts/{court_id}/standby/{match_id}/swap-partners",
            post(swap_partners),
        )
        .route("/days/{date_key}/courts/{court_id}/start", post(start_match))
        .route("/days/{date_key}/courts/{court_id}/finish", post(finish_match))
        .route("/days/{date_key}/courts/{court_id}/live", get(live_match))
        .route("/days/{date_key}/courts/{court_id}/history", get(history))
}

/// Compose standby matches from the eligible queue.
pub async fn randomize(
    State(state): State<SharedState>,
    group: GroupId,
    Path(date_key): Path<String>,
    Valid(Json(request)): Valid<Json<RandomizeRequest>>,
) -> Result<(StatusCode, Json<Vec<ComposedMatch>>), AppError> {
    let ctx = day(&state, &date_key, group).await?;
    let court_count = request
        .court_count
        .unwrap_or_else(|| state.court_count().get());
    let created =
        match_composer::randomize_into_standby(&ctx, request.matches_to_create, court_count)
            .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_standby(
    State(state): State<SharedState>,
    group: GroupId,
    Path((date_key, court_id)): Path<(String, String)>,
) -> Result<Json<Vec<Identified<StandbyMatchEntity>>>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    Ok(Json(match_composer::list_standby(&ctx, &court_id).await?))
}

/// File a hand-picked match on a court.
pub async fn create_standby(
    State(state): State<SharedState>,
    group: GroupId,
    Path((date_key, court_id)): Path<(String, String)>,
    Valid(Json(request)): Valid<Json<TeamsRequest>>,
) -> Result<(StatusCode, Json<ComposedMatch>), AppError> {
    let ctx = day(&state, &date_key, group).await?;
    let (team_a, team_b) = request.into_teams();
    let composed = match_composer::create_standby(&ctx, &court_id, team_a, team_b).await?;
    Ok((StatusCode::CREATED, Json(composed)))
}

pub async fn cancel_standby(
    State(state): State<SharedState>,
    group: GroupId,
    Path((date_key, court_id, match_id)): Path<(String, String, String)>,
) -> Result<Json<RemovedResponse>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    let removed = match_composer::cancel_standby(&ctx, &court_id, &match_id).await?;
    Ok(Json(RemovedResponse { removed }))
}

/// Replace one seat of a standby match.
pub async fn swap_seat(
    State(state): State<SharedState>,
    group: GroupId,
    Path((date_key, court_id, match_id)): Path<(String, String, String)>,
    Valid(Json(request)): Valid<Json<SeatRequest>>,
) -> Result<Json<UpdatedResponse>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    let updated = match_composer::swap_player(
        &ctx,
        &court_id,
        &match_id,
        request.side,
        request.index,
        Player::from(request.player),
    )
    .await?;
    Ok(Json(UpdatedResponse { updated }))
}

pub async fn swap_partners(
    State(state): State<SharedState>,
    group: GroupId,
    Path((date_key, court_id, match_id)): Path<(String, String, String)>,
) -> Result<Json<UpdatedResponse>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    let updated = match_composer::swap_partners(&ctx, &court_id, &match_id).await?;
    Ok(Json(UpdatedResponse { updated }))
}

/// Put a match on the court; `409` when the court is already busy.
pub async fn start_match(
    State(state): State<SharedState>,
    group: GroupId,
    Path((date_key, court_id)): Path<(String, String)>,
    Valid(Json(request)): Valid<Json<StartRequest>>,
) -> Result<(StatusCode, Json<LiveMatchEntity>), AppError> {
    let ctx = day(&state, &date_key, group).await?;
    let live = court_service::start(&ctx, &court_id, request.into()).await?;
    Ok((StatusCode::CREATED, Json(live)))
}

/// Close the court's live match and credit its players.
pub async fn finish_match(
    State(state): State<SharedState>,
    group: GroupId,
    Path((date_key, court_id)): Path<(String, String)>,
) -> Result<Json<FinishedMatch>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    Ok(Json(court_service::finish(&ctx, &court_id).await?))
}

pub async fn live_match(
    State(state): State<SharedState>,
    group: GroupId,
    Path((date_key, court_id)): Path<(String, String)>,
) -> Result<Json<Option<LiveMatchEntity>>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    Ok(Json(court_service::live_match(&ctx, &court_id).await?))
}

pub async fn history(
    State(state): State<SharedState>,
    group: GroupId,
    Path((date_key, court_id)): Path<(String, String)>,
) -> Result<Json<Vec<Identified<MatchHistoryEntity>>>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    Ok(Json(court_service::history(&ctx, &court_id).await?))
}
