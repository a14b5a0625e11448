use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use axum_valid::Valid;

use super::extract::{GroupId, day};
use crate::{
    dao::models::Player,
    dto::queue::{
        ExcludedList, ExclusionResponse, JoinResponse, PlayerInput, PopResponse, RemovedResponse,
    },
    error::AppError,
    services::{
        queue_service::{self, QueueEntry},
        roster_service,
    },
    state::SharedState,
};

/// Queue, exclusion and roster endpoints of a club day.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/days/{date_key}/candidates", get(candidates))
        .route("/days/{date_key}/queue", get(list_queue).post(join_queue))
        .route("/days/{date_key}/queue/eligible", get(eligible))
        .route("/days/{date_key}/queue/{player_id}", delete(leave_queue))
        .route("/days/{date_key}/queue/{player_id}/pop", post(pop_player))
        .route("/days/{date_key}/excluded", get(list_excluded))
        .route("/days/{date_key}/excluded/{player_id}/toggle", post(toggle_exclusion))
}

/// Players who can be added to the queue.
pub async fn candidates(
    State(state): State<SharedState>,
    group: GroupId,
    Path(date_key): Path<String>,
) -> Result<Json<Vec<Player>>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    Ok(Json(roster_service::candidates(&ctx).await?))
}

/// Waiting players, oldest first.
pub async fn list_queue(
    State(state): State<SharedState>,
    group: GroupId,
    Path(date_key): Path<String>,
) -> Result<Json<Vec<QueueEntry>>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    Ok(Json(queue_service::list(&ctx).await?))
}

/// Waiting players not marked as excluded.
pub async fn eligible(
    State(state): State<SharedState>,
    group: GroupId,
    Path(date_key): Path<String>,
) -> Result<Json<Vec<QueueEntry>>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    Ok(Json(queue_service::eligible(&ctx).await?))
}

/// Add a player to the queue; joining twice keeps the original entry.
pub async fn join_queue(
    State(state): State<SharedState>,
    group: GroupId,
    Path(date_key): Path<String>,
    Valid(Json(input)): Valid<Json<PlayerInput>>,
) -> Result<(StatusCode, Json<JoinResponse>), AppError> {
    let ctx = day(&state, &date_key, group).await?;
    let player = Player::from(input);
    let created = queue_service::join(&ctx, player.clone()).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(JoinResponse { created, player })))
}

pub async fn leave_queue(
    State(state): State<SharedState>,
    group: GroupId,
    Path((date_key, player_id)): Path<(String, String)>,
) -> Result<Json<RemovedResponse>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    let removed = queue_service::leave(&ctx, &player_id).await?;
    Ok(Json(RemovedResponse { removed }))
}

/// Take a player out of the queue, crediting their wait.
pub async fn pop_player(
    State(state): State<SharedState>,
    group: GroupId,
    Path((date_key, player_id)): Path<(String, String)>,
) -> Result<Json<PopResponse>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    let player = queue_service::pop(&ctx, &player_id).await?;
    Ok(Json(PopResponse { player }))
}

pub async fn list_excluded(
    State(state): State<SharedState>,
    group: GroupId,
    Path(date_key): Path<String>,
) -> Result<Json<ExcludedList>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    let player_ids = queue_service::excluded(&ctx).await?.into_iter().collect();
    Ok(Json(ExcludedList { player_ids }))
}

pub async fn toggle_exclusion(
    State(state): State<SharedState>,
    group: GroupId,
    Path((date_key, player_id)): Path<(String, String)>,
) -> Result<Json<ExclusionResponse>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    let excluded = queue_service::toggle_exclusion(&ctx, &player_id).await?;
    Ok(Json(ExclusionResponse { excluded }))
}
