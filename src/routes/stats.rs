use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use super::extract::{GroupId, day};
use crate::{
    dao::models::{CourtStatsEntity, Identified, PlayerStatsEntity},
    error::AppError,
    services::stats_service,
    state::SharedState,
};

/// Daily time counters.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/days/{date_key}/stats/players", get(player_stats))
        .route("/days/{date_key}/stats/players/{player_id}", get(player_stats_for))
        .route("/days/{date_key}/stats/courts", get(court_stats))
}

pub async fn player_stats(
    State(state): State<SharedState>,
    group: GroupId,
    Path(date_key): Path<String>,
) -> Result<Json<Vec<Identified<PlayerStatsEntity>>>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    Ok(Json(stats_service::player_stats(&ctx).await?))
}

/// Counters of one player; all zero when they have not waited or played yet.
pub async fn player_stats_for(
    State(state): State<SharedState>,
    group: GroupId,
    Path((date_key, player_id)): Path<(String, String)>,
) -> Result<Json<PlayerStatsEntity>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    Ok(Json(stats_service::player_stats_for(&ctx, &player_id).await?))
}

/// Courts by total play time, busiest first.
pub async fn court_stats(
    State(state): State<SharedState>,
    group: GroupId,
    Path(date_key): Path<String>,
) -> Result<Json<Vec<Identified<CourtStatsEntity>>>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    Ok(Json(stats_service::court_stats(&ctx).await?))
}
