use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, put},
};
use axum_valid::Valid;

use super::extract::{GroupId, day};
use crate::{
    dao::models::{AttendeeEntity, Identified, MemberEntity, Player},
    dto::{
        queue::{PlayerInput, RemovedResponse},
        roster::{ArrivedRequest, AttendeeAdded, AttendeesRequest, MemberInput, MemberPatch},
        validation::TODAY,
    },
    error::AppError,
    services::roster_service,
    state::SharedState,
};

/// Member roster and daily attendance endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/members", get(list_members).post(create_member))
        .route("/members/{member_id}", patch(update_member).delete(delete_member))
        .route(
            "/days/{date_key}/attendees",
            get(list_attendees).post(add_attendee).put(set_attendees),
        )
        .route("/days/{date_key}/attendees/{player_id}", delete(remove_attendee))
        .route("/days/{date_key}/attendees/{player_id}/arrived", put(set_arrived))
}

/// Club members, ordered by name.
pub async fn list_members(
    State(state): State<SharedState>,
    group: GroupId,
) -> Result<Json<Vec<Identified<MemberEntity>>>, AppError> {
    let ctx = day(&state, TODAY, group).await?;
    Ok(Json(roster_service::list_members(&ctx).await?))
}

pub async fn create_member(
    State(state): State<SharedState>,
    group: GroupId,
    Valid(Json(input)): Valid<Json<MemberInput>>,
) -> Result<(StatusCode, Json<Identified<MemberEntity>>), AppError> {
    let ctx = day(&state, TODAY, group).await?;
    let member = roster_service::create_member(&ctx, &input.name, input.level).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// Rename, re-level or check a member in or out.
pub async fn update_member(
    State(state): State<SharedState>,
    group: GroupId,
    Path(member_id): Path<String>,
    Valid(Json(changes)): Valid<Json<MemberPatch>>,
) -> Result<StatusCode, AppError> {
    let ctx = day(&state, TODAY, group).await?;
    if roster_service::update_member(&ctx, &member_id, changes.into()).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("no member `{member_id}`")))
    }
}

pub async fn delete_member(
    State(state): State<SharedState>,
    group: GroupId,
    Path(member_id): Path<String>,
) -> Result<Json<RemovedResponse>, AppError> {
    let ctx = day(&state, TODAY, group).await?;
    let removed = roster_service::delete_member(&ctx, &member_id).await?;
    Ok(Json(RemovedResponse { removed }))
}

/// The day's attendance list, ordered by name.
pub async fn list_attendees(
    State(state): State<SharedState>,
    group: GroupId,
    Path(date_key): Path<String>,
) -> Result<Json<Vec<Identified<AttendeeEntity>>>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    Ok(Json(roster_service::list_attendees(&ctx).await?))
}

pub async fn add_attendee(
    State(state): State<SharedState>,
    group: GroupId,
    Path(date_key): Path<String>,
    Valid(Json(input)): Valid<Json<PlayerInput>>,
) -> Result<(StatusCode, Json<AttendeeAdded>), AppError> {
    let ctx = day(&state, &date_key, group).await?;
    let player = Player::from(input);
    let added = roster_service::add_attendee(&ctx, player.clone()).await?;
    let status = if added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(AttendeeAdded { added, player })))
}

/// Replace the whole attendance list of the day.
pub async fn set_attendees(
    State(state): State<SharedState>,
    group: GroupId,
    Path(date_key): Path<String>,
    Valid(Json(request)): Valid<Json<AttendeesRequest>>,
) -> Result<Json<Vec<Identified<AttendeeEntity>>>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    let listed = roster_service::set_attendees(&ctx, request.into_players()).await?;
    Ok(Json(listed))
}

pub async fn remove_attendee(
    State(state): State<SharedState>,
    group: GroupId,
    Path((date_key, player_id)): Path<(String, String)>,
) -> Result<Json<RemovedResponse>, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    let removed = roster_service::remove_attendee(&ctx, &player_id).await?;
    Ok(Json(RemovedResponse { removed }))
}

/// Mark a listed player as arrived at the hall, or undo it.
pub async fn set_arrived(
    State(state): State<SharedState>,
    group: GroupId,
    Path((date_key, player_id)): Path<(String, String)>,
    Json(request): Json<ArrivedRequest>,
) -> Result<StatusCode, AppError> {
    let ctx = day(&state, &date_key, group).await?;
    if roster_service::set_arrived(&ctx, &player_id, request.arrived).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("`{player_id}` is not on the list of {}", ctx.date_key())))
    }
}
