use axum::{Json, Router, extract::State, routing::get};
use axum_valid::Valid;

use crate::{
    dto::settings::{CourtCountRequest, CourtCountResponse},
    error::AppError,
    services::settings_service,
    state::SharedState,
};

/// Club-wide settings.
pub fn router() -> Router<SharedState> {
    Router::new().route("/settings/courts", get(court_count).put(set_court_count))
}

pub async fn court_count(State(state): State<SharedState>) -> Json<CourtCountResponse> {
    Json(CourtCountResponse {
        court_count: settings_service::court_count(&state),
    })
}

/// Change how many courts randomised matches are spread over.
pub async fn set_court_count(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<CourtCountRequest>>,
) -> Result<Json<CourtCountResponse>, AppError> {
    let court_count = settings_service::set_court_count(&state, request.court_count)?;
    Ok(Json(CourtCountResponse { court_count }))
}
