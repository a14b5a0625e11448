use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::{MAX_COURTS, MIN_COURTS};

/// Body of `PUT /settings/courts`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CourtCountRequest {
    #[validate(range(min = MIN_COURTS, max = MAX_COURTS))]
    pub court_count: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourtCountResponse {
    pub court_count: u32,
}
