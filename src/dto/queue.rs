//! Queue, exclusion and roster payloads.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{dao::models::Player, dto::validation::validate_segment};

/// Player snapshot sent by clients; blanks are filled in before storing.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PlayerInput {
    /// Generated when omitted.
    #[serde(default)]
    #[validate(custom(function = "validate_segment"))]
    pub id: Option<String>,
    #[serde(default)]
    #[validate(length(max = 80))]
    pub name: String,
    #[serde(default)]
    #[validate(range(max = 100))]
    pub level: u32,
}

impl From<PlayerInput> for Player {
    fn from(input: PlayerInput) -> Self {
        Player::new(input.id.unwrap_or_default(), input.name, input.level).normalized()
    }
}

/// Result of a join request.
#[derive(Debug, Serialize)]
pub struct JoinResponse {
    /// `false` when the player was already queued.
    pub created: bool,
    pub player: Player,
}

/// Player taken out of the queue, if they were still in it.
#[derive(Debug, Serialize)]
pub struct PopResponse {
    pub player: Option<Player>,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: bool,
}

#[derive(Debug, Serialize)]
pub struct ExclusionResponse {
    pub excluded: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedList {
    pub player_ids: Vec<String>,
}
