use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dao::models::Player, dto::queue::PlayerInput, services::roster_service::MemberChanges,
};

/// Body of `POST /members`.
#[derive(Debug, Deserialize, Validate)]
pub struct MemberInput {
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    #[serde(default)]
    #[validate(range(max = 100))]
    pub level: u32,
}

/// Body of `PATCH /members/{memberId}`; absent fields stay unchanged.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MemberPatch {
    #[validate(length(min = 1, max = 80))]
    pub name: Option<String>,
    #[validate(range(max = 100))]
    pub level: Option<u32>,
    pub today_checked_in: Option<bool>,
}

impl From<MemberPatch> for MemberChanges {
    fn from(patch: MemberPatch) -> Self {
        MemberChanges {
            name: patch.name,
            level: patch.level,
            today_checked_in: patch.today_checked_in,
        }
    }
}

/// Body of `PUT /days/{dateKey}/attendees`: the whole attendance list.
#[derive(Debug, Deserialize)]
pub struct AttendeesRequest {
    pub players: Vec<PlayerInput>,
}

impl Validate for AttendeesRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for player in &self.players {
            if let Err(player_errors) = player.validate() {
                errors.merge_self("players", Err(player_errors));
            }
        }

        let mut ids: Vec<&str> = self
            .players
            .iter()
            .filter_map(|player| player.id.as_deref())
            .collect();
        let named = ids.len();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != named {
            let mut err = ValidationError::new("duplicate_player");
            err.message = Some("a player can only be listed once".into());
            errors.add("players", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl AttendeesRequest {
    pub fn into_players(self) -> Vec<Player> {
        self.players.into_iter().map(Player::from).collect()
    }
}

/// Body of `PUT /days/{dateKey}/attendees/{playerId}/arrived`.
#[derive(Debug, Deserialize)]
pub struct ArrivedRequest {
    pub arrived: bool,
}

/// Result of adding one attendee.
#[derive(Debug, Serialize)]
pub struct AttendeeAdded {
    /// `false` when the player was already listed.
    pub added: bool,
    pub player: Player,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn member_patch_checks_present_fields_only() {
        let patch: MemberPatch = serde_json::from_value(json!({"todayCheckedIn": true})).unwrap();
        assert!(patch.validate().is_ok());
        let changes = MemberChanges::from(patch);
        assert_eq!(changes.today_checked_in, Some(true));
        assert_eq!(changes.name, None);

        let patch: MemberPatch = serde_json::from_value(json!({"name": ""})).unwrap();
        assert!(patch.validate().is_err());
    }

    #[test]
    fn attendance_list_rejects_duplicates() {
        let request: AttendeesRequest = serde_json::from_value(json!({
            "players": [{"id": "p1", "name": "Ana"}, {"id": "p1", "name": "Ana"}]
        }))
        .unwrap();
        assert!(request.validate().is_err());

        let request: AttendeesRequest = serde_json::from_value(json!({
            "players": [{"id": "p1", "name": "Ana"}, {"name": "Guest"}]
        }))
        .unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.into_players().len(), 2);
    }
}
