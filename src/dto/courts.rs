//! Standby, seat and court session payloads.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::{
    config::{MAX_COURTS, MIN_COURTS},
    dao::models::Player,
    dto::{queue::PlayerInput, validation::validate_segment},
    services::{court_service::MatchToStart, match_composer::Side},
};

/// Body of `POST /days/{dateKey}/standby/randomize`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RandomizeRequest {
    #[validate(range(min = 1, max = 50))]
    pub matches_to_create: u32,
    /// Defaults to the configured court count.
    #[serde(default)]
    #[validate(range(min = MIN_COURTS, max = MAX_COURTS))]
    pub court_count: Option<u32>,
}

/// Two doubles teams.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamsRequest {
    pub team_a: [PlayerInput; 2],
    pub team_b: [PlayerInput; 2],
}

impl TeamsRequest {
    pub fn into_teams(self) -> ([Player; 2], [Player; 2]) {
        (self.team_a.map(Player::from), self.team_b.map(Player::from))
    }
}

impl Validate for TeamsRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, team) in [("teamA", &self.team_a), ("teamB", &self.team_b)] {
            for player in team {
                if let Err(player_errors) = player.validate() {
                    errors.merge_self(field, Err(player_errors));
                }
            }
        }

        let mut ids: Vec<&str> = self
            .team_a
            .iter()
            .chain(&self.team_b)
            .filter_map(|player| player.id.as_deref())
            .collect();
        let named = ids.len();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != named {
            let mut err = validator::ValidationError::new("duplicate_player");
            err.message = Some("a player cannot take two seats of the same match".into());
            errors.add("teamA", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Body of `PUT .../standby/{matchId}/seat`.
#[derive(Debug, Deserialize, Validate)]
pub struct SeatRequest {
    pub side: Side,
    #[validate(range(max = 1))]
    pub index: usize,
    #[validate(nested)]
    pub player: PlayerInput,
}

/// Body of `POST .../courts/{courtId}/start`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    /// Standby match being promoted, if any.
    #[serde(default)]
    pub match_id: Option<String>,
    #[serde(flatten)]
    pub teams: TeamsRequest,
}

impl Validate for StartRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.teams.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        if let Some(match_id) = &self.match_id {
            if let Err(err) = validate_segment(match_id) {
                errors.add("matchId", err);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl From<StartRequest> for MatchToStart {
    fn from(request: StartRequest) -> Self {
        let (team_a, team_b) = request.teams.into_teams();
        MatchToStart {
            standby_id: request.match_id,
            team_a,
            team_b,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    /// `false` when the match no longer exists.
    pub updated: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn player(id: &str) -> serde_json::Value {
        json!({"id": id, "name": id.to_uppercase(), "level": 2})
    }

    #[test]
    fn start_request_reads_flattened_teams() {
        let request: StartRequest = serde_json::from_value(json!({
            "matchId": "m1",
            "teamA": [player("a"), player("d")],
            "teamB": [player("b"), player("c")],
        }))
        .unwrap();
        assert!(request.validate().is_ok());

        let to_start = MatchToStart::from(request);
        assert_eq!(to_start.standby_id.as_deref(), Some("m1"));
        assert_eq!(to_start.team_b[1].id, "c");
    }

    #[test]
    fn duplicate_seats_are_rejected() {
        let request: TeamsRequest = serde_json::from_value(json!({
            "teamA": [player("a"), player("b")],
            "teamB": [player("b"), player("c")],
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn seat_index_is_bounded() {
        let request: SeatRequest = serde_json::from_value(json!({
            "side": "teamB",
            "index": 2,
            "player": player("e"),
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn randomize_court_count_is_bounded() {
        let request: RandomizeRequest =
            serde_json::from_value(json!({"matchesToCreate": 2, "courtCount": 21})).unwrap();
        assert!(request.validate().is_err());
        let request: RandomizeRequest =
            serde_json::from_value(json!({"matchesToCreate": 2})).unwrap();
        assert!(request.validate().is_ok());
    }
}
