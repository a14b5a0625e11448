//! Persisted shapes of the club's daily documents.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use super::{document::Document, storage::StorageResult, timestamp::Timestamp};

const UNKNOWN_PLAYER_NAME: &str = "Unknown";

/// Snapshot of a player copied into queue and match records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: u32,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>, level: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            level,
        }
    }

    /// Fill the blanks a roster record may leave: a missing id gets a short
    /// generated one and a blank name becomes "Unknown".
    pub fn normalized(mut self) -> Self {
        if self.id.trim().is_empty() {
            self.id = short_id();
        }
        if self.name.trim().is_empty() {
            self.name = UNKNOWN_PLAYER_NAME.to_owned();
        }
        self
    }
}

fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

/// `queue/{playerId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntryEntity {
    pub player: Player,
    pub joined_at: Timestamp,
    #[serde(default)]
    pub wait_total_ms: u64,
}

/// `excluded/{playerId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionEntity {
    pub created_at: Timestamp,
}

/// `attendees/{playerId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeEntity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: u32,
    /// Set once the player shows up at the hall.
    #[serde(default)]
    pub arrived: bool,
}

/// `members/{memberId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberEntity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub today_checked_in: bool,
}

/// Composed match waiting for a court: `courts/{courtId}/standby_matches/{matchId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandbyMatchEntity {
    pub team_a: [Player; 2],
    pub team_b: [Player; 2],
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchState {
    Live,
    Finished,
}

/// Occupant of the fixed `courts/{courtId}/current_match/live` slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveMatchEntity {
    pub court_id: String,
    pub state: MatchState,
    pub team_a: [Player; 2],
    pub team_b: [Player; 2],
    pub started_at: Timestamp,
}

impl LiveMatchEntity {
    /// All four participants, team A first.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.team_a.iter().chain(self.team_b.iter())
    }
}

/// Append-only `courts/{courtId}/matches_history/{recordId}` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchHistoryEntity {
    pub court_id: String,
    pub state: MatchState,
    pub team_a: [Player; 2],
    pub team_b: [Player; 2],
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

/// `stats/players/{playerId}` counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerStatsEntity {
    pub games: u64,
    pub wins: u64,
    pub losses: u64,
    pub play_time_ms_total: u64,
    pub wait_time_ms_total: u64,
    pub updated_at: Option<Timestamp>,
}

/// `courts_stats/{courtId}` counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourtStatsEntity {
    pub play_time_ms_total: u64,
    pub updated_at: Option<Timestamp>,
}

/// A decoded document together with its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identified<T> {
    pub id: String,
    #[serde(flatten)]
    pub entity: T,
}

impl<T> Identified<T> {
    pub fn new(id: impl Into<String>, entity: T) -> Self {
        Self {
            id: id.into(),
            entity,
        }
    }
}

impl<T: DeserializeOwned> Identified<T> {
    pub fn decode(document: &Document) -> StorageResult<Self> {
        Ok(Self::new(document.id(), document.decode()?))
    }

    /// Decode a query result, keeping its order.
    pub fn decode_all(documents: &[Document]) -> StorageResult<Vec<Self>> {
        documents.iter().map(Self::decode).collect()
    }
}
