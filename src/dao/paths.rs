//! Document layout of a club day, optionally nested under `groups/{groupId}/`.

use super::document::{CollectionPath, DocPath};

const LIVE_SLOT_ID: &str = "live";

/// Resolves every collection and slot of one day for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayPaths {
    prefix: String,
    day: DocPath,
}

impl DayPaths {
    pub fn new(group_id: Option<&str>, date_key: &str) -> Self {
        let prefix = match group_id {
            Some(group) => format!("groups/{group}/"),
            None => String::new(),
        };
        let day = CollectionPath::root(format!("{prefix}dates")).doc(date_key);
        Self { prefix, day }
    }

    pub fn date_key(&self) -> &str {
        self.day.id()
    }

    pub fn queue(&self) -> CollectionPath {
        self.day.child("queue")
    }

    pub fn queue_entry(&self, player_id: &str) -> DocPath {
        self.queue().doc(player_id)
    }

    pub fn excluded(&self) -> CollectionPath {
        self.day.child("excluded")
    }

    pub fn exclusion(&self, player_id: &str) -> DocPath {
        self.excluded().doc(player_id)
    }

    pub fn attendees(&self) -> CollectionPath {
        self.day.child("attendees")
    }

    fn court(&self, court_id: &str) -> DocPath {
        self.day.child("courts").doc(court_id)
    }

    pub fn standby(&self, court_id: &str) -> CollectionPath {
        self.court(court_id).child("standby_matches")
    }

    pub fn standby_match(&self, court_id: &str, match_id: &str) -> DocPath {
        self.standby(court_id).doc(match_id)
    }

    /// Fixed slot holding the court's in-progress match.
    pub fn live_slot(&self, court_id: &str) -> DocPath {
        self.court(court_id).child("current_match").doc(LIVE_SLOT_ID)
    }

    pub fn history(&self, court_id: &str) -> CollectionPath {
        self.court(court_id).child("matches_history")
    }

    pub fn player_stats(&self) -> CollectionPath {
        CollectionPath::root(format!("{}/players", self.day.child("stats")))
    }

    pub fn player_stats_doc(&self, player_id: &str) -> DocPath {
        self.player_stats().doc(player_id)
    }

    pub fn court_stats(&self) -> CollectionPath {
        self.day.child("courts_stats")
    }

    pub fn court_stats_doc(&self, court_id: &str) -> DocPath {
        self.court_stats().doc(court_id)
    }

    /// Club roster, shared by every day of the tenant.
    pub fn members(&self) -> CollectionPath {
        CollectionPath::root(format!("{}members", self.prefix))
    }
}

/// Whether `value` can be used as a single path segment (id, date key, group).
pub fn is_valid_segment(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 128
        && value != "."
        && value != ".."
        && !value.contains('/')
        && !value.chars().any(char::is_control)
}

/// Court ids used by the composer: `court1`, `court2`, ...
pub fn court_id(number: u32) -> String {
    format!("court{number}")
}
