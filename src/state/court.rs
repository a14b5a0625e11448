//! Per-court phase model: `Empty -> Live -> Empty`.
//!
//! The live slot document is the single source of truth; this module only
//! decides whether an event is allowed for the slot's current occupancy.

use thiserror::Error;

/// Occupancy of a court's live slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourtPhase {
    /// No match in progress.
    Empty,
    /// A match occupies the court.
    Live,
}

impl CourtPhase {
    /// Phase implied by the presence of a live slot document.
    pub fn from_slot(occupied: bool) -> Self {
        if occupied {
            CourtPhase::Live
        } else {
            CourtPhase::Empty
        }
    }
}

/// Events driving a court's phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourtEvent {
    /// Promote a match into the live slot.
    Start,
    /// Close the live match and release the court.
    Finish,
}

/// Error returned when an event is not allowed from the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid court transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    pub from: CourtPhase,
    pub event: CourtEvent,
}

/// Compute the phase reached by applying `event` from `from`.
pub fn compute_transition(
    from: CourtPhase,
    event: CourtEvent,
) -> Result<CourtPhase, InvalidTransition> {
    match (from, event) {
        (CourtPhase::Empty, CourtEvent::Start) => Ok(CourtPhase::Live),
        (CourtPhase::Live, CourtEvent::Finish) => Ok(CourtPhase::Empty),
        (from, event) => Err(InvalidTransition { from, event }),
    }
}
