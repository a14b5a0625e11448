/// Live match slots: start, finish and history.
pub mod court_service;
/// Health check service.
pub mod health_service;
/// Per-connection realtime views streamed over SSE.
pub mod live_view;
/// Standby match composition and editing.
pub mod match_composer;
/// Daily play queue and exclusion marks.
pub mod queue_service;
/// Club members, daily attendance and the candidates derived from them.
pub mod roster_service;
/// Court count settings.
pub mod settings_service;
/// SSE plumbing for live views.
pub mod sse_service;
/// Wait, play and court time counters.
pub mod stats_service;
/// Background storage connection supervisor.
pub mod storage_supervisor;

use crate::{dao::paths::is_valid_segment, error::ServiceError};

/// Reject ids that cannot be used as a single path segment.
fn require_segment(value: &str, what: &str) -> Result<(), ServiceError> {
    if is_valid_segment(value) {
        Ok(())
    } else {
        Err(ServiceError::InvalidInput(format!("invalid {what} `{value}`")))
    }
}
