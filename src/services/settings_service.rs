use tracing::info;

use crate::{
    config::{CourtCount, MAX_COURTS, MIN_COURTS},
    error::ServiceError,
    state::SharedState,
};

/// Number of courts matches are spread over.
pub fn court_count(state: &SharedState) -> u32 {
    state.court_count().get()
}

/// Change the court count; values outside the supported range are rejected.
pub fn set_court_count(state: &SharedState, count: u32) -> Result<u32, ServiceError> {
    let count = CourtCount::new(count).ok_or_else(|| {
        ServiceError::InvalidInput(format!(
            "court count must be between {MIN_COURTS} and {MAX_COURTS} (got {count})"
        ))
    })?;
    state.set_court_count(count);
    info!(court_count = count.get(), "court count updated");
    Ok(count.get())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[test]
    fn rejects_counts_out_of_range() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            set_court_count(&state, 0),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(set_court_count(&state, 21).is_err());
        assert_eq!(court_count(&state), 10);

        assert_eq!(set_court_count(&state, 4).unwrap(), 4);
        assert_eq!(court_count(&state), 4);
    }
}
