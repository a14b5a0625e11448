use axum::Router;

use crate::state::SharedState;

pub mod courts;
mod extract;
pub mod health;
pub mod queue;
pub mod roster;
pub mod settings;
pub mod sse;
pub mod stats;

pub use extract::GROUP_HEADER;

/// Compose all route trees, wiring in shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(queue::router())
        .merge(roster::router())
        .merge(courts::router())
        .merge(stats::router())
        .merge(settings::router())
        .merge(sse::router())
        .with_state(state)
}
