//! Live slot lifecycle of each court: start, finish, and the history it leaves.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{require_segment, stats_service};
use crate::{
    dao::{
        document::{Direction, Query, encode},
        models::{Identified, LiveMatchEntity, MatchHistoryEntity, MatchState, Player},
        timestamp::Timestamp,
    },
    error::ServiceError,
    state::{
        DayContext,
        court::{CourtEvent, CourtPhase, compute_transition},
    },
};

/// Teams to put on court, optionally coming from a standby match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchToStart {
    /// Standby match to consume once the court is taken.
    pub standby_id: Option<String>,
    pub team_a: [Player; 2],
    pub team_b: [Player; 2],
}

/// What a finished match credited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishedMatch {
    pub history_id: String,
    #[serde(flatten)]
    pub record: MatchHistoryEntity,
    pub duration_ms: u64,
}

/// Put a match on an empty court.
///
/// The live slot is written only if absent: an occupied court fails with
/// [`ServiceError::CourtOccupied`] and the standby match is left untouched.
/// On success the originating standby match is deleted.
pub async fn start(
    ctx: &DayContext,
    court_id: &str,
    to_start: MatchToStart,
) -> Result<LiveMatchEntity, ServiceError> {
    require_segment(court_id, "court id")?;
    if let Some(standby_id) = &to_start.standby_id {
        require_segment(standby_id, "match id")?;
    }

    let live = LiveMatchEntity {
        court_id: court_id.to_owned(),
        state: MatchState::Live,
        team_a: to_start.team_a.map(Player::normalized),
        team_b: to_start.team_b.map(Player::normalized),
        started_at: Timestamp::server(),
    };

    let slot = ctx.paths().live_slot(court_id);
    let fields = encode(&slot, &live)?;
    let occupied = !ctx.store().create(slot, fields).await?;
    compute_transition(CourtPhase::from_slot(occupied), CourtEvent::Start).map_err(|err| {
        warn!(date = ctx.date_key(), court_id, error = %err, "court already has a live match");
        ServiceError::CourtOccupied(court_id.to_owned())
    })?;

    if let Some(standby_id) = &to_start.standby_id {
        ctx.store()
            .delete(ctx.paths().standby_match(court_id, standby_id))
            .await?;
    }

    info!(
        date = ctx.date_key(),
        court_id,
        standby_id = ?to_start.standby_id,
        "match started"
    );
    // Re-read so `startedAt` carries the time the store assigned.
    Ok(live_match(ctx, court_id).await?.unwrap_or(live))
}

/// Close the court's live match.
///
/// Steps run in order and are not atomic: append history, release the slot,
/// credit every player, credit the court. A failure midway leaves the
/// earlier steps applied. When a concurrent finish releases the slot first,
/// this call withdraws its history entry, credits nothing and fails with
/// [`ServiceError::NotFound`].
pub async fn finish(ctx: &DayContext, court_id: &str) -> Result<FinishedMatch, ServiceError> {
    require_segment(court_id, "court id")?;

    let slot = ctx.paths().live_slot(court_id);
    let Some(document) = ctx.store().get(slot.clone()).await? else {
        debug!(date = ctx.date_key(), court_id, "finish on empty court");
        return Err(no_live_match(court_id));
    };
    let live: LiveMatchEntity = document.decode()?;

    let finished_at = Timestamp::from_millis(ctx.now_ms());
    let record = MatchHistoryEntity {
        court_id: court_id.to_owned(),
        state: MatchState::Finished,
        team_a: live.team_a.clone(),
        team_b: live.team_b.clone(),
        started_at: live.started_at,
        finished_at,
    };
    let history = ctx.paths().history(court_id);
    let fields = encode(&history, &record)?;
    let history_id = ctx.store().add(history.clone(), fields).await?;

    let released = ctx.store().delete(slot).await?;
    if let Err(err) = compute_transition(CourtPhase::from_slot(released), CourtEvent::Finish) {
        warn!(date = ctx.date_key(), court_id, error = %err, "live match already finished");
        ctx.store().delete(history.doc(history_id)).await?;
        return Err(no_live_match(court_id));
    }

    let players: Vec<Player> = live.players().cloned().collect();
    let duration_ms =
        stats_service::credit_play(ctx, &players, live.started_at, finished_at).await?;
    stats_service::credit_court_play(ctx, court_id, live.started_at, finished_at).await?;

    info!(
        date = ctx.date_key(),
        court_id,
        history_id = %history_id,
        duration_ms,
        "match finished"
    );
    Ok(FinishedMatch {
        history_id,
        record,
        duration_ms,
    })
}

fn no_live_match(court_id: &str) -> ServiceError {
    ServiceError::NotFound(format!("no active match on court `{court_id}`"))
}

/// Match currently occupying the court, if any.
pub async fn live_match(
    ctx: &DayContext,
    court_id: &str,
) -> Result<Option<LiveMatchEntity>, ServiceError> {
    require_segment(court_id, "court id")?;
    match ctx.store().get(ctx.paths().live_slot(court_id)).await? {
        Some(document) => Ok(Some(document.decode()?)),
        None => Ok(None),
    }
}

/// Finished matches of the court, most recent first.
pub async fn history(
    ctx: &DayContext,
    court_id: &str,
) -> Result<Vec<Identified<MatchHistoryEntity>>, ServiceError> {
    require_segment(court_id, "court id")?;
    let documents = ctx
        .store()
        .query(Query::new(ctx.paths().history(court_id)).order_by("finishedAt", Direction::Descending))
        .await?;
    Ok(Identified::decode_all(&documents)?)
}
