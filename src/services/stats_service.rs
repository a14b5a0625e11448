//! Time and game counters credited while the day is played.
//!
//! Every credit goes through the store's atomic increment, so concurrent
//! finishes crediting the same player never lose an update. Deltas are
//! clamped at zero.

use tracing::debug;

use crate::{
    dao::{
        document::{Direction, Fields, Query},
        models::{CourtStatsEntity, Identified, Player, PlayerStatsEntity},
        timestamp::{Timestamp, elapsed_ms},
    },
    error::ServiceError,
    state::DayContext,
};

const GAMES: &str = "games";
const PLAY_TIME: &str = "playTimeMsTotal";
const WAIT_TIME: &str = "waitTimeMsTotal";
const UPDATED_AT: &str = "updatedAt";

fn updated_now() -> Fields {
    let mut fields = Fields::new();
    fields.insert(UPDATED_AT.to_owned(), Timestamp::server().into());
    fields
}

fn as_delta(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

/// Add the time elapsed since `joined_at` to the player's waiting total.
pub async fn credit_wait(
    ctx: &DayContext,
    player_id: &str,
    joined_at: Timestamp,
) -> Result<u64, ServiceError> {
    let now = ctx.now_ms();
    let delta = elapsed_ms(joined_at, Timestamp::Millis(now), now);
    ctx.store()
        .increment(
            ctx.paths().player_stats_doc(player_id),
            vec![(WAIT_TIME.to_owned(), as_delta(delta))],
            updated_now(),
        )
        .await?;
    debug!(date = ctx.date_key(), player_id, delta, "credited wait time");
    Ok(delta)
}

/// Count one game and the match duration for every player.
pub async fn credit_play(
    ctx: &DayContext,
    players: &[Player],
    started_at: Timestamp,
    finished_at: Timestamp,
) -> Result<u64, ServiceError> {
    let delta = elapsed_ms(started_at, finished_at, ctx.now_ms());
    for player in players {
        ctx.store()
            .increment(
                ctx.paths().player_stats_doc(&player.id),
                vec![(GAMES.to_owned(), 1), (PLAY_TIME.to_owned(), as_delta(delta))],
                updated_now(),
            )
            .await?;
    }
    debug!(date = ctx.date_key(), players = players.len(), delta, "credited play time");
    Ok(delta)
}

/// Add the match duration to the court's play total.
pub async fn credit_court_play(
    ctx: &DayContext,
    court_id: &str,
    started_at: Timestamp,
    finished_at: Timestamp,
) -> Result<u64, ServiceError> {
    let delta = elapsed_ms(started_at, finished_at, ctx.now_ms());
    ctx.store()
        .increment(
            ctx.paths().court_stats_doc(court_id),
            vec![(PLAY_TIME.to_owned(), as_delta(delta))],
            updated_now(),
        )
        .await?;
    debug!(date = ctx.date_key(), court_id, delta, "credited court time");
    Ok(delta)
}

/// Per-player totals for the day, ordered by player id.
pub async fn player_stats(
    ctx: &DayContext,
) -> Result<Vec<Identified<PlayerStatsEntity>>, ServiceError> {
    let documents = ctx
        .store()
        .query(Query::new(ctx.paths().player_stats()))
        .await?;
    Ok(Identified::decode_all(&documents)?)
}

/// Court counters, busiest court first.
pub async fn court_stats(
    ctx: &DayContext,
) -> Result<Vec<Identified<CourtStatsEntity>>, ServiceError> {
    let documents = ctx
        .store()
        .query(Query::new(ctx.paths().court_stats()).order_by(PLAY_TIME, Direction::Descending))
        .await?;
    Ok(Identified::decode_all(&documents)?)
}

/// Counters of one player, zeroed when nothing was credited yet.
pub async fn player_stats_for(
    ctx: &DayContext,
    player_id: &str,
) -> Result<PlayerStatsEntity, ServiceError> {
    match ctx
        .store()
        .get(ctx.paths().player_stats_doc(player_id))
        .await?
    {
        Some(document) => Ok(document.decode()?),
        None => Ok(PlayerStatsEntity::default()),
    }
}
