use std::collections::BTreeSet;

use tracing::{debug, info};

use super::{require_segment, stats_service};
use crate::{
    dao::{
        document::{Direction, Query, encode},
        models::{ExclusionEntity, Identified, Player, QueueEntryEntity},
        timestamp::Timestamp,
    },
    error::ServiceError,
    state::DayContext,
};

/// Queue entry as listed to callers; the id is the player id.
pub type QueueEntry = Identified<QueueEntryEntity>;

/// Put a player at the back of the day's queue.
///
/// Joining twice is a no-op; returns whether a new entry was created.
pub async fn join(ctx: &DayContext, player: Player) -> Result<bool, ServiceError> {
    let player = player.normalized();
    require_segment(&player.id, "player id")?;

    let path = ctx.paths().queue_entry(&player.id);
    let entry = QueueEntryEntity {
        player,
        joined_at: Timestamp::server(),
        wait_total_ms: 0,
    };
    let fields = encode(&path, &entry)?;
    let created = ctx.store().create(path, fields).await?;

    if created {
        info!(date = ctx.date_key(), player_id = %entry.player.id, "player joined queue");
    } else {
        debug!(date = ctx.date_key(), player_id = %entry.player.id, "player already queued");
    }
    Ok(created)
}

/// Remove a player from the queue without crediting any wait time.
pub async fn leave(ctx: &DayContext, player_id: &str) -> Result<bool, ServiceError> {
    require_segment(player_id, "player id")?;
    let removed = ctx
        .store()
        .delete(ctx.paths().queue_entry(player_id))
        .await?;
    if removed {
        info!(date = ctx.date_key(), player_id, "player left queue");
    }
    Ok(removed)
}

/// Take a player out of the queue, crediting the time waited.
///
/// Returns `None` when the player was not queued (already popped or left).
pub async fn pop(ctx: &DayContext, player_id: &str) -> Result<Option<Player>, ServiceError> {
    require_segment(player_id, "player id")?;
    let Some(document) = ctx.store().take(ctx.paths().queue_entry(player_id)).await? else {
        debug!(date = ctx.date_key(), player_id, "pop on absent queue entry");
        return Ok(None);
    };

    let entry: QueueEntryEntity = document.decode()?;
    let waited = stats_service::credit_wait(ctx, player_id, entry.joined_at).await?;
    info!(date = ctx.date_key(), player_id, waited_ms = waited, "player popped from queue");
    Ok(Some(entry.player))
}

/// Queue in arrival order, ties broken by player id.
pub async fn list(ctx: &DayContext) -> Result<Vec<QueueEntry>, ServiceError> {
    let documents = ctx
        .store()
        .query(Query::new(ctx.paths().queue()).order_by("joinedAt", Direction::Ascending))
        .await?;
    Ok(Identified::decode_all(&documents)?)
}

/// Flip a player's "not playing today" mark; returns whether the player is now excluded.
pub async fn toggle_exclusion(ctx: &DayContext, player_id: &str) -> Result<bool, ServiceError> {
    require_segment(player_id, "player id")?;
    let path = ctx.paths().exclusion(player_id);

    if ctx.store().take(path.clone()).await?.is_some() {
        info!(date = ctx.date_key(), player_id, "exclusion cleared");
        return Ok(false);
    }

    let mark = ExclusionEntity {
        created_at: Timestamp::server(),
    };
    let fields = encode(&path, &mark)?;
    // A concurrent toggle may have created the mark first; either way it exists now.
    ctx.store().create(path, fields).await?;
    info!(date = ctx.date_key(), player_id, "player excluded");
    Ok(true)
}

/// Ids of the players marked as not playing.
pub async fn excluded(ctx: &DayContext) -> Result<BTreeSet<String>, ServiceError> {
    let documents = ctx
        .store()
        .query(Query::new(ctx.paths().excluded()))
        .await?;
    Ok(documents
        .iter()
        .map(|document| document.id().to_owned())
        .collect())
}

/// Queue minus excluded players, oldest first.
pub async fn eligible(ctx: &DayContext) -> Result<Vec<QueueEntry>, ServiceError> {
    let excluded = excluded(ctx).await?;
    let mut queue = list(ctx).await?;
    queue.retain(|entry| !excluded.contains(&entry.id));
    Ok(queue)
}
