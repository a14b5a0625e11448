//! Turns the waiting queue into standby matches and edits them before they start.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{queue_service, require_segment};
use crate::{
    config::CourtCount,
    dao::{
        document::{DocPath, Direction, Fields, Query, encode},
        models::{Identified, Player, StandbyMatchEntity},
        paths::court_id,
        storage::StorageError,
        timestamp::Timestamp,
    },
    error::ServiceError,
    state::DayContext,
};

const PLAYERS_PER_MATCH: usize = 4;

/// Which team a seat belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Side {
    #[serde(rename = "teamA")]
    TeamA,
    #[serde(rename = "teamB")]
    TeamB,
}

impl Side {
    fn field(self) -> &'static str {
        match self {
            Side::TeamA => "teamA",
            Side::TeamB => "teamB",
        }
    }
}

/// Standby match together with where it was filed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedMatch {
    pub court_id: String,
    pub match_id: String,
    #[serde(flatten)]
    pub standby: StandbyMatchEntity,
}

/// Compose up to `matches_to_create` doubles matches from the eligible queue.
///
/// Players are served oldest first. Each group of four `p0..p3` becomes
/// `teamA = [p0, p3]`, `teamB = [p1, p2]`, filed on `court{(i % courts) + 1}`,
/// and its players are popped from the queue. Composition stops as soon as
/// fewer than four eligible players remain.
pub async fn randomize_into_standby(
    ctx: &DayContext,
    matches_to_create: u32,
    court_count: u32,
) -> Result<Vec<ComposedMatch>, ServiceError> {
    let courts = CourtCount::new(court_count).ok_or_else(|| {
        ServiceError::InvalidInput(format!("court count {court_count} is out of range"))
    })?;

    let mut pool = queue_service::eligible(ctx).await?.into_iter();
    let mut created = Vec::new();

    for index in 0..matches_to_create {
        let group: Vec<_> = pool.by_ref().take(PLAYERS_PER_MATCH).collect();
        let Ok([p0, p1, p2, p3]) = <[_; PLAYERS_PER_MATCH]>::try_from(group) else {
            debug!(
                date = ctx.date_key(),
                created = created.len(),
                "eligible pool exhausted"
            );
            break;
        };

        let court = court_id(index % courts.get() + 1);
        let standby = StandbyMatchEntity {
            team_a: [p0.entity.player.clone(), p3.entity.player.clone()],
            team_b: [p1.entity.player.clone(), p2.entity.player.clone()],
            created_at: Timestamp::server(),
        };
        let collection = ctx.paths().standby(&court);
        let fields = encode(&collection, &standby)?;
        let match_id = ctx.store().add(collection, fields).await?;

        for entry in [&p0, &p1, &p2, &p3] {
            if queue_service::pop(ctx, &entry.id).await?.is_none() {
                warn!(
                    date = ctx.date_key(),
                    court_id = %court,
                    match_id = %match_id,
                    player_id = %entry.id,
                    "player left the queue while being seated"
                );
            }
        }

        info!(date = ctx.date_key(), court_id = %court, match_id = %match_id, "standby match composed");
        created.push(ComposedMatch {
            court_id: court,
            match_id,
            standby,
        });
    }

    Ok(created)
}

/// File a hand-picked standby match on a court.
pub async fn create_standby(
    ctx: &DayContext,
    court_id: &str,
    team_a: [Player; 2],
    team_b: [Player; 2],
) -> Result<ComposedMatch, ServiceError> {
    require_segment(court_id, "court id")?;
    let standby = StandbyMatchEntity {
        team_a: team_a.map(Player::normalized),
        team_b: team_b.map(Player::normalized),
        created_at: Timestamp::server(),
    };
    let collection = ctx.paths().standby(court_id);
    let fields = encode(&collection, &standby)?;
    let match_id = ctx.store().add(collection, fields).await?;
    info!(date = ctx.date_key(), court_id, match_id = %match_id, "standby match created");

    Ok(ComposedMatch {
        court_id: court_id.to_owned(),
        match_id,
        standby,
    })
}

/// Drop a standby match; returns whether it still existed.
pub async fn cancel_standby(
    ctx: &DayContext,
    court_id: &str,
    match_id: &str,
) -> Result<bool, ServiceError> {
    require_segment(court_id, "court id")?;
    require_segment(match_id, "match id")?;
    let removed = ctx
        .store()
        .delete(ctx.paths().standby_match(court_id, match_id))
        .await?;
    if removed {
        info!(date = ctx.date_key(), court_id, match_id, "standby match cancelled");
    }
    Ok(removed)
}

/// Standby matches of a court, oldest first.
pub async fn list_standby(
    ctx: &DayContext,
    court_id: &str,
) -> Result<Vec<Identified<StandbyMatchEntity>>, ServiceError> {
    require_segment(court_id, "court id")?;
    let documents = ctx
        .store()
        .query(Query::new(ctx.paths().standby(court_id)).order_by("createdAt", Direction::Ascending))
        .await?;
    Ok(Identified::decode_all(&documents)?)
}

/// Replace one seat of a standby match.
///
/// Returns `false` without writing when the match is gone, e.g. because it
/// was started or cancelled concurrently.
pub async fn swap_player(
    ctx: &DayContext,
    court_id: &str,
    match_id: &str,
    side: Side,
    index: usize,
    new_player: Player,
) -> Result<bool, ServiceError> {
    require_segment(court_id, "court id")?;
    require_segment(match_id, "match id")?;
    if index > 1 {
        return Err(ServiceError::InvalidInput(format!(
            "seat index {index} is out of range"
        )));
    }

    let path = ctx.paths().standby_match(court_id, match_id);
    let Some(document) = ctx.store().get(path.clone()).await? else {
        debug!(date = ctx.date_key(), court_id, match_id, "swap on absent standby match");
        return Ok(false);
    };

    let mut standby: StandbyMatchEntity = document.decode()?;
    let team = match side {
        Side::TeamA => &mut standby.team_a,
        Side::TeamB => &mut standby.team_b,
    };
    team[index] = new_player.normalized();

    let mut fields = Fields::new();
    fields.insert(side.field().to_owned(), team_value(&path, team)?);
    if !ctx.store().update(path, fields).await? {
        debug!(date = ctx.date_key(), court_id, match_id, "standby match vanished before swap");
        return Ok(false);
    }
    info!(date = ctx.date_key(), court_id, match_id, ?side, index, "standby seat swapped");
    Ok(true)
}

/// Exchange the second players of both teams.
///
/// Returns `false` when the match is gone.
pub async fn swap_partners(
    ctx: &DayContext,
    court_id: &str,
    match_id: &str,
) -> Result<bool, ServiceError> {
    require_segment(court_id, "court id")?;
    require_segment(match_id, "match id")?;

    let path = ctx.paths().standby_match(court_id, match_id);
    let Some(document) = ctx.store().get(path.clone()).await? else {
        return Ok(false);
    };

    let mut standby: StandbyMatchEntity = document.decode()?;
    std::mem::swap(&mut standby.team_a[1], &mut standby.team_b[1]);

    let mut fields = Fields::new();
    fields.insert(
        Side::TeamA.field().to_owned(),
        team_value(&path, &standby.team_a)?,
    );
    fields.insert(
        Side::TeamB.field().to_owned(),
        team_value(&path, &standby.team_b)?,
    );
    if !ctx.store().update(path, fields).await? {
        debug!(date = ctx.date_key(), court_id, match_id, "standby match vanished before swap");
        return Ok(false);
    }
    info!(date = ctx.date_key(), court_id, match_id, "standby partners swapped");
    Ok(true)
}

fn team_value(path: &DocPath, team: &[Player; 2]) -> Result<Value, ServiceError> {
    serde_json::to_value(team).map_err(|source| StorageError::malformed(path.key(), source).into())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dao::{
        clock::ManualClock,
        document_store::{
            memory::MemoryDocumentStore,
            testing::{VanishingStore, queue, seat_ids},
        },
    };

    fn context(clock: Arc<ManualClock>) -> DayContext {
        let store = Arc::new(MemoryDocumentStore::new(clock.clone()));
        DayContext::new(store, clock, None, "2024-01-01")
    }

    #[tokio::test]
    async fn cross_pairs_four_oldest_players() {
        let clock = Arc::new(ManualClock::new(0));
        let ctx = context(clock.clone());
        queue(&ctx, &clock, &["p0", "p1", "p2", "p3"]).await;

        let created = randomize_into_standby(&ctx, 1, 2).await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].court_id, "court1");
        assert_eq!(seat_ids(&created[0].standby.team_a), ["p0", "p3"]);
        assert_eq!(seat_ids(&created[0].standby.team_b), ["p1", "p2"]);
        assert!(queue_service::list(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stops_when_pool_runs_short() {
        let clock = Arc::new(ManualClock::new(0));
        let ctx = context(clock.clone());
        let ids: Vec<String> = (0..11).map(|n| format!("p{n:02}")).collect();
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        queue(&ctx, &clock, &ids).await;

        let created = randomize_into_standby(&ctx, 3, 10).await.unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[1].court_id, "court2");
        assert_eq!(queue_service::list(&ctx).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn courts_wrap_around() {
        let clock = Arc::new(ManualClock::new(0));
        let ctx = context(clock.clone());
        let ids: Vec<String> = (0..12).map(|n| format!("p{n:02}")).collect();
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        queue(&ctx, &clock, &ids).await;

        let created = randomize_into_standby(&ctx, 3, 2).await.unwrap();
        let courts: Vec<&str> = created.iter().map(|m| m.court_id.as_str()).collect();
        assert_eq!(courts, ["court1", "court2", "court1"]);
        assert_eq!(list_standby(&ctx, "court1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn excluded_players_are_skipped() {
        let clock = Arc::new(ManualClock::new(0));
        let ctx = context(clock.clone());
        queue(&ctx, &clock, &["a", "b", "c", "d", "e"]).await;
        queue_service::toggle_exclusion(&ctx, "b").await.unwrap();

        let created = randomize_into_standby(&ctx, 1, 1).await.unwrap();
        assert_eq!(seat_ids(&created[0].standby.team_a), ["a", "e"]);
        assert_eq!(seat_ids(&created[0].standby.team_b), ["c", "d"]);

        let remaining = queue_service::list(&ctx).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "b");
    }

    #[tokio::test]
    async fn court_count_is_validated() {
        let ctx = context(Arc::new(ManualClock::new(0)));
        assert!(matches!(
            randomize_into_standby(&ctx, 1, 0).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            randomize_into_standby(&ctx, 1, 21).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn swap_replaces_one_seat() {
        let ctx = context(Arc::new(ManualClock::new(0)));
        let composed = create_standby(
            &ctx,
            "court1",
            [Player::new("a", "A", 1), Player::new("b", "B", 1)],
            [Player::new("c", "C", 1), Player::new("d", "D", 1)],
        )
        .await
        .unwrap();

        assert!(
            swap_player(&ctx, "court1", &composed.match_id, Side::TeamB, 1, Player::new("z", "", 0))
                .await
                .unwrap()
        );

        let listed = list_standby(&ctx, "court1").await.unwrap();
        assert_eq!(seat_ids(&listed[0].entity.team_a), ["a", "b"]);
        assert_eq!(seat_ids(&listed[0].entity.team_b), ["c", "z"]);
        assert_eq!(listed[0].entity.team_b[1].name, "Unknown");
    }

    #[tokio::test]
    async fn swap_on_missing_match_is_a_no_op() {
        let ctx = context(Arc::new(ManualClock::new(0)));
        assert!(
            !swap_player(&ctx, "court1", "gone", Side::TeamA, 0, Player::new("z", "Z", 1))
                .await
                .unwrap()
        );
        assert!(list_standby(&ctx, "court1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn swaps_never_resurrect_a_match_removed_mid_edit() {
        let clock = Arc::new(ManualClock::new(0));
        let inner = MemoryDocumentStore::new(clock.clone());
        let seeded = DayContext::new(Arc::new(inner.clone()), clock.clone(), None, "2024-01-01");
        let composed = create_standby(
            &seeded,
            "court1",
            [Player::new("a", "A", 1), Player::new("b", "B", 1)],
            [Player::new("c", "C", 1), Player::new("d", "D", 1)],
        )
        .await
        .unwrap();

        let racing = DayContext::new(Arc::new(VanishingStore::new(inner)), clock, None, "2024-01-01");
        assert!(
            !swap_player(&racing, "court1", &composed.match_id, Side::TeamA, 0, Player::new("z", "Z", 1))
                .await
                .unwrap()
        );
        assert!(list_standby(&seeded, "court1").await.unwrap().is_empty());

        let composed = create_standby(
            &seeded,
            "court1",
            [Player::new("a", "A", 1), Player::new("b", "B", 1)],
            [Player::new("c", "C", 1), Player::new("d", "D", 1)],
        )
        .await
        .unwrap();
        assert!(!swap_partners(&racing, "court1", &composed.match_id).await.unwrap());
        assert!(list_standby(&seeded, "court1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn players_leaving_mid_composition_keep_their_seat() {
        let clock = Arc::new(ManualClock::new(0));
        let inner = MemoryDocumentStore::new(clock.clone());
        let seeded = DayContext::new(Arc::new(inner.clone()), clock.clone(), None, "2024-01-01");
        queue(&seeded, &clock, &["p0", "p1", "p2", "p3"]).await;

        let racing = DayContext::new(
            Arc::new(VanishingStore::before_take(inner)),
            clock,
            None,
            "2024-01-01",
        );
        let created = randomize_into_standby(&racing, 1, 1).await.unwrap();

        assert_eq!(created.len(), 1);
        assert_eq!(seat_ids(&created[0].standby.team_a), ["p0", "p3"]);
        assert!(queue_service::list(&seeded).await.unwrap().is_empty());
        // nobody was popped, so no wait time was credited
        let stats = crate::services::stats_service::player_stats(&seeded).await.unwrap();
        assert!(stats.is_empty());
    }

    #[tokio::test]
    async fn seat_index_is_validated() {
        let ctx = context(Arc::new(ManualClock::new(0)));
        assert!(matches!(
            swap_player(&ctx, "court1", "m", Side::TeamA, 2, Player::new("z", "Z", 1)).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn partners_swap_second_seats() {
        let ctx = context(Arc::new(ManualClock::new(0)));
        let composed = create_standby(
            &ctx,
            "court2",
            [Player::new("a", "A", 1), Player::new("b", "B", 1)],
            [Player::new("c", "C", 1), Player::new("d", "D", 1)],
        )
        .await
        .unwrap();

        assert!(swap_partners(&ctx, "court2", &composed.match_id).await.unwrap());
        let listed = list_standby(&ctx, "court2").await.unwrap();
        assert_eq!(seat_ids(&listed[0].entity.team_a), ["a", "d"]);
        assert_eq!(seat_ids(&listed[0].entity.team_b), ["c", "b"]);

        assert!(cancel_standby(&ctx, "court2", &composed.match_id).await.unwrap());
        assert!(!swap_partners(&ctx, "court2", &composed.match_id).await.unwrap());
    }
}
