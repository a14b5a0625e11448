//! A club day driven through the services over the in-memory store.

use std::sync::Arc;

use club_courts_back::{
    dao::{
        clock::ManualClock,
        document_store::{DocumentStore, memory::MemoryDocumentStore},
        models::Player,
        timestamp::Timestamp,
    },
    error::ServiceError,
    services::{
        court_service::{self, MatchToStart},
        match_composer, queue_service, stats_service,
    },
    state::DayContext,
};

const DAY: &str = "2024-01-01";

struct Day {
    clock: Arc<ManualClock>,
    store: Arc<MemoryDocumentStore>,
    ctx: DayContext,
}

fn day(start_ms: i64) -> Day {
    let clock = Arc::new(ManualClock::new(start_ms));
    let store = Arc::new(MemoryDocumentStore::new(clock.clone()));
    let ctx = DayContext::new(store.clone(), clock.clone(), None, DAY);
    Day { clock, store, ctx }
}

fn player(id: &str) -> Player {
    Player::new(id, id.to_uppercase(), 3)
}

async fn queued_ids(ctx: &DayContext) -> Vec<String> {
    queue_service::list(ctx)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.id)
        .collect()
}

async fn join_all(day: &Day, ids: &[&str]) {
    for id in ids {
        queue_service::join(&day.ctx, player(id)).await.unwrap();
        day.clock.advance(1_000);
    }
}

#[tokio::test]
async fn queue_order_follows_join_time() {
    let day = day(0);
    join_all(&day, &["c", "a", "b"]).await;
    assert_eq!(queued_ids(&day.ctx).await, ["c", "a", "b"]);
}

#[tokio::test]
async fn joining_twice_keeps_one_entry() {
    let day = day(0);
    join_all(&day, &["a", "a"]).await;
    assert_eq!(queued_ids(&day.ctx).await, ["a"]);
}

#[tokio::test]
async fn pop_removes_exactly_once() {
    let day = day(0);
    join_all(&day, &["a", "b"]).await;

    assert!(queue_service::pop(&day.ctx, "a").await.unwrap().is_some());
    assert_eq!(queued_ids(&day.ctx).await, ["b"]);
    assert!(queue_service::pop(&day.ctx, "a").await.unwrap().is_none());
    assert_eq!(queued_ids(&day.ctx).await, ["b"]);
}

#[tokio::test]
async fn composer_leaves_the_remainder_queued() {
    let day = day(0);
    let ids: Vec<String> = (0..11).map(|n| format!("p{n:02}")).collect();
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
    join_all(&day, &ids).await;

    let created = match_composer::randomize_into_standby(&day.ctx, 3, 2)
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(queued_ids(&day.ctx).await, ["p08", "p09", "p10"]);

    let courts: Vec<&str> = created.iter().map(|m| m.court_id.as_str()).collect();
    assert_eq!(courts, ["court1", "court2"]);
}

#[tokio::test]
async fn composer_pairs_first_with_last() {
    let day = day(0);
    join_all(&day, &["p0", "p1", "p2", "p3"]).await;

    let created = match_composer::randomize_into_standby(&day.ctx, 1, 10)
        .await
        .unwrap();
    let standby = &created[0].standby;
    assert_eq!(standby.team_a.clone().map(|p| p.id), ["p0", "p3"]);
    assert_eq!(standby.team_b.clone().map(|p| p.id), ["p1", "p2"]);
}

#[tokio::test]
async fn finishing_an_empty_court_changes_nothing() {
    let day = day(0);
    let err = court_service::finish(&day.ctx, "court1").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    assert!(court_service::history(&day.ctx, "court1").await.unwrap().is_empty());
    assert!(stats_service::player_stats(&day.ctx).await.unwrap().is_empty());
    assert!(stats_service::court_stats(&day.ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn play_time_is_credited_to_players_and_court() {
    let day = day(10_000);
    let to_start = MatchToStart {
        standby_id: None,
        team_a: [player("a"), player("d")],
        team_b: [player("b"), player("c")],
    };
    court_service::start(&day.ctx, "court2", to_start).await.unwrap();
    day.clock.advance(42_000);
    court_service::finish(&day.ctx, "court2").await.unwrap();

    for id in ["a", "b", "c", "d"] {
        let stats = stats_service::player_stats_for(&day.ctx, id).await.unwrap();
        assert_eq!(stats.games, 1);
        assert_eq!(stats.play_time_ms_total, 42_000);
    }
    let courts = stats_service::court_stats(&day.ctx).await.unwrap();
    assert_eq!(courts.len(), 1);
    assert_eq!(courts[0].id, "court2");
    assert_eq!(courts[0].entity.play_time_ms_total, 42_000);
}

#[tokio::test]
async fn clock_skew_never_decreases_counters() {
    let day = day(0);
    let players = [player("a"), player("b"), player("c"), player("d")];
    let credited = stats_service::credit_play(
        &day.ctx,
        &players,
        Timestamp::from_millis(5_000),
        Timestamp::from_millis(1_000),
    )
    .await
    .unwrap();
    assert_eq!(credited, 0);

    let stats = stats_service::player_stats_for(&day.ctx, "a").await.unwrap();
    assert_eq!(stats.games, 1);
    assert_eq!(stats.play_time_ms_total, 0);
}

#[tokio::test]
async fn full_day_scenario() {
    let day = day(0);
    join_all(&day, &["A", "B", "C", "D", "E"]).await;

    let created = match_composer::randomize_into_standby(&day.ctx, 1, 2)
        .await
        .unwrap();
    assert_eq!(created.len(), 1);
    let composed = &created[0];
    assert_eq!(composed.court_id, "court1");
    assert_eq!(composed.standby.team_a.clone().map(|p| p.id), ["A", "D"]);
    assert_eq!(composed.standby.team_b.clone().map(|p| p.id), ["B", "C"]);
    assert_eq!(queued_ids(&day.ctx).await, ["E"]);

    court_service::start(
        &day.ctx,
        "court1",
        MatchToStart {
            standby_id: Some(composed.match_id.clone()),
            team_a: composed.standby.team_a.clone(),
            team_b: composed.standby.team_b.clone(),
        },
    )
    .await
    .unwrap();
    assert!(match_composer::list_standby(&day.ctx, "court1").await.unwrap().is_empty());

    day.clock.advance(600_000);
    court_service::finish(&day.ctx, "court1").await.unwrap();

    for id in ["A", "B", "C", "D"] {
        let stats = stats_service::player_stats_for(&day.ctx, id).await.unwrap();
        assert_eq!(stats.games, 1);
        assert_eq!(stats.play_time_ms_total, 600_000);
        assert!(stats.wait_time_ms_total > 0);
    }
    let untouched = stats_service::player_stats_for(&day.ctx, "E").await.unwrap();
    assert_eq!(untouched.games, 0);
    assert_eq!(untouched.play_time_ms_total, 0);
}

#[tokio::test]
async fn excluded_players_stay_queued_but_are_not_composed() {
    let day = day(0);
    join_all(&day, &["a", "b", "c", "d", "e"]).await;
    assert!(queue_service::toggle_exclusion(&day.ctx, "b").await.unwrap());

    let created = match_composer::randomize_into_standby(&day.ctx, 1, 1)
        .await
        .unwrap();
    let seated: Vec<String> = created[0]
        .standby
        .team_a
        .iter()
        .chain(&created[0].standby.team_b)
        .map(|p| p.id.clone())
        .collect();
    assert!(!seated.contains(&"b".to_owned()));
    assert_eq!(queued_ids(&day.ctx).await, ["b"]);
}

#[tokio::test]
async fn swapping_a_seat_of_a_started_match_is_a_no_op() {
    let day = day(0);
    let composed = match_composer::create_standby(
        &day.ctx,
        "court1",
        [player("a"), player("d")],
        [player("b"), player("c")],
    )
    .await
    .unwrap();
    court_service::start(
        &day.ctx,
        "court1",
        MatchToStart {
            standby_id: Some(composed.match_id.clone()),
            team_a: composed.standby.team_a.clone(),
            team_b: composed.standby.team_b.clone(),
        },
    )
    .await
    .unwrap();

    let swapped = match_composer::swap_player(
        &day.ctx,
        "court1",
        &composed.match_id,
        match_composer::Side::TeamA,
        0,
        player("z"),
    )
    .await
    .unwrap();
    assert!(!swapped);
    assert!(match_composer::list_standby(&day.ctx, "court1").await.unwrap().is_empty());
}

#[tokio::test]
async fn store_outage_surfaces_as_unavailable() {
    let day = day(0);
    day.store.set_offline(true);
    let err = queue_service::join(&day.ctx, player("a")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));

    day.store.set_offline(false);
    assert!(day.store.health_check().await.is_ok());
}
