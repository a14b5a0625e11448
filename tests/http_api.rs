//! Router-level checks over the in-memory store.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use club_courts_back::{
    config::AppConfig,
    dao::{clock::ManualClock, document_store::memory::MemoryDocumentStore},
    routes::{self, GROUP_HEADER},
    state::{AppState, SharedState},
};

async fn app() -> (Router, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_000));
    let state: SharedState = AppState::with_clock(AppConfig::default(), clock.clone());
    state
        .install_store(Arc::new(MemoryDocumentStore::new(clock.clone())))
        .await;
    (routes::router(state), clock)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    call_as(app, method, uri, body, None).await
}

async fn call_as(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    group: Option<&str>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(group) = group {
        request = request.header(GROUP_HEADER, group);
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn player(id: &str) -> Value {
    json!({"id": id, "name": id.to_uppercase(), "level": 2})
}

#[tokio::test]
async fn healthcheck_reports_ok() {
    let (app, _) = app().await;
    let (status, body) = call(&app, Method::GET, "/healthcheck", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["courtCount"], 10);
}

#[tokio::test]
async fn degraded_backend_answers_503() {
    let state = AppState::new(AppConfig::default());
    let app = routes::router(state);
    let (status, _) = call(&app, Method::GET, "/days/2024-01-01/queue", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = call(&app, Method::GET, "/healthcheck", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn join_then_list_queue() {
    let (app, _) = app().await;
    let (status, body) = call(&app, Method::POST, "/days/2024-01-01/queue", Some(player("a"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["created"], true);

    let (status, body) = call(&app, Method::POST, "/days/2024-01-01/queue", Some(player("a"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], false);

    let (_, body) = call(&app, Method::GET, "/days/2024-01-01/queue", None).await;
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], "a");
    assert_eq!(entries[0]["player"]["name"], "A");
    assert_eq!(entries[0]["joinedAt"], json!({"seconds": 1, "nanoseconds": 0}));
}

#[tokio::test]
async fn malformed_input_is_rejected() {
    let (app, _) = app().await;
    let (status, _) = call(&app, Method::GET, "/days/2024-13-01/queue", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::PUT,
        "/settings/courts",
        Some(json!({"courtCount": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn groups_are_isolated() {
    let (app, _) = app().await;
    call_as(
        &app,
        Method::POST,
        "/days/2024-01-01/queue",
        Some(player("a")),
        Some("club-a"),
    )
    .await;

    let (_, body) = call_as(&app, Method::GET, "/days/2024-01-01/queue", None, Some("club-b")).await;
    assert_eq!(body, json!([]));
    let (_, body) = call_as(&app, Method::GET, "/days/2024-01-01/queue", None, Some("club-a")).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn court_session_round_trip() {
    let (app, clock) = app().await;
    for id in ["a", "b", "c", "d"] {
        call(&app, Method::POST, "/days/2024-01-01/queue", Some(player(id))).await;
    }

    let (status, body) = call(
        &app,
        Method::POST,
        "/days/2024-01-01/standby/randomize",
        Some(json!({"matchesToCreate": 1, "courtCount": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let composed = &body[0];
    assert_eq!(composed["courtId"], "court1");
    let match_id = composed["matchId"].as_str().unwrap().to_owned();

    let start = json!({
        "matchId": match_id,
        "teamA": composed["teamA"],
        "teamB": composed["teamB"],
    });
    let (status, live) = call(
        &app,
        Method::POST,
        "/days/2024-01-01/courts/court1/start",
        Some(start),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(live["state"], "live");

    let (status, _) = call(
        &app,
        Method::POST,
        "/days/2024-01-01/courts/court1/start",
        Some(json!({"teamA": composed["teamA"], "teamB": composed["teamB"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    clock.advance(30_000);
    let (status, finished) = call(&app, Method::POST, "/days/2024-01-01/courts/court1/finish", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(finished["state"], "finished");
    assert_eq!(finished["durationMs"], 30_000);

    let (status, _) = call(&app, Method::POST, "/days/2024-01-01/courts/court1/finish", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, history) = call(&app, Method::GET, "/days/2024-01-01/courts/court1/history", None).await;
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (_, stats) = call(&app, Method::GET, "/days/2024-01-01/stats/players", None).await;
    assert_eq!(stats.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn court_count_setting_round_trip() {
    let (app, _) = app().await;
    let (_, body) = call(&app, Method::GET, "/settings/courts", None).await;
    assert_eq!(body["courtCount"], 10);

    let (status, body) = call(
        &app,
        Method::PUT,
        "/settings/courts",
        Some(json!({"courtCount": 6})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["courtCount"], 6);
}

#[tokio::test]
async fn members_and_attendance_feed_candidates() {
    let (app, _) = app().await;
    let (status, member) = call(
        &app,
        Method::POST,
        "/members",
        Some(json!({"name": "Bo", "level": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let member_id = member["id"].as_str().unwrap().to_owned();

    let (status, _) = call(
        &app,
        Method::PATCH,
        &format!("/members/{member_id}"),
        Some(json!({"todayCheckedIn": true})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(
        &app,
        Method::PATCH,
        "/members/ghost",
        Some(json!({"todayCheckedIn": true})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, candidates) = call(&app, Method::GET, "/days/2024-01-01/candidates", None).await;
    assert_eq!(candidates[0]["id"], member_id.as_str());

    let (status, listed) = call(
        &app,
        Method::PUT,
        "/days/2024-01-01/attendees",
        Some(json!({"players": [{"id": "p1", "name": "Ana", "level": 1}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = call(
        &app,
        Method::PUT,
        "/days/2024-01-01/attendees/p1/arrived",
        Some(json!({"arrived": true})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, attendees) = call(&app, Method::GET, "/days/2024-01-01/attendees", None).await;
    assert_eq!(attendees[0]["arrived"], true);
    let (_, candidates) = call(&app, Method::GET, "/days/2024-01-01/candidates", None).await;
    let ids: Vec<_> = candidates
        .as_array()
        .unwrap()
        .iter()
        .map(|player| player["id"].clone())
        .collect();
    assert_eq!(ids, [json!("p1")]);
}
