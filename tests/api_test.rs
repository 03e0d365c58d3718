// Router-level tests for the HTTP surface. WebSocket streams are covered by
// the transport-free suites; these exercise the JSON handlers and status
// mapping.

use atlas::api::{create_router, AppState};
use atlas::world::WorldServer;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> (Router, Arc<WorldServer>) {
    let world = Arc::new(WorldServer::new());
    let app = create_router(AppState {
        world: Arc::clone(&world),
    });
    (app, world)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_push_then_get() {
    let (app, _) = test_app();

    let push = json_request(
        "POST",
        "/api/entities",
        json!({"changes": [{"id": "uav-1", "label": "watcher"}]}),
    );
    let response = app.clone().oneshot(push).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["accepted"], true);

    let get = Request::builder()
        .method("GET")
        .uri("/api/entities/uav-1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(get).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["entity"]["id"], "uav-1");
    assert_eq!(body["entity"]["label"], "watcher");
    // Lifetime was synthesized on acceptance
    assert!(body["entity"]["lifetime"]["from"].is_string());
}

#[tokio::test]
async fn test_get_missing_entity_is_404() {
    let (app, _) = test_app();

    let get = Request::builder()
        .method("GET")
        .uri("/api/entities/ghost")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(get).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("ghost"));
}

#[tokio::test]
async fn test_push_empty_id_is_400_and_aborts_batch() {
    let (app, world) = test_app();

    let push = json_request(
        "POST",
        "/api/entities",
        json!({"changes": [{"id": "ok"}, {"id": ""}]}),
    );
    let response = app.oneshot(push).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(world.head().is_empty());
}

#[tokio::test]
async fn test_push_malformed_body_is_rejected() {
    let (app, _) = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/entities")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_list_sorted_and_filtered() {
    let (app, _) = test_app();

    let push = json_request(
        "POST",
        "/api/entities",
        json!({"changes": [
            {"id": "c", "label": "x"},
            {"id": "a", "label": "x"},
            {"id": "b", "label": "y"}
        ]}),
    );
    let response = app.clone().oneshot(push).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let list_all = json_request("POST", "/api/entities/list", json!({}));
    let response = app.clone().oneshot(list_all).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let ids: Vec<&str> = body["entities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    let list_x = json_request(
        "POST",
        "/api/entities/list",
        json!({"filter": {"label": "x"}}),
    );
    let response = app.oneshot(list_x).await.unwrap();
    let body = body_json(response).await;
    let ids: Vec<&str> = body["entities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a", "c"]);
}

#[tokio::test]
async fn test_list_with_component_filter_uses_stable_tags() {
    let (app, _) = test_app();

    let push = json_request(
        "POST",
        "/api/entities",
        json!({"changes": [
            {"id": "pos", "geo": {"latitude": 1.0, "longitude": 2.0}},
            {"id": "bare"}
        ]}),
    );
    app.clone().oneshot(push).await.unwrap();

    // geo carries stable tag 11
    let list = json_request(
        "POST",
        "/api/entities/list",
        json!({"filter": {"component": [11]}}),
    );
    let response = app.oneshot(list).await.unwrap();
    let body = body_json(response).await;
    let entities = body["entities"].as_array().unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0]["id"], "pos");
}

#[tokio::test]
async fn test_healthz() {
    let (app, _) = test_app();

    let request = Request::builder()
        .method("GET")
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_change_kinds_on_the_wire() {
    // The numeric change-kind contract: invalid=0, updated=1, expired=2,
    // unobserved=3
    use atlas::entity::ChangeKind;
    for (kind, wire) in [
        (ChangeKind::Invalid, 0),
        (ChangeKind::Updated, 1),
        (ChangeKind::Expired, 2),
        (ChangeKind::Unobserved, 3),
    ] {
        assert_eq!(serde_json::to_value(kind).unwrap(), json!(wire));
    }
}
