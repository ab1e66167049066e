mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use ai_registry::daemon::{build_router, AppState};

use common::{harness, Harness};

async fn app(token: &str) -> (Harness, Router) {
    let h = harness().await;
    let state = AppState {
        registry: h.registry.clone(),
        token: token.to_string(),
    };
    (h, build_router(state))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", "Bearer token");
    let body = match body {
        Some(body) => {
            builder = builder.header("content-type", "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn create_body(name: &str) -> Value {
    json!({
        "creator_address": "0xA",
        "name": name,
        "category": "assistant",
        "rag_contents": "hello",
        "rag_comments": "initial knowledge"
    })
}

#[tokio::test]
async fn health_and_auth() {
    let (_h, app) = app("token").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/ais")
                .header("content-type", "application/json")
                .body(Body::from(create_body("Bot1").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/ais")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_then_read_back() {
    let (h, app) = app("token").await;
    h.store.put_user("0xA", "alice").await.unwrap();

    let (status, created) = send(&app, "POST", "/ais", Some(create_body("Bot1"))).await;
    assert_eq!(status, StatusCode::CREATED);
    let ai_id = created["ai_id"].as_str().unwrap().to_string();
    assert_eq!(created["chat_counts"], 0);

    let (status, body) = send(&app, "GET", &format!("/ais/id/{ai_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Bot1");

    let (status, body) = send(&app, "GET", &format!("/ais/detail/{ai_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ai_id"], ai_id.as_str());
    assert_eq!(body["logs"].as_array().unwrap().len(), 1);
    assert_eq!(body["logs"][0]["comments"], "initial knowledge");

    let (status, body) = send(&app, "GET", &format!("/ais/{ai_id}/rags"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["logs"][0]["tx_hash"], "digest-1");

    let (status, body) = send(&app, "GET", "/ais/today", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ais"][0]["creator"], "alice");

    let (status, body) = send(&app, "GET", "/ais/search/bot", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ais"].as_array().unwrap().len(), 1);

    let (status, body) = send(&app, "GET", "/ais/user/0xA", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ais"][0]["ai_id"], ai_id.as_str());

    let (status, _) = send(&app, "POST", "/ais", Some(create_body("Bot1"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn error_statuses() {
    let (h, app) = app("token").await;

    let (status, body) = send(&app, "GET", "/ais/id/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));

    let (status, _) = send(&app, "GET", "/ais/detail/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/ais", Some(create_body("Bot1"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut bad = create_body("Bot1");
    bad["creator_address"] = json!("alice");
    let (status, _) = send(&app, "POST", "/ais", Some(bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    h.store.put_user("0xA", "alice").await.unwrap();
    h.chain
        .fail_blob
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let (status, body) = send(&app, "POST", "/ais", Some(create_body("Bot2"))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["lingering"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn usage_update_and_trending() {
    let (h, app) = app("token").await;
    h.store.put_user("0xA", "alice").await.unwrap();
    let (_, first) = send(&app, "POST", "/ais", Some(create_body("Bot1"))).await;
    let (_, second) = send(&app, "POST", "/ais", Some(create_body("Bot2"))).await;
    let second_id = second["ai_id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/ais/{second_id}/usage"),
        Some(json!({"weekly_users": 12, "chat_counts": 40})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["weekly_users"], 12);
    assert_eq!(body["prompt_tokens"], 0);

    let (status, body) = send(&app, "GET", "/ais/trend?offset=0&limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ais"][0]["ai_id"], second_id);
    assert_eq!(body["ais"][1]["ai_id"], first["ai_id"]);

    let (status, body) = send(&app, "GET", "/ais/trend?category=games", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["ais"].as_array().unwrap().is_empty());

    let (status, _) = send(
        &app,
        "PATCH",
        "/ais/missing/usage",
        Some(json!({"weekly_users": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn owner_update_and_delete() {
    let (h, app) = app("token").await;
    h.store.put_user("0xA", "alice").await.unwrap();
    let (_, created) = send(&app, "POST", "/ais", Some(create_body("Bot1"))).await;
    let ai_id = created["ai_id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "PUT",
        "/ais",
        Some(json!({"ai_id": ai_id, "creator_address": "0xB", "name": "Mine"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "PUT",
        "/ais",
        Some(json!({"ai_id": ai_id, "creator_address": "0xA", "image_url": "https://img.test/new.png"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["image_url"], "https://img.test/new.png");
    assert_eq!(body["name"], "Bot1");

    let (status, body) = send(
        &app,
        "DELETE",
        "/ais",
        Some(json!({"ai_id": ai_id, "creator_address": "0xA"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rag_logs"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "GET", &format!("/ais/id/{ai_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(h.index.deleted.lock().await.len(), 1);
}

#[tokio::test]
async fn empty_token_leaves_routes_open() {
    let (h, app) = app("").await;
    h.store.put_user("0xA", "alice").await.unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/ais")
                .header("content-type", "application/json")
                .body(Body::from(create_body("Bot1").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn failed_content_append_is_bad_gateway() {
    let (h, app) = app("token").await;
    h.store.put_user("0xA", "alice").await.unwrap();
    let (_, created) = send(&app, "POST", "/ais", Some(create_body("Bot1"))).await;
    let ai_id = created["ai_id"].as_str().unwrap();

    h.chain
        .fail_blob
        .store(true, std::sync::atomic::Ordering::SeqCst);
    h.index
        .fail_delete
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let (status, body) = send(
        &app,
        "PUT",
        "/ais",
        Some(json!({"ai_id": ai_id, "creator_address": "0xA", "contents": "more facts"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().starts_with("update of"));
    assert_eq!(body["lingering"].as_array().unwrap().len(), 1);
}
