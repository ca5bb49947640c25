use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

use handovr::config::Config;
use handovr::geo::NoopGeoResolver;
use handovr::models::Role;
use handovr::state::SharedState;

async fn spawn_app() -> (Router, Arc<SharedState>) {
    let mut config = Config::default();
    config.database.url = "sqlite::memory:".to_string();

    let shared = Arc::new(
        SharedState::with_geo_resolver(config, Arc::new(NoopGeoResolver))
            .await
            .expect("Failed to create shared state"),
    );

    let state = handovr::api::create_app_state(shared.clone());
    let app = handovr::api::router(state).await;

    (app, shared)
}

async fn login(app: &Router, shared: &SharedState, email: &str, role: Role) -> String {
    let hash = handovr::auth::password::hash("a-password-123").await.unwrap();
    shared
        .store
        .user_repo()
        .create(email, &hash, role)
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "email": email, "password": "a-password-123" })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    body["data"]["tokens"]["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"));

    let request = match body {
        Some(json) => {
            builder = builder.header("Content-Type", "application/json");
            builder.body(Body::from(json.to_string())).unwrap()
        }
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn my_sessions_lazily_creates_the_shared_bundle() {
    let (app, shared) = spawn_app().await;
    let token = login(&app, &shared, "user@x.test", Role::User).await;

    let (status, body) = request(&app, "GET", "/api/v1/sessions/my-sessions", &token, None).await;

    assert_eq!(status, StatusCode::OK);
    let bundles = body["data"].as_array().unwrap();
    assert_eq!(bundles.len(), 1);
    assert_eq!(bundles[0]["status"], "pending");
    assert_eq!(bundles[0]["bundle_version"], 0);
    // Masquerades as assigned to the caller
    assert!(bundles[0]["assigned_to"].is_number());
}

#[tokio::test]
async fn full_upload_download_lifecycle() {
    // Scenario S4.
    let (app, shared) = spawn_app().await;
    let operator = login(&app, &shared, "op@x.test", Role::Operator).await;
    let user = login(&app, &shared, "user@x.test", Role::User).await;

    let (_, body) = request(&app, "GET", "/api/v1/sessions/my-sessions", &user, None).await;
    let bundle_id = body["data"][0]["id"].as_i64().unwrap();

    // Downloads are refused before anything is uploaded
    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/v1/sessions/{bundle_id}/request-download"),
        &user,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Operator requests an upload URL
    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/v1/sessions/{bundle_id}/request-upload"),
        &operator,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let first_key = body["data"]["bundle_key"].as_str().unwrap().to_string();
    assert!(body["data"]["url"].as_str().unwrap().contains("X-Amz-Signature="));
    assert!(first_key.contains("/v1-"));

    // State has not advanced yet
    let bundle = shared.store.bundle_repo().get(bundle_id as i32).await.unwrap().unwrap();
    assert_eq!(bundle.status, "pending");

    // Completion promotes the issued key and bumps the version
    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/v1/sessions/{bundle_id}/complete-upload"),
        &operator,
        Some(serde_json::json!({ "checksum": "abc123", "file_size_bytes": 12345 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ready");
    assert_eq!(body["data"]["bundle_version"], 1);
    assert_eq!(body["data"]["bundle_key"], first_key.as_str());

    // A regular user's download URL references the same key
    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/v1/sessions/{bundle_id}/request-download"),
        &user,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["bundle_key"], first_key.as_str());
    assert!(body["data"]["url"].as_str().unwrap().contains(&first_key));
    assert_eq!(body["data"]["expires_in_seconds"], 900);

    // Two download URLs in succession reference the same key
    let (_, body_again) = request(
        &app,
        "POST",
        &format!("/api/v1/sessions/{bundle_id}/request-download"),
        &user,
        None,
    )
    .await;
    assert_eq!(body_again["data"]["bundle_key"], first_key.as_str());

    // A second capture produces a new key and version 2
    let (_, body) = request(
        &app,
        "POST",
        &format!("/api/v1/sessions/{bundle_id}/request-upload"),
        &operator,
        None,
    )
    .await;
    let second_key = body["data"]["bundle_key"].as_str().unwrap().to_string();
    assert_ne!(second_key, first_key);
    assert!(second_key.contains("/v2-"));

    let (_, body) = request(
        &app,
        "POST",
        &format!("/api/v1/sessions/{bundle_id}/complete-upload"),
        &operator,
        Some(serde_json::json!({ "checksum": "def456", "file_size_bytes": 23456 })),
    )
    .await;
    assert_eq!(body["data"]["bundle_version"], 2);

    let (_, body) = request(
        &app,
        "POST",
        &format!("/api/v1/sessions/{bundle_id}/request-download"),
        &user,
        None,
    )
    .await;
    assert_eq!(body["data"]["bundle_key"], second_key.as_str());
}

#[tokio::test]
async fn version_increments_equal_completed_uploads() {
    let (app, shared) = spawn_app().await;
    let operator = login(&app, &shared, "op@x.test", Role::Operator).await;

    let (_, body) = request(&app, "GET", "/api/v1/sessions/my-sessions", &operator, None).await;
    let bundle_id = body["data"][0]["id"].as_i64().unwrap();

    for expected_version in 1..=3 {
        request(
            &app,
            "POST",
            &format!("/api/v1/sessions/{bundle_id}/request-upload"),
            &operator,
            None,
        )
        .await;

        let (_, body) = request(
            &app,
            "POST",
            &format!("/api/v1/sessions/{bundle_id}/complete-upload"),
            &operator,
            Some(serde_json::json!({ "file_size_bytes": 1000 })),
        )
        .await;
        assert_eq!(body["data"]["bundle_version"], expected_version);
    }
}

#[tokio::test]
async fn complete_upload_without_a_request_conflicts() {
    let (app, shared) = spawn_app().await;
    let operator = login(&app, &shared, "op@x.test", Role::Operator).await;

    let (_, body) = request(&app, "GET", "/api/v1/sessions/my-sessions", &operator, None).await;
    let bundle_id = body["data"][0]["id"].as_i64().unwrap();

    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/v1/sessions/{bundle_id}/complete-upload"),
        &operator,
        Some(serde_json::json!({ "file_size_bytes": 1000 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn plain_users_cannot_request_uploads() {
    let (app, shared) = spawn_app().await;
    let user = login(&app, &shared, "user@x.test", Role::User).await;

    let (_, body) = request(&app, "GET", "/api/v1/sessions/my-sessions", &user, None).await;
    let bundle_id = body["data"][0]["id"].as_i64().unwrap();

    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/v1/sessions/{bundle_id}/request-upload"),
        &user,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn mark_ready_requires_an_object_key() {
    let (app, shared) = spawn_app().await;
    let root = login(&app, &shared, "root@x.test", Role::OperatorRoot).await;

    let (_, body) = request(&app, "GET", "/api/v1/sessions/my-sessions", &root, None).await;
    let bundle_id = body["data"][0]["id"].as_i64().unwrap();

    // No key on the row yet
    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/v1/sessions/{bundle_id}/mark-ready"),
        &root,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Out-of-band upload: set the key via admin PATCH, then force ready
    let (status, _) = request(
        &app,
        "PATCH",
        &format!("/api/v1/sessions/{bundle_id}"),
        &root,
        Some(serde_json::json!({ "bundle_key": "bundles/out-of-band.zip" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/v1/sessions/{bundle_id}/mark-ready"),
        &root,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ready");
}

#[tokio::test]
async fn client_events_are_recorded_and_listable() {
    let (app, shared) = spawn_app().await;
    let user = login(&app, &shared, "user@x.test", Role::User).await;
    let support = login(&app, &shared, "support@x.test", Role::Support).await;

    let (_, body) = request(&app, "GET", "/api/v1/sessions/my-sessions", &user, None).await;
    let bundle_id = body["data"][0]["id"].as_i64().unwrap();

    let (status, _) = request(
        &app,
        "POST",
        &format!("/api/v1/sessions/{bundle_id}/events"),
        &user,
        Some(serde_json::json!({
            "level": "error",
            "message": "proxy authentication failed",
            "context": { "host": "proxy.example.com" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(
        &app,
        "GET",
        &format!("/api/v1/sessions/{bundle_id}/events"),
        &support,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let events = body["data"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["message"], "proxy authentication failed");
}

#[tokio::test]
async fn shared_stats_reflect_download_issuances() {
    let (app, shared) = spawn_app().await;
    let operator = login(&app, &shared, "op@x.test", Role::Operator).await;
    let support = login(&app, &shared, "support@x.test", Role::Support).await;

    let (_, body) = request(&app, "GET", "/api/v1/sessions/my-sessions", &operator, None).await;
    let bundle_id = body["data"][0]["id"].as_i64().unwrap();

    request(
        &app,
        "POST",
        &format!("/api/v1/sessions/{bundle_id}/request-upload"),
        &operator,
        None,
    )
    .await;
    request(
        &app,
        "POST",
        &format!("/api/v1/sessions/{bundle_id}/complete-upload"),
        &operator,
        Some(serde_json::json!({ "file_size_bytes": 5000 })),
    )
    .await;

    for _ in 0..2 {
        request(
            &app,
            "POST",
            &format!("/api/v1/sessions/{bundle_id}/request-download"),
            &operator,
            None,
        )
        .await;
    }

    let (status, body) = request(&app, "GET", "/api/v1/sessions/shared-stats", &support, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["download_count"], 2);
    assert_eq!(body["data"]["bundle_version"], 1);
    assert_eq!(body["data"]["status"], "ready");
}
