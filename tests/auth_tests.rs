use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

use handovr::config::Config;
use handovr::geo::{GeoResolver, Location};
use handovr::models::Role;
use handovr::state::SharedState;

const CHROME_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const CHROME_WIN: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const NEW_YORK_IP: &str = "1.2.3.4";
const SAN_FRANCISCO_IP: &str = "5.6.7.8";

struct StubGeo;

#[async_trait::async_trait]
impl GeoResolver for StubGeo {
    async fn resolve(&self, ip: &str) -> Option<Location> {
        match ip {
            NEW_YORK_IP => Some(Location::new("New York", "United States", 40.71, -74.01)),
            SAN_FRANCISCO_IP => Some(Location::new(
                "San Francisco",
                "United States",
                37.77,
                -122.42,
            )),
            _ => None,
        }
    }
}

async fn spawn_app() -> (Router, Arc<SharedState>) {
    let mut config = Config::default();
    config.database.url = "sqlite::memory:".to_string();

    let shared = Arc::new(
        SharedState::with_geo_resolver(config, Arc::new(StubGeo))
            .await
            .expect("Failed to create shared state"),
    );

    let state = handovr::api::create_app_state(shared.clone());
    let app = handovr::api::router(state).await;

    (app, shared)
}

async fn create_user(shared: &SharedState, email: &str, password: &str, role: Role) -> i32 {
    let hash = handovr::auth::password::hash(password).await.unwrap();
    let user = shared
        .store
        .user_repo()
        .create(email, &hash, role)
        .await
        .unwrap();
    user.id
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login_from(
    app: &Router,
    email: &str,
    password: &str,
    ip: &str,
    user_agent: &str,
) -> (StatusCode, serde_json::Value) {
    let body = serde_json::json!({ "email": email, "password": password });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/login")
                .header("Content-Type", "application/json")
                .header("x-forwarded-for", ip)
                .header("user-agent", user_agent)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    (status, body_json(response).await)
}

async fn get_with_token(app: &Router, uri: &str, token: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    (status, body_json(response).await)
}

fn access_token(login_body: &serde_json::Value) -> String {
    login_body["data"]["tokens"]["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

fn refresh_token(login_body: &serde_json::Value) -> String {
    login_body["data"]["tokens"]["refresh_token"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn login_returns_user_and_tokens() {
    let (app, shared) = spawn_app().await;
    create_user(&shared, "alice@x.test", "correct horse", Role::User).await;

    let (status, body) =
        login_from(&app, "alice@x.test", "correct horse", NEW_YORK_IP, CHROME_MAC).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], "alice@x.test");
    assert_eq!(body["data"]["user"]["role"], "user");
    assert!(!access_token(&body).is_empty());
    assert!(!refresh_token(&body).is_empty());
}

#[tokio::test]
async fn unknown_email_and_bad_password_are_indistinguishable() {
    let (app, shared) = spawn_app().await;
    create_user(&shared, "alice@x.test", "correct horse", Role::User).await;

    let (status_unknown, body_unknown) =
        login_from(&app, "nobody@x.test", "whatever", NEW_YORK_IP, CHROME_MAC).await;
    let (status_wrong, body_wrong) =
        login_from(&app, "alice@x.test", "wrong password", NEW_YORK_IP, CHROME_MAC).await;

    assert_eq!(status_unknown, StatusCode::UNAUTHORIZED);
    assert_eq!(status_wrong, StatusCode::UNAUTHORIZED);
    assert_eq!(body_unknown["error"], body_wrong["error"]);
}

#[tokio::test]
async fn failed_attempts_land_in_history_but_unknown_emails_do_not() {
    let (app, shared) = spawn_app().await;
    let alice = create_user(&shared, "alice@x.test", "correct horse", Role::User).await;

    login_from(&app, "alice@x.test", "bad", NEW_YORK_IP, CHROME_MAC).await;
    login_from(&app, "ghost@x.test", "bad", NEW_YORK_IP, CHROME_MAC).await;

    let history = shared
        .store
        .login_history_repo()
        .for_user(alice, 50)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].success);
    assert_eq!(history[0].failure_reason.as_deref(), Some("bad_password"));

    // The unknown email surfaces as a system-scoped alert instead
    let alerts = shared
        .store
        .alert_repo()
        .list(handovr::db::AlertFilter::default())
        .await
        .unwrap();
    assert!(
        alerts
            .iter()
            .any(|a| a.alert_type == "unknown_email" && a.user_id.is_none())
    );
}

#[tokio::test]
async fn repeated_failures_escalate_alert_severity() {
    let (app, shared) = spawn_app().await;
    let alice = create_user(&shared, "alice@x.test", "correct horse", Role::User).await;

    for _ in 0..6 {
        login_from(&app, "alice@x.test", "wrong", NEW_YORK_IP, CHROME_MAC).await;
    }

    let alerts = shared
        .store
        .alert_repo()
        .list(handovr::db::AlertFilter {
            user_id: Some(alice),
            ..Default::default()
        })
        .await
        .unwrap();

    let failed: Vec<_> = alerts
        .iter()
        .filter(|a| a.alert_type == "failed_login")
        .collect();
    assert_eq!(failed.len(), 6);
    // list() is newest-first: early attempts are MEDIUM, the tail is HIGH
    assert_eq!(failed.last().unwrap().severity, "MEDIUM");
    assert_eq!(failed.first().unwrap().severity, "HIGH");
}

#[tokio::test]
async fn displaced_session_rejected_with_stable_reason() {
    // Scenario S1: a second login signs out the first device.
    let (app, shared) = spawn_app().await;
    let alice = create_user(&shared, "alice@x.test", "correct horse", Role::User).await;

    let (_, first) =
        login_from(&app, "alice@x.test", "correct horse", NEW_YORK_IP, CHROME_MAC).await;
    let t1 = access_token(&first);

    let (status, body) = get_with_token(&app, "/api/v1/auth/session-status", &t1).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], true);

    let (_, second) = login_from(
        &app,
        "alice@x.test",
        "correct horse",
        SAN_FRANCISCO_IP,
        CHROME_WIN,
    )
    .await;
    let t2 = access_token(&second);
    assert_ne!(t1, t2);

    let (status, body) = get_with_token(&app, "/api/v1/auth/session-status", &t1).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["reason"], "logged_out_from_another_device");

    let (status, _) = get_with_token(&app, "/api/v1/auth/session-status", &t2).await;
    assert_eq!(status, StatusCode::OK);

    let alerts = shared
        .store
        .alert_repo()
        .list(handovr::db::AlertFilter {
            user_id: Some(alice),
            ..Default::default()
        })
        .await
        .unwrap();

    let displaced: Vec<_> = alerts
        .iter()
        .filter(|a| a.alert_type == "multiple_device_login")
        .collect();
    assert_eq!(displaced.len(), 1);
    assert_eq!(displaced[0].severity, "MEDIUM");
}

#[tokio::test]
async fn implausible_travel_raises_a_high_alert() {
    // Scenario S2: New York to San Francisco with no elapsed time.
    let (app, shared) = spawn_app().await;
    let alice = create_user(&shared, "alice@x.test", "correct horse", Role::User).await;

    login_from(&app, "alice@x.test", "correct horse", NEW_YORK_IP, CHROME_MAC).await;
    login_from(
        &app,
        "alice@x.test",
        "correct horse",
        SAN_FRANCISCO_IP,
        CHROME_WIN,
    )
    .await;

    let alerts = shared
        .store
        .alert_repo()
        .list(handovr::db::AlertFilter {
            user_id: Some(alice),
            ..Default::default()
        })
        .await
        .unwrap();

    let suspicious: Vec<_> = alerts
        .iter()
        .filter(|a| a.alert_type == "suspicious_location")
        .collect();
    assert_eq!(suspicious.len(), 1);
    assert_eq!(suspicious[0].severity, "HIGH");

    // S1's multiple-device alert exists alongside it
    assert!(
        alerts
            .iter()
            .any(|a| a.alert_type == "multiple_device_login")
    );
}

#[tokio::test]
async fn at_most_one_active_session_and_token_matches_it() {
    // Scenario S6, sequential flavor: SQLite serializes the two logins and
    // the last committer wins.
    let (app, shared) = spawn_app().await;
    let alice = create_user(&shared, "alice@x.test", "correct horse", Role::User).await;

    let (_, first) =
        login_from(&app, "alice@x.test", "correct horse", NEW_YORK_IP, CHROME_MAC).await;
    let (_, second) = login_from(
        &app,
        "alice@x.test",
        "correct horse",
        SAN_FRANCISCO_IP,
        CHROME_WIN,
    )
    .await;

    let loser = access_token(&first);
    let winner = access_token(&second);

    assert_eq!(
        shared
            .store
            .session_activity_repo()
            .count_active(alice)
            .await
            .unwrap(),
        1
    );

    let user = shared.store.user_repo().get_by_id(alice).await.unwrap().unwrap();
    assert_eq!(user.current_session_token.as_deref(), Some(winner.as_str()));
    assert_ne!(user.current_session_token.as_deref(), Some(loser.as_str()));

    let active = shared
        .store
        .session_activity_repo()
        .active_for_user(alice)
        .await
        .unwrap();
    assert_eq!(active[0].session_token, winner);
}

#[tokio::test]
async fn refresh_rotates_tokens_and_displaces_the_old_access_token() {
    // Scenario S5.
    let (app, shared) = spawn_app().await;
    let alice = create_user(&shared, "alice@x.test", "correct horse", Role::User).await;

    let (_, login) =
        login_from(&app, "alice@x.test", "correct horse", NEW_YORK_IP, CHROME_MAC).await;
    let t1 = access_token(&login);
    let r1 = refresh_token(&login);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/refresh")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "refresh_token": r1 }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let t1b = body["data"]["tokens"]["access_token"].as_str().unwrap().to_string();
    assert_ne!(t1, t1b);

    let user = shared.store.user_repo().get_by_id(alice).await.unwrap().unwrap();
    assert_eq!(user.current_session_token.as_deref(), Some(t1b.as_str()));

    // The activity row survives the rotation with its token rewritten
    let active = shared
        .store
        .session_activity_repo()
        .active_for_user(alice)
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].session_token, t1b);

    let (status, _) = get_with_token(&app, "/api/v1/auth/session-status", &t1).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get_with_token(&app, "/api/v1/auth/session-status", &t1b).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_with_garbage_is_rejected() {
    let (app, _shared) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/refresh")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "refresh_token": "garbage" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn an_access_token_does_not_pass_as_a_refresh_token() {
    let (app, shared) = spawn_app().await;
    create_user(&shared, "alice@x.test", "correct horse", Role::User).await;

    let (_, login) =
        login_from(&app, "alice@x.test", "correct horse", NEW_YORK_IP, CHROME_MAC).await;
    let t1 = access_token(&login);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/refresh")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "refresh_token": t1 }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_clears_the_session() {
    let (app, shared) = spawn_app().await;
    let alice = create_user(&shared, "alice@x.test", "correct horse", Role::User).await;

    let (_, login) =
        login_from(&app, "alice@x.test", "correct horse", NEW_YORK_IP, CHROME_MAC).await;
    let t1 = access_token(&login);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/logout")
                .header("Authorization", format!("Bearer {t1}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let user = shared.store.user_repo().get_by_id(alice).await.unwrap().unwrap();
    assert!(user.current_session_token.is_none());
    assert_eq!(
        shared
            .store
            .session_activity_repo()
            .count_active(alice)
            .await
            .unwrap(),
        0
    );

    let sessions = shared
        .store
        .session_activity_repo()
        .for_user(alice, false, 10)
        .await
        .unwrap();
    assert_eq!(sessions[0].logout_reason.as_deref(), Some("manual"));
}

#[tokio::test]
async fn suspended_accounts_cannot_log_in() {
    let (app, shared) = spawn_app().await;
    let alice = create_user(&shared, "alice@x.test", "correct horse", Role::User).await;
    shared
        .store
        .user_repo()
        .update_status(alice, handovr::models::UserStatus::Suspended)
        .await
        .unwrap();

    let (status, _) =
        login_from(&app, "alice@x.test", "correct horse", NEW_YORK_IP, CHROME_MAC).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn role_gate_enforced_from_the_policy_table() {
    let (app, shared) = spawn_app().await;
    create_user(&shared, "user@x.test", "userpass123", Role::User).await;
    create_user(&shared, "op@x.test", "operatorpass", Role::Operator).await;

    let (_, user_login) =
        login_from(&app, "user@x.test", "userpass123", NEW_YORK_IP, CHROME_MAC).await;
    let user_token = access_token(&user_login);

    let (status, _) = get_with_token(&app, "/api/v1/users", &user_token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, op_login) =
        login_from(&app, "op@x.test", "operatorpass", NEW_YORK_IP, CHROME_MAC).await;
    let op_token = access_token(&op_login);

    let (status, _) = get_with_token(&app, "/api/v1/users", &op_token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn force_logout_displaces_the_session() {
    let (app, shared) = spawn_app().await;
    let alice = create_user(&shared, "alice@x.test", "correct horse", Role::User).await;
    create_user(&shared, "op@x.test", "operatorpass", Role::Operator).await;

    let (_, alice_login) =
        login_from(&app, "alice@x.test", "correct horse", NEW_YORK_IP, CHROME_MAC).await;
    let alice_token = access_token(&alice_login);

    let (_, op_login) =
        login_from(&app, "op@x.test", "operatorpass", NEW_YORK_IP, CHROME_MAC).await;
    let op_token = access_token(&op_login);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/v1/users/{alice}/force-logout"))
                .header("Authorization", format!("Bearer {op_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = get_with_token(&app, "/api/v1/auth/session-status", &alice_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let sessions = shared
        .store
        .session_activity_repo()
        .for_user(alice, false, 10)
        .await
        .unwrap();
    assert_eq!(sessions[0].logout_reason.as_deref(), Some("forced_by_admin"));
}

#[tokio::test]
async fn deleting_the_last_operator_root_conflicts() {
    let (app, shared) = spawn_app().await;

    // The bootstrap migration seeded one root already
    let second_root = create_user(&shared, "root2@x.test", "rootpass1234", Role::OperatorRoot).await;

    let (_, login) =
        login_from(&app, "root2@x.test", "rootpass1234", NEW_YORK_IP, CHROME_MAC).await;
    let token = access_token(&login);

    let seeded = shared
        .store
        .user_repo()
        .list()
        .await
        .unwrap()
        .into_iter()
        .find(|u| u.role == "operator_root" && u.id != second_root)
        .unwrap();

    // With two roots the first delete passes
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/users/{}", seeded.id))
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Deleting the final root is refused
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/users/{second_root}"))
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn duplicate_emails_conflict() {
    let (app, shared) = spawn_app().await;
    create_user(&shared, "op@x.test", "operatorpass", Role::Operator).await;
    create_user(&shared, "taken@x.test", "irrelevant1", Role::User).await;

    let (_, op_login) =
        login_from(&app, "op@x.test", "operatorpass", NEW_YORK_IP, CHROME_MAC).await;
    let token = access_token(&op_login);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/users")
                .header("Authorization", format!("Bearer {token}"))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "email": "taken@x.test", "password": "password123" })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn refresh_succeeds_after_force_logout_and_reclaims_the_session() {
    let (app, shared) = spawn_app().await;
    let alice = create_user(&shared, "alice@x.test", "correct horse", Role::User).await;

    let (_, login) =
        login_from(&app, "alice@x.test", "correct horse", NEW_YORK_IP, CHROME_MAC).await;
    let r1 = refresh_token(&login);

    shared.auth_service.force_logout(alice).await.unwrap();

    let user = shared.store.user_repo().get_by_id(alice).await.unwrap().unwrap();
    assert!(user.current_session_token.is_none());

    // Refresh does not consult current_session_token...
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/refresh")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "refresh_token": r1 }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // ...and the new access token becomes the current session token
    let body = body_json(response).await;
    let new_access = body["data"]["tokens"]["access_token"].as_str().unwrap();

    let user = shared.store.user_repo().get_by_id(alice).await.unwrap().unwrap();
    assert_eq!(user.current_session_token.as_deref(), Some(new_access));

    let (status, _) = get_with_token(&app, "/api/v1/auth/session-status", new_access).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn every_successful_login_writes_exactly_one_history_row() {
    let (app, shared) = spawn_app().await;
    let alice = create_user(&shared, "alice@x.test", "correct horse", Role::User).await;

    for _ in 0..3 {
        let (status, _) =
            login_from(&app, "alice@x.test", "correct horse", NEW_YORK_IP, CHROME_MAC).await;
        assert_eq!(status, StatusCode::OK);
    }

    let history = shared
        .store
        .login_history_repo()
        .for_user(alice, 50)
        .await
        .unwrap();
    assert_eq!(history.iter().filter(|h| h.success).count(), 3);
}
