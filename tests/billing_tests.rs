use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

use handovr::config::Config;
use handovr::geo::NoopGeoResolver;
use handovr::models::{CycleType, Role};
use handovr::state::SharedState;
use handovr::sweeper::Sweeper;

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

async fn create_user(shared: &SharedState, email: &str, role: Role) -> i32 {
    let hash = handovr::auth::password::hash("a-password-123").await.unwrap();
    shared
        .store
        .user_repo()
        .create(email, &hash, role)
        .await
        .unwrap()
        .id
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn try_login(app: &Router, email: &str) -> (StatusCode, serde_json::Value) {
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

    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn users_with_no_plan_may_log_in() {
    let (app, shared) = spawn_app().await;
    create_user(&shared, "fresh@x.test", Role::User).await;

    let (status, _) = try_login(&app, "fresh@x.test").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn expired_cycle_blocks_login_then_sweeper_disables() {
    // Scenario S3.
    let (app, shared) = spawn_app().await;
    let bob = create_user(&shared, "bob@x.test", Role::User).await;

    // A monthly cycle that started two months ago is over
    let two_months_ago = Utc::now() - Duration::days(62);
    shared
        .billing
        .start_cycle(bob, CycleType::Monthly, Some(two_months_ago))
        .await
        .unwrap();

    let (status, _) = try_login(&app, "bob@x.test").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // No tokens were minted and no session exists
    let user = shared.store.user_repo().get_by_id(bob).await.unwrap().unwrap();
    assert!(user.current_session_token.is_none());

    // The sweep disables the account and records why
    let sweeper = Sweeper::new(shared.billing.clone());
    let disabled = sweeper.run_once().await.unwrap();
    assert_eq!(disabled, 1);

    let user = shared.store.user_repo().get_by_id(bob).await.unwrap().unwrap();
    assert_eq!(user.status, "disabled");
    assert!(!user.is_billing_active);

    let history = shared
        .store
        .billing_repo()
        .history_for_user(bob)
        .await
        .unwrap();
    assert!(history.iter().any(|h| h.event_type == "AUTO_DISABLED"));

    // The status gate now rejects before the password check
    let (status, _) = try_login(&app, "bob@x.test").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn sweeper_is_idempotent() {
    let (_app, shared) = spawn_app().await;
    let bob = create_user(&shared, "bob@x.test", Role::User).await;

    let long_ago = Utc::now() - Duration::days(40);
    shared
        .billing
        .start_cycle(bob, CycleType::Monthly, Some(long_ago))
        .await
        .unwrap();

    let sweeper = Sweeper::new(shared.billing.clone());
    assert_eq!(sweeper.run_once().await.unwrap(), 1);

    let rows_after_first = shared
        .store
        .billing_repo()
        .history_for_user(bob)
        .await
        .unwrap()
        .len();

    // A second pass with no intervening writes changes nothing
    assert_eq!(sweeper.run_once().await.unwrap(), 0);

    let rows_after_second = shared
        .store
        .billing_repo()
        .history_for_user(bob)
        .await
        .unwrap()
        .len();
    assert_eq!(rows_after_first, rows_after_second);
}

#[tokio::test]
async fn payment_on_a_disabled_user_does_not_reactivate_the_account() {
    let (_app, shared) = spawn_app().await;
    let bob = create_user(&shared, "bob@x.test", Role::User).await;
    let root = create_user(&shared, "root2@x.test", Role::OperatorRoot).await;

    let long_ago = Utc::now() - Duration::days(40);
    shared
        .billing
        .start_cycle(bob, CycleType::Monthly, Some(long_ago))
        .await
        .unwrap();

    let sweeper = Sweeper::new(shared.billing.clone());
    sweeper.run_once().await.unwrap();

    shared
        .billing
        .add_payment(bob, CycleType::Monthly, 29.90, None, root)
        .await
        .unwrap();

    let user = shared.store.user_repo().get_by_id(bob).await.unwrap().unwrap();
    assert!(user.is_billing_active);
    // Re-enabling stays a separate, explicit operator action
    assert_eq!(user.status, "disabled");
}

#[tokio::test]
async fn prepayments_stack_onto_the_current_cycle_end() {
    let (_app, shared) = spawn_app().await;
    let bob = create_user(&shared, "bob@x.test", Role::User).await;
    let root = create_user(&shared, "root2@x.test", Role::OperatorRoot).await;

    let first = shared
        .billing
        .add_payment(bob, CycleType::Monthly, 29.90, None, root)
        .await
        .unwrap();

    let second = shared
        .billing
        .add_payment(bob, CycleType::Monthly, 29.90, Some("renewal".to_string()), root)
        .await
        .unwrap();

    // The second cycle starts where the first ends, not at "now"
    assert_eq!(second.cycle_start_date, first.cycle_end_date);
    assert!(second.cycle_end_date > first.cycle_end_date);

    let user = shared.store.user_repo().get_by_id(bob).await.unwrap().unwrap();
    assert_eq!(user.billing_cycle_end_date, Some(second.cycle_end_date));

    let payments = shared.billing.payments(bob).await.unwrap();
    assert_eq!(payments.len(), 2);
}

#[tokio::test]
async fn trial_grants_access_and_clears_cycle_fields() {
    let (app, shared) = spawn_app().await;
    let bob = create_user(&shared, "bob@x.test", Role::User).await;

    shared.billing.set_trial(bob, 48).await.unwrap();

    let user = shared.store.user_repo().get_by_id(bob).await.unwrap().unwrap();
    assert!(user.is_trial_active);
    assert!(!user.is_billing_active);
    assert!(user.billing_cycle.is_none());

    let (status, _) = try_login(&app, "bob@x.test").await;
    assert_eq!(status, StatusCode::OK);

    let history = shared
        .store
        .billing_repo()
        .history_for_user(bob)
        .await
        .unwrap();
    assert!(history.iter().any(|h| h.event_type == "TRIAL_STARTED"));
}

#[tokio::test]
async fn billing_endpoints_report_status_and_ledger() {
    let (app, shared) = spawn_app().await;
    let bob = create_user(&shared, "bob@x.test", Role::User).await;
    create_user(&shared, "support@x.test", Role::Support).await;
    let root = create_user(&shared, "root2@x.test", Role::OperatorRoot).await;

    shared
        .billing
        .add_payment(bob, CycleType::Weekly, 9.90, None, root)
        .await
        .unwrap();

    let (_, support_login) = try_login(&app, "support@x.test").await;
    let token = support_login["data"]["tokens"]["access_token"]
        .as_str()
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/billing/{bob}/status"))
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["state"], "active");
    assert_eq!(body["data"]["days_remaining"], 7);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/billing/{bob}/payments"))
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["cycle"], "WEEKLY");
}

#[tokio::test]
async fn expired_billing_invalidates_live_sessions_at_next_validation() {
    let (app, shared) = spawn_app().await;
    let bob = create_user(&shared, "bob@x.test", Role::User).await;

    shared.billing.set_trial(bob, 48).await.unwrap();

    let (status, login) = try_login(&app, "bob@x.test").await;
    assert_eq!(status, StatusCode::OK);
    let token = login["data"]["tokens"]["access_token"].as_str().unwrap().to_string();

    // Billing lapses while the session is live
    let long_ago = Utc::now() - Duration::days(40);
    shared
        .billing
        .start_cycle(bob, CycleType::Monthly, Some(long_ago))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/session-status")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
