use axum::{
    Router,
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{delete, get, patch, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::TokenCodec;
use crate::config::Config;
use crate::state::SharedState;

pub mod alerts;
pub mod auth;
pub mod billing;
pub mod bundles;
mod error;
pub mod history;
pub mod middleware;
pub mod policy;
pub mod system;
mod types;
pub mod users;

pub use error::ApiError;
pub use types::*;

use tokio::sync::RwLock;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenCodec {
        &self.shared.tokens
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn crate::services::AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn billing(&self) -> &crate::services::BillingService {
        &self.shared.billing
    }

    #[must_use]
    pub fn bundles(&self) -> &crate::services::BundleService {
        &self.shared.bundles
    }
}

pub fn create_app_state(shared: Arc<SharedState>) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
    })
}

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = {
        let config = state.config().read().await;
        config.server.cors_allowed_origins.clone()
    };

    let api_router = Router::new()
        .merge(create_protected_router(state.clone()))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh));

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api/v1", api_router)
        .route("/healthz", get(system::healthz))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/session-status", get(auth::session_status))
        .route("/auth/logout", post(auth::logout))
        .route("/users", get(users::list_users))
        .route("/users", post(users::create_user))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}", patch(users::update_user))
        .route("/users/{id}", delete(users::delete_user))
        .route("/users/{id}/role", patch(users::update_role))
        .route("/users/{id}/status", patch(users::update_status))
        .route("/users/{id}/password", patch(users::update_password))
        .route("/users/{id}/force-logout", post(users::force_logout))
        .route("/users/{id}/history/logins", get(history::user_login_history))
        .route(
            "/users/{id}/activity/sessions",
            get(history::user_session_activity),
        )
        .route("/history/logins", get(history::my_login_history))
        .route("/activity/sessions", get(history::my_session_activity))
        .route("/sessions/my-sessions", get(bundles::my_sessions))
        .route("/sessions/shared-stats", get(bundles::shared_stats))
        .route("/sessions", get(bundles::list_bundles))
        .route("/sessions", post(bundles::create_bundle))
        .route("/sessions/{id}", get(bundles::get_bundle))
        .route("/sessions/{id}", patch(bundles::update_bundle))
        .route("/sessions/{id}", delete(bundles::delete_bundle))
        .route("/sessions/{id}/request-upload", post(bundles::request_upload))
        .route(
            "/sessions/{id}/complete-upload",
            post(bundles::complete_upload),
        )
        .route(
            "/sessions/{id}/request-download",
            post(bundles::request_download),
        )
        .route("/sessions/{id}/mark-ready", post(bundles::mark_ready))
        .route("/sessions/{id}/events", post(bundles::report_event))
        .route("/sessions/{id}/events", get(bundles::list_events))
        .route("/alerts", get(alerts::list_alerts))
        .route("/alerts/unread-count", get(alerts::unread_count))
        .route("/alerts/stats", get(alerts::stats))
        .route("/alerts/{id}/read", post(alerts::mark_read))
        .route("/alerts/{id}/dismiss", post(alerts::dismiss))
        .route("/billing/{user_id}/status", get(billing::status))
        .route("/billing/{user_id}/history", get(billing::history))
        .route("/billing/{user_id}/payments", get(billing::payments))
        .route("/billing/{user_id}/payments", post(billing::add_payment))
        .route("/billing/{user_id}/start-cycle", post(billing::start_cycle))
        .route("/billing/{user_id}/trial", post(billing::set_trial))
        .route("/audit", get(system::list_audit))
        .route("/domains", get(system::list_domains))
        .route("/domains", post(system::create_domain))
        .route("/proxies", get(system::list_proxies))
        .route("/proxies", post(system::create_proxy))
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::auth_middleware,
        ))
}
