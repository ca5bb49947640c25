pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod geo;
pub mod models;
pub mod retry;
pub mod services;
pub mod state;
pub mod storage;
pub mod sweeper;

use std::sync::Arc;
use tokio::signal;

pub use config::Config;
use state::SharedState;
use sweeper::Sweeper;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("handovr v{} starting...", env!("CARGO_PKG_VERSION"));

    let port = config.server.port;
    let shared = Arc::new(SharedState::new(config).await?);

    let sweeper = Sweeper::new(shared.billing.clone());
    let sweeper_handle = tokio::spawn(async move {
        if let Err(e) = sweeper.start().await {
            error!("Sweeper error: {}", e);
        }
    });

    let app_state = api::create_app_state(shared);
    let app = api::router(app_state).await;

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let server_handle = tokio::spawn(async move {
        info!("API listening on http://{}", addr);
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    info!("Service running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }

    sweeper_handle.abort();
    server_handle.abort();
    info!("Service stopped");

    Ok(())
}
