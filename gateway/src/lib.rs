//! The GeoGrow HTTP API.

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod fields;
pub mod metrics_defs;
pub mod rate_limit;
pub mod state;
pub mod store;
pub mod validation;

pub use config::GatewayConfig;
pub use state::AppState;
pub use store::{Store, StoreError};

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

const LIMITER_CLEANUP_PERIOD: Duration = Duration::from_secs(60);

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Serves the API until interrupted.
pub async fn serve(state: AppState) -> Result<(), GatewayError> {
    let sweeper = state.cache.spawn_sweeper();

    let limiters = state.limiters.clone();
    let cleanup = tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_CLEANUP_PERIOD);
        loop {
            interval.tick().await;
            limiters.retain_recent();
        }
    });

    let addr = format!("{}:{}", state.config.listener.host, state.config.listener.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(
        %addr,
        environment = state.config.environment.as_str(),
        "GeoGrow API listening"
    );

    let app = api::router(state);
    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    sweeper.abort();
    cleanup.abort();
    result?;
    Ok(())
}
