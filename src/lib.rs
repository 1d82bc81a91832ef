//! Facility-access backend.
//!
//! Tracks the gates of a facility and proxies control commands to the
//! physical gate controller running next to the hardware.
//!
//! # General Infrastructure
//! - Gate records (name, optional entry/exit cameras) live in Redis
//! - Live open/closed status is never stored, every read is a fresh
//!   round-trip to the controller
//! - The controller only exposes a toggle primitive; open/close are
//!   built on top with an idempotence check and post-toggle verification
//! - Gate transitions (opening/closing/opened/closed) fan out to
//!   dashboard clients over a WebSocket, best-effort only
//!
//! # Notes
//!
//! ## Controller link
//! The controller is a small board on a flaky network. Every call is
//! bounded by a timeout, and unreachable/refused/failed are surfaced as
//! distinct errors so clients can decide between retry and abort.
use std::time::Duration;

use axum::http::{header::CONTENT_TYPE, Method};

use signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod gates;
pub mod model;
pub mod routes;
pub mod state;
pub mod store;

use config::Config;
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::load();

    info!("Initializing state...");
    let state = AppState::new(&config).await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let app = routes::router(state).layer(cors);

    let address = format!("0.0.0.0:{}", config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    info!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
