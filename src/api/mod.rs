//! HTTP and WebSocket surface over a running simulation driver.
//!
//! Routes:
//! - `POST /rooms/{id}/control` apply a setpoint, fan speed, and mode
//! - `POST /rooms/{id}/power-off`
//! - `POST /rooms/{id}/request` re-queue with the stored setpoint
//! - `GET /rooms/{id}` current snapshot
//! - `GET /rooms/{id}/bill`
//! - `POST /rooms/{id}/checkout` final bill, room discarded
//! - `GET /status` all rooms plus aggregates
//! - `GET /ws` one status push per tick
//! - `GET /rooms/{id}/ws` one room's snapshot per tick
//! - `GET /health`

mod handlers;
mod types;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tracing::info;

use crate::runtime::DriverHandle;

pub use types::{ErrorResponse, HealthResponse, RoomUpdate};

/// State shared by all handlers.
///
/// Handlers never touch the engine directly. Every request is forwarded to
/// the driver task, which applies it between ticks.
pub struct AppState {
    pub driver: DriverHandle,
}

/// Builds the axum router with all API routes.
///
/// # Arguments
///
/// * `state` - Shared state holding the driver handle
///
/// # Returns
///
/// Configured `Router` ready to serve.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/rooms/{id}", get(handlers::room_status))
        .route("/rooms/{id}/control", post(handlers::control))
        .route("/rooms/{id}/power-off", post(handlers::power_off))
        .route("/rooms/{id}/request", post(handlers::request_service))
        .route("/rooms/{id}/ws", get(handlers::room_ws))
        .route("/rooms/{id}/bill", get(handlers::bill))
        .route("/rooms/{id}/checkout", post(handlers::checkout))
        .route("/status", get(handlers::status))
        .route("/ws", get(handlers::ws))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Binds to `addr` and serves the API until the server fails.
///
/// # Arguments
///
/// * `state` - Shared state holding the driver handle
/// * `addr` - Socket address to bind to
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
