// HTTP surface of the service.
// Read endpoint, authenticated manual refresh, status, and liveness.

pub mod auth;
pub mod error;
pub mod handlers;

use std::future::Future;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;

use crate::refresh::RefreshCoordinator;

pub use handlers::CACHE_STATUS_HEADER;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: RefreshCoordinator,
    /// Required by the manual refresh endpoint when set.
    pub refresh_secret: Option<String>,
}

impl AppState {
    pub fn new(coordinator: RefreshCoordinator, refresh_secret: Option<String>) -> Self {
        Self {
            coordinator,
            refresh_secret,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/dashboard", get(handlers::get_dashboard))
        .route("/api/refresh", post(handlers::post_refresh))
        .route("/api/status", get(handlers::get_status))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
}

/// Serve until `shutdown` resolves, letting in-flight requests finish.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
