// Route handlers.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::{DashboardPayload, SnapshotMeta, SnapshotSource};
use crate::refresh::{CacheStatus, RefreshStatus, Served};

use super::AppState;
use super::auth;
use super::error::ResponseError;

/// Response header naming how the snapshot was obtained.
pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache-status");

#[derive(Serialize)]
struct DashboardBody<'a> {
    cache: CacheStatus,
    meta: &'a SnapshotMeta,
    payload: &'a DashboardPayload,
}

fn dashboard_response(served: &Served) -> Response {
    let body = DashboardBody {
        cache: served.status,
        meta: &served.snapshot.meta,
        payload: &served.snapshot.payload,
    };
    (
        [(
            CACHE_STATUS_HEADER,
            HeaderValue::from_static(served.status.as_str()),
        )],
        Json(body),
    )
        .into_response()
}

/// `GET /api/dashboard`
pub async fn get_dashboard(State(state): State<AppState>) -> Result<Response, ResponseError> {
    let served = state.coordinator.get().await?;
    tracing::debug!(cache = %served.status, "served dashboard");
    Ok(dashboard_response(&served))
}

/// `POST /api/refresh`
pub async fn post_refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ResponseError> {
    auth::authorize(state.refresh_secret.as_deref(), &headers)?;

    tracing::info!(identity = state.coordinator.identity(), "manual refresh requested");
    let served = state.coordinator.force_refresh().await?;
    Ok(dashboard_response(&served))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub identity: String,
    pub ttl_minutes: u64,
    pub backend: &'static str,
    pub cached: bool,
    pub fresh: bool,
    pub fetched_at: Option<DateTime<Utc>>,
    pub age_seconds: Option<i64>,
    pub source: Option<SnapshotSource>,
    pub refresh: RefreshStatus,
}

/// `GET /api/status`: what is cached, without refreshing it.
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let coordinator = &state.coordinator;
    let snapshot = coordinator.peek().await;
    let now = Utc::now();

    Json(StatusResponse {
        identity: coordinator.identity().to_string(),
        ttl_minutes: coordinator.ttl_minutes(),
        backend: coordinator.backend_name(),
        cached: snapshot.is_some(),
        fresh: snapshot
            .as_ref()
            .is_some_and(|s| s.is_fresh(now, coordinator.ttl_minutes())),
        fetched_at: snapshot.as_ref().and_then(|s| s.meta.fetched_at),
        age_seconds: snapshot
            .as_ref()
            .and_then(|s| s.age(now))
            .map(|age| age.num_seconds()),
        source: snapshot.as_ref().map(|s| s.meta.source),
        refresh: coordinator.status(),
    })
}

/// `GET /healthz`
pub async fn healthz() -> &'static str {
    "ok"
}
