use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use timeclock_db::models::status::JobStatus;
use timeclock_db::repositories::JobRepo;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database is reachable.
    pub db_healthy: bool,
    /// Reconciliation jobs waiting in the queue.
    pub queue_pending: i64,
}

/// GET /health -- returns service, database, and queue health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = timeclock_db::health_check(&state.pool).await.is_ok();

    let queue_pending = if db_healthy {
        JobRepo::count_by_status(&state.pool, JobStatus::Pending.id())
            .await
            .unwrap_or(-1)
    } else {
        -1
    };

    let status = if db_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        queue_pending,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
