//! Route definitions for the device-facing webhook endpoint.

use axum::routing::post;
use axum::Router;

use crate::handlers::webhook;
use crate::state::AppState;

/// ```text
/// POST   /attendance/webhook    ingest_event
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/attendance/webhook", post(webhook::ingest_event))
}
