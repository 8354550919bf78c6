//! Route definitions for the events resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::events;
use crate::state::AppState;

/// ```text
/// GET    /                  list_events
/// GET    /{id}              get_event
/// POST   /{id}/resolve      resolve_quarantine
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(events::list_events))
        .route("/{id}", get(events::get_event))
        .route("/{id}/resolve", post(events::resolve_quarantine))
}
