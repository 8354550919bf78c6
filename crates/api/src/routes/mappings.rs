//! Route definitions for device identity mappings.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::mappings;
use crate::state::AppState;

/// ```text
/// GET    /                      list_mappings
/// POST   /                      create_mapping
/// POST   /{id}/deactivate       deactivate_mapping
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(mappings::list_mappings).post(mappings::create_mapping),
        )
        .route("/{id}/deactivate", post(mappings::deactivate_mapping))
}
