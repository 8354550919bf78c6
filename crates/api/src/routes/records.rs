//! Route definitions for the records resource and its lifecycle actions.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::records;
use crate::state::AppState;

/// ```text
/// GET    /                                  list_records
/// GET    /{user_id}/{date}                  get_record
/// GET    /{user_id}/{date}/logs             get_record_logs
/// POST   /{user_id}/{date}/adjust           adjust_record
/// POST   /{user_id}/{date}/approve          approve_record
/// POST   /{user_id}/{date}/unlock           unlock_record
/// POST   /{user_id}/{date}/reprocess        reprocess_record
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(records::list_records))
        .route("/{user_id}/{date}", get(records::get_record))
        .route("/{user_id}/{date}/logs", get(records::get_record_logs))
        .route("/{user_id}/{date}/adjust", post(records::adjust_record))
        .route("/{user_id}/{date}/approve", post(records::approve_record))
        .route("/{user_id}/{date}/unlock", post(records::unlock_record))
        .route(
            "/{user_id}/{date}/reprocess",
            post(records::reprocess_record),
        )
}
