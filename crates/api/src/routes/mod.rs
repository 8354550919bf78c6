pub mod events;
pub mod health;
pub mod mappings;
pub mod reconcile;
pub mod records;
pub mod webhook;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /attendance/webhook                       ingest (POST)
///
/// /events                                   list
/// /events/{id}                              get
/// /events/{id}/resolve                      resolve quarantine (POST)
///
/// /records                                  list
/// /records/{user_id}/{date}                 get
/// /records/{user_id}/{date}/logs            processing-log audit
/// /records/{user_id}/{date}/adjust          manual adjustment (POST)
/// /records/{user_id}/{date}/approve         approval (POST)
/// /records/{user_id}/{date}/unlock          unlock (POST)
/// /records/{user_id}/{date}/reprocess       urgent re-reconciliation (POST)
///
/// /mappings                                 list, enroll
/// /mappings/{id}/deactivate                 deactivate (POST)
///
/// /reconcile/batch                          batch fan-out trigger (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(webhook::router())
        .nest("/events", events::router())
        .nest("/records", records::router())
        .nest("/mappings", mappings::router())
        .merge(reconcile::router())
}
