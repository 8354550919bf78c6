//! Route definition for the batch reconciliation trigger.

use axum::routing::post;
use axum::Router;

use crate::handlers::reconcile;
use crate::state::AppState;

/// ```text
/// POST   /reconcile/batch    batch_reconcile
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/reconcile/batch", post(reconcile::batch_reconcile))
}
