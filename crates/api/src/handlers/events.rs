//! Handlers for the `/events` resource: queries over raw attendance
//! events and quarantine resolution.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use timeclock_core::error::CoreError;
use timeclock_core::types::DbId;
use timeclock_db::models::event::EventListQuery;
use timeclock_db::repositories::EventRepo;
use timeclock_pipeline::quarantine::{self, ResolveOptions};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/events
///
/// List raw events filtered by user, device, status, and local-date
/// range, paginated.
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<EventListQuery>,
) -> AppResult<impl IntoResponse> {
    let events = EventRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: events }))
}

/// GET /api/v1/events/{id}
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let event = EventRepo::find_by_id(&state.pool, event_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "AttendanceEvent",
            id: event_id,
        }))?;
    Ok(Json(DataResponse { data: event }))
}

/// Request body for `POST /events/{id}/resolve`.
#[derive(Debug, Deserialize)]
pub struct ResolveQuarantineRequest {
    pub target_user_id: DbId,
    pub actor: String,
    /// Backfill a mapping so future events from the pair resolve
    /// automatically.
    #[serde(default)]
    pub create_mapping: bool,
    /// Re-run reconciliation for the affected day.
    #[serde(default = "default_true")]
    pub reprocess: bool,
}

fn default_true() -> bool {
    true
}

/// POST /api/v1/events/{id}/resolve
///
/// Resolve a quarantined event onto an internal user. Returns 409 with
/// `NOT_QUARANTINED` when the event is not quarantined (including when it
/// was already resolved).
pub async fn resolve_quarantine(
    State(state): State<AppState>,
    Path(event_id): Path<DbId>,
    Json(request): Json<ResolveQuarantineRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = quarantine::resolve(
        &state.pool,
        &state.bus,
        event_id,
        request.target_user_id,
        ResolveOptions {
            create_mapping: request.create_mapping,
            reprocess: request.reprocess,
        },
        &request.actor,
    )
    .await?;

    Ok(Json(DataResponse {
        data: serde_json::json!({
            "event": outcome.event,
            "mapping_created": outcome.mapping_created,
            "job_enqueued": outcome.job_enqueued,
        }),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_request_defaults_reprocess_on() {
        let body = serde_json::json!({"target_user_id": 9, "actor": "ops.lee"});
        let parsed: ResolveQuarantineRequest = serde_json::from_value(body).unwrap();
        assert!(parsed.reprocess);
        assert!(!parsed.create_mapping);
    }
}
