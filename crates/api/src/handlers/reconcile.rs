//! Handler for the batch reconciliation trigger.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use timeclock_core::error::CoreError;
use timeclock_core::scheduling::{
    reconcile_job_key, JOB_RECONCILE_DAY, MAX_JOB_ATTEMPTS, PRIORITY_BACKGROUND,
};
use timeclock_core::types::DbId;
use timeclock_db::models::job::EnqueueJob;
use timeclock_db::models::processing_log::triggers;
use timeclock_db::repositories::{EventRepo, JobRepo, RecordRepo};
use timeclock_pipeline::reconcile::ReconcileJobPayload;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /reconcile/batch`.
#[derive(Debug, Deserialize)]
pub struct BatchReconcileRequest {
    pub date: NaiveDate,
    /// Explicit fan-out set; defaults to every user with contributing
    /// events on the date.
    pub user_ids: Option<Vec<DbId>>,
}

/// Aggregate outcome of a batch trigger.
#[derive(Debug, Default, Serialize)]
pub struct BatchReconcileSummary {
    pub requested: usize,
    pub enqueued: usize,
    /// A job for the user-day was already in flight.
    pub coalesced: usize,
    /// The record is locked; no job was enqueued.
    pub skipped_locked: usize,
}

/// POST /api/v1/reconcile/batch
///
/// Fan out per-user reconciliation jobs for one date at background
/// priority and report aggregate counts. Returns 202.
pub async fn batch_reconcile(
    State(state): State<AppState>,
    Json(request): Json<BatchReconcileRequest>,
) -> AppResult<impl IntoResponse> {
    let user_ids = match request.user_ids {
        Some(ids) if !ids.is_empty() => ids,
        _ => EventRepo::user_ids_with_events_on(&state.pool, request.date).await?,
    };

    let mut summary = BatchReconcileSummary {
        requested: user_ids.len(),
        ..Default::default()
    };

    for user_id in user_ids {
        let locked = RecordRepo::find(&state.pool, user_id, request.date)
            .await?
            .is_some_and(|r| r.is_locked);
        if locked {
            summary.skipped_locked += 1;
            continue;
        }

        let payload = ReconcileJobPayload {
            user_id,
            work_date: request.date,
            trigger: triggers::BATCH.to_string(),
        };
        let enqueued = JobRepo::enqueue(
            &state.pool,
            &EnqueueJob {
                job_type: JOB_RECONCILE_DAY.to_string(),
                job_key: reconcile_job_key(user_id, request.date),
                payload: serde_json::to_value(&payload)
                    .map_err(|e| CoreError::Internal(e.to_string()))?,
                priority: PRIORITY_BACKGROUND,
                max_attempts: MAX_JOB_ATTEMPTS,
            },
        )
        .await?;

        if enqueued.is_some() {
            summary.enqueued += 1;
        } else {
            summary.coalesced += 1;
        }
    }

    tracing::info!(
        date = %request.date,
        requested = summary.requested,
        enqueued = summary.enqueued,
        coalesced = summary.coalesced,
        skipped_locked = summary.skipped_locked,
        "Batch reconciliation fanned out",
    );

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: summary })))
}
