//! Handlers for the `/records` resource: queries and the record
//! lifecycle operations (adjust, approve, unlock, reprocess).
//!
//! Lifecycle endpoints return precise precondition errors,
//! `RECORD_LOCKED`, `NOT_LOCKED`, rather than generic failures.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use timeclock_core::error::CoreError;
use timeclock_core::types::DbId;
use timeclock_db::models::record::{
    AdjustRecordRequest, ApproveRecordRequest, RecordListQuery, UnlockRecordRequest,
};
use timeclock_db::repositories::{ProcessingLogRepo, RecordRepo};
use timeclock_pipeline::records;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/records
///
/// List attendance records filtered by user, status, and date range,
/// paginated.
pub async fn list_records(
    State(state): State<AppState>,
    Query(params): Query<RecordListQuery>,
) -> AppResult<impl IntoResponse> {
    let items = RecordRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: items }))
}

/// GET /api/v1/records/{user_id}/{date}
pub async fn get_record(
    State(state): State<AppState>,
    Path((user_id, work_date)): Path<(DbId, NaiveDate)>,
) -> AppResult<impl IntoResponse> {
    let record = RecordRepo::find(&state.pool, user_id, work_date)
        .await?
        .ok_or(AppError::Core(CoreError::RecordMissing {
            user_id,
            work_date,
        }))?;
    Ok(Json(DataResponse { data: record }))
}

/// GET /api/v1/records/{user_id}/{date}/logs
///
/// Processing-log audit trail for the day, most recent attempt first.
pub async fn get_record_logs(
    State(state): State<AppState>,
    Path((user_id, work_date)): Path<(DbId, NaiveDate)>,
) -> AppResult<impl IntoResponse> {
    let logs = ProcessingLogRepo::list_for_day(&state.pool, user_id, work_date, None).await?;
    Ok(Json(DataResponse { data: logs }))
}

/// POST /api/v1/records/{user_id}/{date}/adjust
///
/// Apply a manual adjustment. 409 `RECORD_LOCKED` when the record is
/// locked; the adjustment is appended to history and the record flagged
/// for approval.
pub async fn adjust_record(
    State(state): State<AppState>,
    Path((user_id, work_date)): Path<(DbId, NaiveDate)>,
    Json(request): Json<AdjustRecordRequest>,
) -> AppResult<impl IntoResponse> {
    let record = records::adjust(&state.pool, &state.bus, user_id, work_date, request).await?;
    Ok(Json(DataResponse { data: record }))
}

/// POST /api/v1/records/{user_id}/{date}/approve
///
/// Append an approval; `lock: true` also locks the record.
pub async fn approve_record(
    State(state): State<AppState>,
    Path((user_id, work_date)): Path<(DbId, NaiveDate)>,
    Json(request): Json<ApproveRecordRequest>,
) -> AppResult<impl IntoResponse> {
    let record = records::approve(&state.pool, &state.bus, user_id, work_date, request).await?;
    Ok(Json(DataResponse { data: record }))
}

/// POST /api/v1/records/{user_id}/{date}/unlock
///
/// Clear the lock. 409 `NOT_LOCKED` when the record is not locked.
pub async fn unlock_record(
    State(state): State<AppState>,
    Path((user_id, work_date)): Path<(DbId, NaiveDate)>,
    Json(request): Json<UnlockRecordRequest>,
) -> AppResult<impl IntoResponse> {
    let record = records::unlock(&state.pool, &state.bus, user_id, work_date, request).await?;
    Ok(Json(DataResponse { data: record }))
}

/// POST /api/v1/records/{user_id}/{date}/reprocess
///
/// Enqueue an urgent reconciliation for the day. 409 `RECORD_LOCKED`
/// when locked; idempotent by job key (a duplicate request coalesces
/// into the job already in flight). Returns 202.
pub async fn reprocess_record(
    State(state): State<AppState>,
    Path((user_id, work_date)): Path<(DbId, NaiveDate)>,
) -> AppResult<impl IntoResponse> {
    let enqueued = records::reprocess(&state.pool, user_id, work_date).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: serde_json::json!({"enqueued": enqueued, "coalesced": !enqueued}),
        }),
    ))
}
