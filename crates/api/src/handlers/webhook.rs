//! Handler for the attendance webhook endpoint.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Header carrying the caller-supplied idempotency key.
const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";

/// Header carrying the hex HMAC-SHA256 signature of the raw body.
const SIGNATURE_HEADER: &str = "x-signature";

/// POST /api/v1/attendance/webhook
///
/// Ingest one clock-in/clock-out delivery from a terminal device.
/// Returns 201 with the persisted event, or 200 with the pre-existing
/// event when the delivery is an idempotent replay. Devices retry
/// delivery on their own; replays are safe.
pub async fn ingest_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let idempotency_key = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::BadRequest("X-Idempotency-Key header is required".into())
        })?;
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    let outcome = state.intake.ingest(&body, idempotency_key, signature).await?;

    let status = if outcome.replay {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((status, Json(DataResponse { data: outcome.event })))
}
