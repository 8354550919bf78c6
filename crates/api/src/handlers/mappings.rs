//! Handlers for the `/mappings` resource: device identity enrollment.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use timeclock_core::error::CoreError;
use timeclock_core::types::DbId;
use timeclock_db::models::mapping::{CreateMapping, MappingListQuery};
use timeclock_db::repositories::MappingRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/mappings
///
/// Enroll a (terminal user id, device) → user binding. 409 when the pair
/// is already mapped.
pub async fn create_mapping(
    State(state): State<AppState>,
    Json(input): Json<CreateMapping>,
) -> AppResult<impl IntoResponse> {
    if input.terminal_user_id.trim().is_empty() || input.device_id.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "terminal_user_id and device_id must not be empty".into(),
        )));
    }

    let mapping = MappingRepo::create(&state.pool, &input).await?;

    tracing::info!(
        mapping_id = mapping.id,
        user_id = mapping.user_id,
        device_id = %mapping.device_id,
        "Device mapping enrolled",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: mapping })))
}

/// GET /api/v1/mappings
pub async fn list_mappings(
    State(state): State<AppState>,
    Query(params): Query<MappingListQuery>,
) -> AppResult<impl IntoResponse> {
    let mappings = MappingRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: mappings }))
}

/// POST /api/v1/mappings/{id}/deactivate
///
/// Soft-deactivate a mapping; history is preserved and the pair stops
/// resolving at intake. Returns 204.
pub async fn deactivate_mapping(
    State(state): State<AppState>,
    Path(mapping_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let deactivated = MappingRepo::deactivate(&state.pool, mapping_id).await?;
    if !deactivated {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "UserDeviceMapping",
            id: mapping_id,
        }));
    }
    Ok(StatusCode::NO_CONTENT)
}
