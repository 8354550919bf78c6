//! User-device mapping entity models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use timeclock_core::types::{DbId, Timestamp};

/// A row from the `user_device_mappings` table. Binds a device-local
/// terminal user id to an internal user id. Unique on
/// (terminal_user_id, device_id); deactivation never deletes history.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserDeviceMapping {
    pub id: DbId,
    pub terminal_user_id: String,
    pub device_id: String,
    pub user_id: DbId,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for enrolling a mapping via `POST /api/v1/mappings`.
#[derive(Debug, Deserialize)]
pub struct CreateMapping {
    pub terminal_user_id: String,
    pub device_id: String,
    pub user_id: DbId,
}

/// Query parameters for `GET /api/v1/mappings`.
#[derive(Debug, Deserialize)]
pub struct MappingListQuery {
    pub device_id: Option<String>,
    pub user_id: Option<DbId>,
    #[serde(default)]
    pub include_inactive: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
