//! Repository for the `user_device_mappings` table.
//!
//! Read-mostly from intake, written rarely (enrollment, quarantine
//! resolution); no locking beyond standard row transactions is needed.

use sqlx::{PgConnection, PgPool};
use timeclock_core::types::DbId;

use crate::models::mapping::{CreateMapping, MappingListQuery, UserDeviceMapping};

/// Column list for `user_device_mappings` queries.
const COLUMNS: &str = "\
    id, terminal_user_id, device_id, user_id, is_active, created_at, updated_at";

/// Maximum page size for mapping listing.
const MAX_LIMIT: i64 = 200;

/// Default page size for mapping listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides CRUD operations for user-device identity mappings.
pub struct MappingRepo;

impl MappingRepo {
    /// Resolve an active mapping for a (terminal user id, device id) pair.
    pub async fn find_active(
        pool: &PgPool,
        terminal_user_id: &str,
        device_id: &str,
    ) -> Result<Option<UserDeviceMapping>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM user_device_mappings \
             WHERE terminal_user_id = $1 AND device_id = $2 AND is_active = TRUE"
        );
        sqlx::query_as::<_, UserDeviceMapping>(&query)
            .bind(terminal_user_id)
            .bind(device_id)
            .fetch_optional(pool)
            .await
    }

    /// Enroll a new mapping. Fails with a unique violation on
    /// `uq_user_device_mappings_terminal_device` if the pair is taken.
    pub async fn create(
        pool: &PgPool,
        input: &CreateMapping,
    ) -> Result<UserDeviceMapping, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_device_mappings (terminal_user_id, device_id, user_id) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserDeviceMapping>(&query)
            .bind(&input.terminal_user_id)
            .bind(&input.device_id)
            .bind(input.user_id)
            .fetch_one(pool)
            .await
    }

    /// Insert a mapping only if none exists yet for the pair. Returns
    /// whether a row was created. Used by quarantine resolution inside its
    /// transaction so future events from the pair resolve automatically.
    pub async fn insert_if_absent_tx(
        conn: &mut PgConnection,
        terminal_user_id: &str,
        device_id: &str,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO user_device_mappings (terminal_user_id, device_id, user_id) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (terminal_user_id, device_id) DO NOTHING",
        )
        .bind(terminal_user_id)
        .bind(device_id)
        .bind(user_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deactivate a mapping. History is preserved; the pair stops
    /// resolving at intake. Returns `false` if the mapping was already
    /// inactive or absent.
    pub async fn deactivate(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_device_mappings \
             SET is_active = FALSE, updated_at = NOW() \
             WHERE id = $1 AND is_active = TRUE",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List mappings with optional filters and pagination.
    pub async fn list(
        pool: &PgPool,
        params: &MappingListQuery,
    ) -> Result<Vec<UserDeviceMapping>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if params.device_id.is_some() {
            conditions.push(format!("device_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.user_id.is_some() {
            conditions.push(format!("user_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if !params.include_inactive {
            conditions.push("is_active = TRUE".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM user_device_mappings \
             {where_clause} \
             ORDER BY created_at DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, UserDeviceMapping>(&query);

        if let Some(device) = &params.device_id {
            q = q.bind(device);
        }
        if let Some(uid) = params.user_id {
            q = q.bind(uid);
        }

        q.bind(limit).bind(offset).fetch_all(pool).await
    }
}
