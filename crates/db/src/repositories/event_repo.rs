//! Repository for the `attendance_events` table.

use chrono::{Duration, NaiveDate, NaiveTime};
use sqlx::{PgConnection, PgPool};
use timeclock_core::types::DbId;

use crate::models::event::{AttendanceEvent, EventListQuery, NewAttendanceEvent};
use crate::models::status::{EventStatus, StatusId};

/// Column list for `attendance_events` queries.
const COLUMNS: &str = "\
    id, user_id, terminal_user_id, device_id, punch_kind, \
    occurred_at, occurred_at_local, local_date, utc_offset_minutes, \
    idempotency_key, signature_valid, status_id, retry_count, \
    error_message, resolved_by, resolved_at, created_at, updated_at";

/// Maximum page size for event listing.
const MAX_LIMIT: i64 = 200;

/// Default page size for event listing.
const DEFAULT_LIMIT: i64 = 50;

/// Cross-midnight reconciliation windows cut over at local noon.
fn noon() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).expect("12:00 is a valid time of day")
}

/// Provides CRUD operations for raw attendance events.
pub struct EventRepo;

impl EventRepo {
    /// Insert a new event. Fails with a unique violation on
    /// `uq_attendance_events_idempotency_key` when a duplicate delivery
    /// won the race; see [`crate::repositories::is_unique_violation`].
    pub async fn insert(
        pool: &PgPool,
        input: &NewAttendanceEvent,
    ) -> Result<AttendanceEvent, sqlx::Error> {
        let query = format!(
            "INSERT INTO attendance_events \
                 (user_id, terminal_user_id, device_id, punch_kind, \
                  occurred_at, occurred_at_local, local_date, utc_offset_minutes, \
                  idempotency_key, signature_valid, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AttendanceEvent>(&query)
            .bind(input.user_id)
            .bind(&input.terminal_user_id)
            .bind(&input.device_id)
            .bind(input.punch_kind.id())
            .bind(input.occurred_at)
            .bind(input.occurred_at_local)
            .bind(input.local_date)
            .bind(input.utc_offset_minutes)
            .bind(&input.idempotency_key)
            .bind(input.signature_valid)
            .bind(input.status.id())
            .fetch_one(pool)
            .await
    }

    /// Look up an event by its ingestion idempotency key.
    pub async fn find_by_idempotency_key(
        pool: &PgPool,
        key: &str,
    ) -> Result<Option<AttendanceEvent>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM attendance_events WHERE idempotency_key = $1");
        sqlx::query_as::<_, AttendanceEvent>(&query)
            .bind(key)
            .fetch_optional(pool)
            .await
    }

    /// Find an event by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<AttendanceEvent>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM attendance_events WHERE id = $1");
        sqlx::query_as::<_, AttendanceEvent>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch the events contributing to one user-day's reconciliation,
    /// ordered by local punch time.
    ///
    /// Contributing means PROCESSED, plus FAILED events from an earlier
    /// aborted run so a successful retry heals them. For schedules that
    /// cross midnight the window is noon-to-noon (12:00 on `date` through
    /// 11:59 the next day) so post-midnight punches attach to the shift's
    /// day; otherwise it is the local calendar day.
    pub async fn list_for_day(
        pool: &PgPool,
        user_id: DbId,
        date: NaiveDate,
        crosses_midnight: bool,
        limit: i64,
    ) -> Result<Vec<AttendanceEvent>, sqlx::Error> {
        let contributing = [EventStatus::Processed.id(), EventStatus::Failed.id()];

        let query = if crosses_midnight {
            format!(
                "SELECT {COLUMNS} FROM attendance_events \
                 WHERE user_id = $1 AND status_id = ANY($2) \
                   AND ((local_date = $3 AND CAST(occurred_at_local AS time) >= $5) \
                     OR (local_date = $4 AND CAST(occurred_at_local AS time) < $5)) \
                 ORDER BY occurred_at_local ASC \
                 LIMIT $6"
            )
        } else {
            format!(
                "SELECT {COLUMNS} FROM attendance_events \
                 WHERE user_id = $1 AND status_id = ANY($2) AND local_date = $3 \
                 ORDER BY occurred_at_local ASC \
                 LIMIT $4"
            )
        };

        let mut q = sqlx::query_as::<_, AttendanceEvent>(&query)
            .bind(user_id)
            .bind(&contributing[..])
            .bind(date);

        if crosses_midnight {
            q = q.bind(date + Duration::days(1)).bind(noon());
        }

        q.bind(limit).fetch_all(pool).await
    }

    /// Mark a set of events PROCESSED, clearing any prior failure message.
    pub async fn mark_processed(pool: &PgPool, ids: &[DbId]) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE attendance_events \
             SET status_id = $2, error_message = NULL, updated_at = NOW() \
             WHERE id = ANY($1)",
        )
        .bind(ids)
        .bind(EventStatus::Processed.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a set of events FAILED with the reconciliation error attached
    /// for operator visibility, bumping each retry count.
    pub async fn mark_failed(
        pool: &PgPool,
        ids: &[DbId],
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE attendance_events \
             SET status_id = $2, error_message = $3, retry_count = retry_count + 1, \
                 updated_at = NOW() \
             WHERE id = ANY($1)",
        )
        .bind(ids)
        .bind(EventStatus::Failed.id())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Lock an event row for quarantine resolution.
    pub async fn find_by_id_for_update_tx(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<AttendanceEvent>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM attendance_events WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, AttendanceEvent>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Apply a quarantine resolution: reassign the user, flip the status
    /// to PROCESSED, and stamp the resolver. The `status_id` guard makes
    /// a second resolution observe zero rows.
    pub async fn apply_quarantine_resolution_tx(
        conn: &mut PgConnection,
        id: DbId,
        target_user_id: DbId,
        actor: &str,
    ) -> Result<Option<AttendanceEvent>, sqlx::Error> {
        let query = format!(
            "UPDATE attendance_events \
             SET user_id = $2, status_id = $3, resolved_by = $4, resolved_at = NOW(), \
                 updated_at = NOW() \
             WHERE id = $1 AND status_id = $5 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AttendanceEvent>(&query)
            .bind(id)
            .bind(target_user_id)
            .bind(EventStatus::Processed.id())
            .bind(actor)
            .bind(EventStatus::Quarantined.id())
            .fetch_optional(conn)
            .await
    }

    /// List events with optional filters and pagination.
    pub async fn list(
        pool: &PgPool,
        params: &EventListQuery,
    ) -> Result<Vec<AttendanceEvent>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        // Build the WHERE clause and track the next bind parameter index.
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if params.user_id.is_some() {
            conditions.push(format!("user_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.device_id.is_some() {
            conditions.push(format!("device_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.status_id.is_some() {
            conditions.push(format!("status_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.from.is_some() {
            conditions.push(format!("local_date >= ${bind_idx}"));
            bind_idx += 1;
        }
        if params.to.is_some() {
            conditions.push(format!("local_date <= ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM attendance_events \
             {where_clause} \
             ORDER BY occurred_at DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, AttendanceEvent>(&query);

        if let Some(uid) = params.user_id {
            q = q.bind(uid);
        }
        if let Some(device) = &params.device_id {
            q = q.bind(device);
        }
        if let Some(sid) = params.status_id {
            q = q.bind(sid);
        }
        if let Some(from) = params.from {
            q = q.bind(from);
        }
        if let Some(to) = params.to {
            q = q.bind(to);
        }

        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Distinct resolved users with contributing events on a local day.
    /// Drives the batch reconciliation fan-out.
    pub async fn user_ids_with_events_on(
        pool: &PgPool,
        date: NaiveDate,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let statuses: [StatusId; 2] = [EventStatus::Processed.id(), EventStatus::Failed.id()];
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT DISTINCT user_id FROM attendance_events \
             WHERE local_date = $1 AND user_id IS NOT NULL AND status_id = ANY($2) \
             ORDER BY user_id",
        )
        .bind(date)
        .bind(&statuses[..])
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
