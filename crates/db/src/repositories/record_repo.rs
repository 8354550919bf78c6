//! Repository for the `attendance_records` table.
//!
//! Every mutation is a version-checked read-modify-write: the UPDATE
//! carries `version = $expected` and bumps it, so a concurrent
//! reconciliation and a concurrent manual adjustment can never lose each
//! other's write. The loser observes zero rows and retries or errors.
//! History arrays are only ever appended to (`|| jsonb_build_array(...)`).

use chrono::{NaiveDate, NaiveTime};
use sqlx::types::Json;
use sqlx::PgPool;
use timeclock_core::session::WorkSession;
use timeclock_core::types::DbId;

use crate::models::record::{
    AdjustmentEntry, ApprovalEntry, AttendanceRecord, RecordListQuery,
};
use crate::models::status::StatusId;

/// Column list for `attendance_records` queries.
const COLUMNS: &str = "\
    id, user_id, work_date, status_id, \
    scheduled_start, scheduled_end, scheduled_minutes, \
    worked_minutes, late_minutes, early_leave_minutes, overtime_minutes, \
    night_minutes, holiday_minutes, first_clock_in, last_clock_out, \
    event_ids, sessions, adjustments, approvals, \
    is_locked, requires_approval, version, created_at, updated_at";

/// Maximum page size for record listing.
const MAX_LIMIT: i64 = 200;

/// Default page size for record listing.
const DEFAULT_LIMIT: i64 = 50;

// ---------------------------------------------------------------------------
// Write DTOs
// ---------------------------------------------------------------------------

/// The full set of computed fields a reconciliation run writes.
#[derive(Debug, Clone)]
pub struct ReconciledFields {
    pub status_id: StatusId,
    pub scheduled_start: Option<NaiveTime>,
    pub scheduled_end: Option<NaiveTime>,
    pub scheduled_minutes: Option<i32>,
    pub worked_minutes: i32,
    pub late_minutes: i32,
    pub early_leave_minutes: i32,
    pub overtime_minutes: i32,
    pub night_minutes: i32,
    pub holiday_minutes: i32,
    pub first_clock_in: Option<String>,
    pub last_clock_out: Option<String>,
    pub event_ids: Vec<DbId>,
    pub sessions: Vec<WorkSession>,
    pub requires_approval: bool,
}

/// Partial field mutation applied alongside an adjustment entry. `None`
/// leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub status_id: Option<StatusId>,
    pub worked_minutes: Option<i32>,
    pub late_minutes: Option<i32>,
    pub early_leave_minutes: Option<i32>,
    pub overtime_minutes: Option<i32>,
    pub night_minutes: Option<i32>,
    pub holiday_minutes: Option<i32>,
    pub first_clock_in: Option<String>,
    pub last_clock_out: Option<String>,
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Provides operations on daily attendance records.
pub struct RecordRepo;

impl RecordRepo {
    /// Find the record for a (user, work date) pair.
    pub async fn find(
        pool: &PgPool,
        user_id: DbId,
        work_date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM attendance_records WHERE user_id = $1 AND work_date = $2"
        );
        sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(user_id)
            .bind(work_date)
            .fetch_optional(pool)
            .await
    }

    /// Create the record on a day's first reconciliation. Returns `None`
    /// when a concurrent run won the insert race
    /// (`uq_attendance_records_user_date`); the caller re-reads and takes
    /// the update path.
    pub async fn insert_reconciled(
        pool: &PgPool,
        user_id: DbId,
        work_date: NaiveDate,
        fields: &ReconciledFields,
    ) -> Result<Option<AttendanceRecord>, sqlx::Error> {
        let query = format!(
            "INSERT INTO attendance_records \
                 (user_id, work_date, status_id, \
                  scheduled_start, scheduled_end, scheduled_minutes, \
                  worked_minutes, late_minutes, early_leave_minutes, overtime_minutes, \
                  night_minutes, holiday_minutes, first_clock_in, last_clock_out, \
                  event_ids, sessions, requires_approval) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, \
                     $15, $16, $17) \
             ON CONFLICT (user_id, work_date) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(user_id)
            .bind(work_date)
            .bind(fields.status_id)
            .bind(fields.scheduled_start)
            .bind(fields.scheduled_end)
            .bind(fields.scheduled_minutes)
            .bind(fields.worked_minutes)
            .bind(fields.late_minutes)
            .bind(fields.early_leave_minutes)
            .bind(fields.overtime_minutes)
            .bind(fields.night_minutes)
            .bind(fields.holiday_minutes)
            .bind(&fields.first_clock_in)
            .bind(&fields.last_clock_out)
            .bind(Json(&fields.event_ids))
            .bind(Json(&fields.sessions))
            .bind(fields.requires_approval)
            .fetch_optional(pool)
            .await
    }

    /// Overwrite the computed fields from a reconciliation run.
    ///
    /// Guarded by the optimistic version and the lock flag: returns `None`
    /// when the version moved underneath us or the record is locked, and
    /// the caller decides which it was by re-reading.
    pub async fn update_reconciled(
        pool: &PgPool,
        id: DbId,
        expected_version: i64,
        fields: &ReconciledFields,
    ) -> Result<Option<AttendanceRecord>, sqlx::Error> {
        let query = format!(
            "UPDATE attendance_records SET \
                 status_id = $3, \
                 scheduled_start = $4, scheduled_end = $5, scheduled_minutes = $6, \
                 worked_minutes = $7, late_minutes = $8, early_leave_minutes = $9, \
                 overtime_minutes = $10, night_minutes = $11, holiday_minutes = $12, \
                 first_clock_in = $13, last_clock_out = $14, \
                 event_ids = $15, sessions = $16, requires_approval = $17, \
                 version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $2 AND is_locked = FALSE \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(id)
            .bind(expected_version)
            .bind(fields.status_id)
            .bind(fields.scheduled_start)
            .bind(fields.scheduled_end)
            .bind(fields.scheduled_minutes)
            .bind(fields.worked_minutes)
            .bind(fields.late_minutes)
            .bind(fields.early_leave_minutes)
            .bind(fields.overtime_minutes)
            .bind(fields.night_minutes)
            .bind(fields.holiday_minutes)
            .bind(&fields.first_clock_in)
            .bind(&fields.last_clock_out)
            .bind(Json(&fields.event_ids))
            .bind(Json(&fields.sessions))
            .bind(fields.requires_approval)
            .fetch_optional(pool)
            .await
    }

    /// Apply a manual adjustment: patch the mutated columns, append the
    /// audit entry, and flag the record for approval. Version-checked and
    /// rejected on locked records at the SQL level.
    pub async fn append_adjustment(
        pool: &PgPool,
        id: DbId,
        expected_version: i64,
        entry: &AdjustmentEntry,
        patch: &RecordPatch,
    ) -> Result<Option<AttendanceRecord>, sqlx::Error> {
        let query = format!(
            "UPDATE attendance_records SET \
                 status_id = COALESCE($3, status_id), \
                 worked_minutes = COALESCE($4, worked_minutes), \
                 late_minutes = COALESCE($5, late_minutes), \
                 early_leave_minutes = COALESCE($6, early_leave_minutes), \
                 overtime_minutes = COALESCE($7, overtime_minutes), \
                 night_minutes = COALESCE($8, night_minutes), \
                 holiday_minutes = COALESCE($9, holiday_minutes), \
                 first_clock_in = COALESCE($10, first_clock_in), \
                 last_clock_out = COALESCE($11, last_clock_out), \
                 adjustments = adjustments || jsonb_build_array($12::jsonb), \
                 requires_approval = TRUE, \
                 version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $2 AND is_locked = FALSE \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(id)
            .bind(expected_version)
            .bind(patch.status_id)
            .bind(patch.worked_minutes)
            .bind(patch.late_minutes)
            .bind(patch.early_leave_minutes)
            .bind(patch.overtime_minutes)
            .bind(patch.night_minutes)
            .bind(patch.holiday_minutes)
            .bind(&patch.first_clock_in)
            .bind(&patch.last_clock_out)
            .bind(Json(entry))
            .fetch_optional(pool)
            .await
    }

    /// Append an approval entry. An approval that locks sets `is_locked`;
    /// every approval clears `requires_approval`.
    pub async fn append_approval(
        pool: &PgPool,
        id: DbId,
        expected_version: i64,
        entry: &ApprovalEntry,
    ) -> Result<Option<AttendanceRecord>, sqlx::Error> {
        let query = format!(
            "UPDATE attendance_records SET \
                 approvals = approvals || jsonb_build_array($3::jsonb), \
                 is_locked = is_locked OR $4, \
                 requires_approval = FALSE, \
                 version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(id)
            .bind(expected_version)
            .bind(Json(entry))
            .bind(entry.locks)
            .fetch_optional(pool)
            .await
    }

    /// Clear the lock flag. Prior approvals remain as history. Returns
    /// `None` when the version moved or the record is not locked.
    pub async fn set_unlocked(
        pool: &PgPool,
        id: DbId,
        expected_version: i64,
    ) -> Result<Option<AttendanceRecord>, sqlx::Error> {
        let query = format!(
            "UPDATE attendance_records SET \
                 is_locked = FALSE, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $2 AND is_locked = TRUE \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AttendanceRecord>(&query)
            .bind(id)
            .bind(expected_version)
            .fetch_optional(pool)
            .await
    }

    /// List records with optional filters and pagination.
    pub async fn list(
        pool: &PgPool,
        params: &RecordListQuery,
    ) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if params.user_id.is_some() {
            conditions.push(format!("user_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.status_id.is_some() {
            conditions.push(format!("status_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.from.is_some() {
            conditions.push(format!("work_date >= ${bind_idx}"));
            bind_idx += 1;
        }
        if params.to.is_some() {
            conditions.push(format!("work_date <= ${bind_idx}"));
            bind_idx += 1;
        }
        if params.requires_approval {
            conditions.push("requires_approval = TRUE".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM attendance_records \
             {where_clause} \
             ORDER BY work_date DESC, user_id ASC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );

        let mut q = sqlx::query_as::<_, AttendanceRecord>(&query);

        if let Some(uid) = params.user_id {
            q = q.bind(uid);
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
}
