//! Attendance record entity models, audit entry types, and DTOs.
//!
//! The adjustment and approval histories are append-only: the repository
//! layer only ever concatenates to the JSONB arrays (`jsonb ||`), so an
//! entry can never be edited or removed once written.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use timeclock_core::session::WorkSession;
use timeclock_core::types::{DbId, Timestamp};
use uuid::Uuid;

use super::status::StatusId;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `attendance_records` table: one per (user, work date),
/// enforced by `uq_attendance_records_user_date`. Never hard-deleted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttendanceRecord {
    pub id: DbId,
    pub user_id: DbId,
    pub work_date: NaiveDate,
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
    /// First clock-in of the day, formatted local `HH:MM`.
    pub first_clock_in: Option<String>,
    /// Last clock-out of the day, formatted local `HH:MM`.
    pub last_clock_out: Option<String>,
    /// Ordered ids of the events that produced this record.
    pub event_ids: Json<Vec<DbId>>,
    /// Ordered work sessions the events paired into.
    pub sessions: Json<Vec<WorkSession>>,
    /// Append-only manual adjustment audit trail.
    pub adjustments: Json<Vec<AdjustmentEntry>>,
    /// Append-only approval audit trail.
    pub approvals: Json<Vec<ApprovalEntry>>,
    /// While locked, no automated reconciliation or event-driven mutation
    /// may alter the record.
    pub is_locked: bool,
    pub requires_approval: bool,
    /// Optimistic concurrency token; every mutation checks and bumps it.
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Audit entries
// ---------------------------------------------------------------------------

/// Kind of a manual adjustment, scoping the before/after snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    EditClockTimes,
    MarkAbsentPaid,
    MarkAbsentUnpaid,
    OverrideStatus,
    AddMinutes,
    RemoveMinutes,
}

/// One entry in the adjustment audit trail. Captures the before/after
/// values scoped to the adjustment kind, the actor, and the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentEntry {
    pub id: Uuid,
    pub kind: AdjustmentKind,
    pub before: serde_json::Value,
    pub after: serde_json::Value,
    pub actor: String,
    pub reason: String,
    pub applied_at: Timestamp,
}

/// One entry in the approval audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalEntry {
    pub actor: String,
    pub level: i16,
    /// Whether this approval locked the record.
    pub locks: bool,
    pub approved_at: Timestamp,
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Minute field targeted by an add/remove-minutes adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinuteField {
    Worked,
    Overtime,
    Night,
    Holiday,
}

/// Request body for `POST /records/{user}/{date}/adjust`.
#[derive(Debug, Deserialize)]
pub struct AdjustRecordRequest {
    pub actor: String,
    pub reason: String,
    #[serde(flatten)]
    pub adjustment: AdjustmentRequest,
}

/// The adjustment to apply, tagged by kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdjustmentRequest {
    /// Edit the displayed clock times (`HH:MM` local).
    EditClockTimes {
        first_clock_in: Option<String>,
        last_clock_out: Option<String>,
    },
    /// Mark the day absent but paid (scheduled minutes credited as worked).
    MarkAbsentPaid,
    /// Mark the day absent and unpaid (all minute totals zeroed).
    MarkAbsentUnpaid,
    /// Override the record status outright.
    OverrideStatus { status_id: StatusId },
    /// Add minutes to one minute field.
    AddMinutes { field: MinuteField, minutes: i32 },
    /// Remove minutes from one minute field (floored at zero).
    RemoveMinutes { field: MinuteField, minutes: i32 },
}

/// Request body for `POST /records/{user}/{date}/approve`.
#[derive(Debug, Deserialize)]
pub struct ApproveRecordRequest {
    pub actor: String,
    /// Approval level (1 = supervisor, 2 = payroll, site-defined beyond).
    pub level: i16,
    /// Whether this approval also locks the record.
    #[serde(default)]
    pub lock: bool,
}

/// Request body for `POST /records/{user}/{date}/unlock`.
#[derive(Debug, Deserialize)]
pub struct UnlockRecordRequest {
    pub actor: String,
}

/// Query parameters for `GET /api/v1/records`.
#[derive(Debug, Deserialize)]
pub struct RecordListQuery {
    pub user_id: Option<DbId>,
    pub status_id: Option<StatusId>,
    /// Inclusive lower bound on `work_date`.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on `work_date`.
    pub to: Option<NaiveDate>,
    /// Only records awaiting approval.
    #[serde(default)]
    pub requires_approval: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjustment_request_parses_tagged_kind() {
        let body = serde_json::json!({
            "actor": "ops.lee",
            "reason": "terminal double-punch",
            "kind": "add_minutes",
            "field": "worked",
            "minutes": 30,
        });
        let parsed: AdjustRecordRequest = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.actor, "ops.lee");
        match parsed.adjustment {
            AdjustmentRequest::AddMinutes { field, minutes } => {
                assert_eq!(field, MinuteField::Worked);
                assert_eq!(minutes, 30);
            }
            other => panic!("unexpected adjustment: {other:?}"),
        }
    }

    #[test]
    fn edit_clock_times_allows_partial_fields() {
        let body = serde_json::json!({
            "actor": "ops.lee",
            "reason": "missed badge-out",
            "kind": "edit_clock_times",
            "last_clock_out": "18:00",
        });
        let parsed: AdjustRecordRequest = serde_json::from_value(body).unwrap();
        match parsed.adjustment {
            AdjustmentRequest::EditClockTimes {
                first_clock_in,
                last_clock_out,
            } => {
                assert!(first_clock_in.is_none());
                assert_eq!(last_clock_out.as_deref(), Some("18:00"));
            }
            other => panic!("unexpected adjustment: {other:?}"),
        }
    }

    #[test]
    fn approve_request_lock_defaults_to_false() {
        let body = serde_json::json!({"actor": "payroll.kim", "level": 2});
        let parsed: ApproveRecordRequest = serde_json::from_value(body).unwrap();
        assert!(!parsed.lock);
    }
}
