//! Attendance event entity models and DTOs.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use timeclock_core::types::{DbId, Timestamp};

use super::status::StatusId;

// ---------------------------------------------------------------------------
// Punch kind
// ---------------------------------------------------------------------------

/// Direction of a punch as stored in `attendance_events.punch_kind`.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunchKind {
    ClockIn = 1,
    ClockOut = 2,
}

impl PunchKind {
    pub fn id(self) -> i16 {
        self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Self::ClockIn),
            2 => Some(Self::ClockOut),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `attendance_events` table. Immutable fact; only the
/// processing status, retry bookkeeping, and quarantine-resolution stamps
/// ever change after insert.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttendanceEvent {
    pub id: DbId,
    /// Internal user, once identity is resolved.
    pub user_id: Option<DbId>,
    /// Device-local user identifier as sent by the terminal.
    pub terminal_user_id: Option<String>,
    pub device_id: String,
    pub punch_kind: i16,
    /// Instant of the punch in UTC.
    pub occurred_at: Timestamp,
    /// Instant of the punch in device-local time.
    pub occurred_at_local: NaiveDateTime,
    /// Local calendar day the event is bucketed to for reconciliation.
    pub local_date: NaiveDate,
    pub utc_offset_minutes: i32,
    /// Caller-supplied token that makes ingestion idempotent. Globally
    /// unique (`uq_attendance_events_idempotency_key`).
    pub idempotency_key: String,
    pub signature_valid: bool,
    pub status_id: StatusId,
    pub retry_count: i32,
    pub error_message: Option<String>,
    /// Operator that resolved the quarantine, when it was quarantined.
    pub resolved_by: Option<String>,
    pub resolved_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Insert DTO built by webhook intake after validation, identity
/// resolution, and timezone conversion.
#[derive(Debug, Clone)]
pub struct NewAttendanceEvent {
    pub user_id: Option<DbId>,
    pub terminal_user_id: Option<String>,
    pub device_id: String,
    pub punch_kind: PunchKind,
    pub occurred_at: Timestamp,
    pub occurred_at_local: NaiveDateTime,
    pub local_date: NaiveDate,
    pub utc_offset_minutes: i32,
    pub idempotency_key: String,
    pub signature_valid: bool,
    pub status: super::status::EventStatus,
}

/// Query parameters for `GET /api/v1/events`.
#[derive(Debug, Deserialize)]
pub struct EventListQuery {
    pub user_id: Option<DbId>,
    pub device_id: Option<String>,
    pub status_id: Option<StatusId>,
    /// Inclusive lower bound on `local_date`.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on `local_date`.
    pub to: Option<NaiveDate>,
    /// Maximum number of results. Defaults to 50, capped at 200.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punch_kind_round_trip() {
        assert_eq!(PunchKind::from_id(PunchKind::ClockIn.id()), Some(PunchKind::ClockIn));
        assert_eq!(PunchKind::from_id(PunchKind::ClockOut.id()), Some(PunchKind::ClockOut));
        assert_eq!(PunchKind::from_id(9), None);
    }
}
