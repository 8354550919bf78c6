//! Processing log entity model.
//!
//! One row per reconciliation attempt, successful or not. Append-only;
//! rows are never mutated after insert.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;
use timeclock_core::types::{DbId, Timestamp};

/// Known reconciliation triggers recorded in `processing_logs.trigger`.
pub mod triggers {
    pub const WEBHOOK: &str = "webhook";
    pub const MANUAL: &str = "manual";
    pub const BATCH: &str = "batch";
    pub const QUARANTINE: &str = "quarantine";
    pub const RETRY: &str = "retry";
}

/// A row from the `processing_logs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProcessingLog {
    pub id: DbId,
    pub user_id: DbId,
    pub work_date: NaiveDate,
    pub trigger: String,
    pub event_count: i32,
    pub session_count: i32,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: i64,
    pub created_at: Timestamp,
}

/// Insert DTO written at the end of every reconciliation attempt.
#[derive(Debug, Clone)]
pub struct NewProcessingLog {
    pub user_id: DbId,
    pub work_date: NaiveDate,
    pub trigger: String,
    pub event_count: i32,
    pub session_count: i32,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: i64,
}
