//! Reconciliation job queue entity models and DTOs.

use serde::Serialize;
use sqlx::FromRow;
use timeclock_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `reconcile_jobs` table.
///
/// `job_key` carries the stable `(user, date)` key; a partial unique index
/// over pending/running rows coalesces re-enqueues while a job is in
/// flight.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReconcileJob {
    pub id: DbId,
    pub job_type: String,
    pub job_key: String,
    pub payload: serde_json::Value,
    pub priority: i32,
    pub status_id: StatusId,
    pub attempts: i32,
    pub max_attempts: i32,
    /// Earliest instant the job may be claimed; pushed forward by retry
    /// backoff.
    pub run_after: Timestamp,
    pub last_error: Option<String>,
    pub claimed_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Insert DTO for enqueueing a job.
#[derive(Debug, Clone)]
pub struct EnqueueJob {
    pub job_type: String,
    pub job_key: String,
    pub payload: serde_json::Value,
    pub priority: i32,
    pub max_attempts: i32,
}
