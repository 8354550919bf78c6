//! Reconciliation job scheduling constants and helpers.
//!
//! This module lives in `core` (zero internal deps) so it can be used by
//! both the API/repository layer and the worker.

use chrono::NaiveDate;

use crate::types::DbId;

// ---------------------------------------------------------------------------
// Priority constants
// ---------------------------------------------------------------------------

/// Priority for operator-triggered reprocessing. Dispatched before all others.
pub const PRIORITY_URGENT: i32 = 10;

/// Priority for webhook-triggered reconciliation. Default.
pub const PRIORITY_NORMAL: i32 = 0;

/// Priority for batch backfill runs. Dispatched last.
pub const PRIORITY_BACKGROUND: i32 = -10;

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Maximum delivery attempts for a reconciliation job before it is marked
/// permanently failed and surfaced for manual retry.
pub const MAX_JOB_ATTEMPTS: i32 = 5;

/// Maximum backoff delay in seconds between retry attempts.
pub const MAX_RETRY_BACKOFF_SECS: i64 = 3600;

/// Compute the retry delay in seconds using exponential backoff.
///
/// Follows 2^attempt seconds, capped at [`MAX_RETRY_BACKOFF_SECS`].
pub fn retry_delay_secs(attempt: i32) -> i64 {
    2i64.pow(attempt.clamp(0, 30) as u32).min(MAX_RETRY_BACKOFF_SECS)
}

// ---------------------------------------------------------------------------
// Job identity
// ---------------------------------------------------------------------------

/// Job type handled by the worker's dispatch table.
pub const JOB_RECONCILE_DAY: &str = "reconcile_day";

/// Derive the stable queue key for a `(user, date)` reconciliation job.
///
/// The queue dedupes on this key while a job is pending or running, so
/// re-enqueueing the same employee-day is a no-op and at most one
/// reconciliation per day is ever in flight.
pub fn reconcile_job_key(user_id: DbId, work_date: NaiveDate) -> String {
    format!("reconcile:{user_id}:{work_date}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- retry_delay_secs -----------------------------------------------------

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(retry_delay_secs(0), 1);
        assert_eq!(retry_delay_secs(1), 2);
        assert_eq!(retry_delay_secs(2), 4);
        assert_eq!(retry_delay_secs(3), 8);
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(retry_delay_secs(30), MAX_RETRY_BACKOFF_SECS);
    }

    #[test]
    fn negative_attempt_clamps_to_first_delay() {
        assert_eq!(retry_delay_secs(-1), 1);
    }

    // -- reconcile_job_key ----------------------------------------------------

    #[test]
    fn job_key_is_stable() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        assert_eq!(reconcile_job_key(42, date), "reconcile:42:2026-03-14");
        assert_eq!(reconcile_job_key(42, date), reconcile_job_key(42, date));
    }

    #[test]
    fn job_key_differs_per_user_and_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let next = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert_ne!(reconcile_job_key(1, date), reconcile_job_key(2, date));
        assert_ne!(reconcile_job_key(1, date), reconcile_job_key(1, next));
    }

    // -- priorities -----------------------------------------------------------

    #[test]
    fn urgent_outranks_normal_outranks_background() {
        assert!(PRIORITY_URGENT > PRIORITY_NORMAL);
        assert!(PRIORITY_NORMAL > PRIORITY_BACKGROUND);
    }
}
