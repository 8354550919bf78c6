use chrono::NaiveDate;
use timeclock_core::error::CoreError;
use timeclock_core::types::DbId;

/// Error type for intake, reconciliation, and lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A domain-level error from `timeclock_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The webhook body failed to parse or validate.
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    /// The record's optimistic version moved during a read-modify-write.
    /// Transient; the job retries.
    #[error("Concurrent modification of record for user {user_id} on {work_date}")]
    VersionConflict { user_id: DbId, work_date: NaiveDate },
}

impl PipelineError {
    /// Whether a job failing with this error should be retried with
    /// backoff. Precondition and validation errors will fail the same way
    /// every time and go straight to permanent failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Database(_) | PipelineError::VersionConflict { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_errors_are_retryable() {
        let err = PipelineError::Database(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
    }

    #[test]
    fn version_conflicts_are_retryable() {
        let err = PipelineError::VersionConflict {
            user_id: 1,
            work_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn precondition_errors_are_not_retryable() {
        let err = PipelineError::Core(CoreError::RecordLocked {
            user_id: 1,
            work_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        });
        assert!(!err.is_retryable());
    }

    #[test]
    fn payload_errors_are_not_retryable() {
        let err = PipelineError::InvalidPayload("missing device_id".into());
        assert!(!err.is_retryable());
    }
}
