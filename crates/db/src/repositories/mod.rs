//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument. Multi-statement units of
//! work take `&mut PgConnection` in `_tx` variants so callers control the
//! transaction boundary.

pub mod event_repo;
pub mod job_repo;
pub mod mapping_repo;
pub mod processing_log_repo;
pub mod record_repo;

pub use event_repo::EventRepo;
pub use job_repo::JobRepo;
pub use mapping_repo::MappingRepo;
pub use processing_log_repo::ProcessingLogRepo;
pub use record_repo::RecordRepo;

/// Whether `err` is a PostgreSQL unique-constraint violation (error code
/// 23505) on the named constraint.
///
/// Used by intake to detect two deliveries racing on the same idempotency
/// key: the loser observes the violation, re-reads, and returns the row
/// that won.
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505")
                && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}
