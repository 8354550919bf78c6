//! Repository for the `reconcile_jobs` durable queue table.
//!
//! Coalescing: `uq_reconcile_jobs_active_key` is a partial unique index on
//! `job_key` over pending/running rows, so enqueueing an employee-day that
//! already has a job in flight inserts nothing. Claiming uses
//! `FOR UPDATE SKIP LOCKED` to prevent double-dispatch across workers.

use sqlx::{PgConnection, PgPool};
use timeclock_core::types::DbId;

use crate::models::job::{EnqueueJob, ReconcileJob};
use crate::models::status::{JobStatus, StatusId};

/// Column list for `reconcile_jobs` queries.
const COLUMNS: &str = "\
    id, job_type, job_key, payload, priority, status_id, \
    attempts, max_attempts, run_after, last_error, \
    claimed_at, completed_at, created_at, updated_at";

/// Provides queue operations for reconciliation jobs.
pub struct JobRepo;

impl JobRepo {
    /// Enqueue a job. Returns `None` when a pending/running job with the
    /// same key already exists (the re-enqueue coalesced into it).
    pub async fn enqueue(
        pool: &PgPool,
        input: &EnqueueJob,
    ) -> Result<Option<ReconcileJob>, sqlx::Error> {
        sqlx::query_as::<_, ReconcileJob>(&enqueue_query())
            .bind(&input.job_type)
            .bind(&input.job_key)
            .bind(&input.payload)
            .bind(input.priority)
            .bind(JobStatus::Pending.id())
            .bind(input.max_attempts)
            .fetch_optional(pool)
            .await
    }

    /// Transactional variant of [`enqueue`](Self::enqueue), used where the
    /// enqueue must commit atomically with other effects (quarantine
    /// resolution).
    pub async fn enqueue_tx(
        conn: &mut PgConnection,
        input: &EnqueueJob,
    ) -> Result<Option<ReconcileJob>, sqlx::Error> {
        sqlx::query_as::<_, ReconcileJob>(&enqueue_query())
            .bind(&input.job_type)
            .bind(&input.job_key)
            .bind(&input.payload)
            .bind(input.priority)
            .bind(JobStatus::Pending.id())
            .bind(input.max_attempts)
            .fetch_optional(conn)
            .await
    }

    /// Atomically claim the next due pending job.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` to prevent double-dispatch
    /// when multiple worker loops are running.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<ReconcileJob>, sqlx::Error> {
        let query = format!(
            "UPDATE reconcile_jobs \
             SET status_id = $1, claimed_at = NOW(), updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM reconcile_jobs \
                 WHERE status_id = $2 AND run_after <= NOW() \
                 ORDER BY priority DESC, created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ReconcileJob>(&query)
            .bind(JobStatus::Running.id())
            .bind(JobStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Mark a job completed.
    pub async fn complete(pool: &PgPool, job_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE reconcile_jobs \
             SET status_id = $2, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(JobStatus::Completed.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Return a failed attempt to the queue with backoff: status back to
    /// pending, attempt counted, `run_after` pushed into the future.
    pub async fn retry(
        pool: &PgPool,
        job_id: DbId,
        error: &str,
        delay_secs: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE reconcile_jobs \
             SET status_id = $2, attempts = attempts + 1, last_error = $3, \
                 run_after = NOW() + ($4 * INTERVAL '1 second'), \
                 claimed_at = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(JobStatus::Pending.id())
        .bind(error)
        .bind(delay_secs as f64)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a job permanently failed after its attempts are exhausted.
    /// The job stays visible for manual retry; nothing is dropped.
    pub async fn fail(pool: &PgPool, job_id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE reconcile_jobs \
             SET status_id = $2, attempts = attempts + 1, last_error = $3, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(JobStatus::Failed.id())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Count jobs in a given status. Used by the health endpoint to expose
    /// queue depth.
    pub async fn count_by_status(
        pool: &PgPool,
        status: StatusId,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM reconcile_jobs WHERE status_id = $1")
                .bind(status)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }
}

/// Shared INSERT for both enqueue variants. The conflict target matches
/// the partial unique index predicate so in-flight duplicates coalesce.
fn enqueue_query() -> String {
    format!(
        "INSERT INTO reconcile_jobs \
             (job_type, job_key, payload, priority, status_id, max_attempts) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (job_key) WHERE status_id IN (1, 2) DO NOTHING \
         RETURNING {COLUMNS}"
    )
}
