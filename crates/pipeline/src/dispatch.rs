//! Generic job dispatch: a `(job_type, payload) -> Result` handler table
//! driven by claim loops over the durable queue, independent of any
//! specific queue backend.
//!
//! Claiming uses `FOR UPDATE SKIP LOCKED` (see `JobRepo::claim_next`), so
//! any number of loops across any number of worker processes never
//! double-dispatch a job.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use timeclock_core::scheduling::retry_delay_secs;
use timeclock_db::models::job::ReconcileJob;
use timeclock_db::models::processing_log::triggers;
use timeclock_db::repositories::JobRepo;
use timeclock_db::DbPool;

use crate::error::PipelineError;
use crate::reconcile::{ReconcileJobPayload, Reconciler};

/// Default pause between polls when the queue is empty.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Handler table
// ---------------------------------------------------------------------------

/// One job-type handler. Implementations own their dependencies and are
/// shared across claim loops.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &ReconcileJob) -> Result<(), PipelineError>;
}

/// Dispatches claimed jobs to registered handlers and settles the queue
/// row according to the outcome.
pub struct Dispatcher {
    pool: DbPool,
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
    poll_interval: Duration,
}

impl Dispatcher {
    pub fn new(pool: DbPool, poll_interval: Duration) -> Self {
        Self {
            pool,
            handlers: HashMap::new(),
            poll_interval,
        }
    }

    /// Register a handler for a job type. Builder-style for startup wiring.
    pub fn register(mut self, job_type: &'static str, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(job_type, handler);
        self
    }

    pub fn handles(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Run one claim loop until shutdown is requested.
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            match self.tick().await {
                // A job ran; poll again immediately, more may be due.
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "Queue poll failed");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }
        tracing::info!("Dispatcher loop stopped");
    }

    /// Claim and execute at most one due job. Returns whether one ran.
    pub async fn tick(&self) -> Result<bool, sqlx::Error> {
        let Some(job) = JobRepo::claim_next(&self.pool).await? else {
            return Ok(false);
        };
        self.execute(job).await;
        Ok(true)
    }

    async fn execute(&self, job: ReconcileJob) {
        let Some(handler) = self.handlers.get(job.job_type.as_str()).cloned() else {
            tracing::error!(job_id = job.id, job_type = %job.job_type, "No handler registered");
            if let Err(err) =
                JobRepo::fail(&self.pool, job.id, "no handler registered for job type").await
            {
                tracing::error!(job_id = job.id, error = %err, "Failed to settle job");
            }
            return;
        };

        match handler.handle(&job).await {
            Ok(()) => {
                if let Err(err) = JobRepo::complete(&self.pool, job.id).await {
                    tracing::error!(job_id = job.id, error = %err, "Failed to complete job");
                }
            }
            Err(handler_err) => {
                let message = handler_err.to_string();
                match settle_failure(handler_err.is_retryable(), job.attempts, job.max_attempts)
                {
                    FailureStep::Retry { delay_secs } => {
                        tracing::warn!(
                            job_id = job.id,
                            attempt = job.attempts + 1,
                            delay_secs,
                            error = %message,
                            "Job failed; retrying with backoff",
                        );
                        if let Err(err) =
                            JobRepo::retry(&self.pool, job.id, &message, delay_secs).await
                        {
                            tracing::error!(job_id = job.id, error = %err, "Failed to requeue job");
                        }
                    }
                    FailureStep::Fail => {
                        tracing::error!(
                            job_id = job.id,
                            attempts = job.attempts + 1,
                            error = %message,
                            "Job permanently failed; surfaced for manual retry",
                        );
                        if let Err(err) = JobRepo::fail(&self.pool, job.id, &message).await {
                            tracing::error!(job_id = job.id, error = %err, "Failed to settle job");
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Failure settlement
// ---------------------------------------------------------------------------

/// What to do with a failed attempt.
#[derive(Debug, PartialEq, Eq)]
enum FailureStep {
    Retry { delay_secs: i64 },
    Fail,
}

/// Retry transient failures with exponential backoff until the bounded
/// attempt count is exhausted; everything else fails permanently.
fn settle_failure(retryable: bool, attempts: i32, max_attempts: i32) -> FailureStep {
    let next_attempt = attempts + 1;
    if retryable && next_attempt < max_attempts {
        FailureStep::Retry {
            delay_secs: retry_delay_secs(next_attempt),
        }
    } else {
        FailureStep::Fail
    }
}

// ---------------------------------------------------------------------------
// Reconcile-day handler
// ---------------------------------------------------------------------------

/// Handler for `reconcile_day` jobs.
pub struct ReconcileDayHandler {
    reconciler: Arc<Reconciler>,
}

impl ReconcileDayHandler {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self { reconciler }
    }
}

#[async_trait]
impl JobHandler for ReconcileDayHandler {
    async fn handle(&self, job: &ReconcileJob) -> Result<(), PipelineError> {
        let payload: ReconcileJobPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| PipelineError::InvalidPayload(e.to_string()))?;

        // A retried attempt logs as such regardless of what first
        // triggered the job.
        let trigger = if job.attempts > 0 {
            triggers::RETRY
        } else {
            payload.trigger.as_str()
        };

        // A locked record is a skip, not a failure.
        self.reconciler
            .reconcile_day(payload.user_id, payload.work_date, trigger)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- settle_failure -------------------------------------------------------

    #[test]
    fn transient_failure_retries_with_backoff() {
        assert_eq!(
            settle_failure(true, 0, 5),
            FailureStep::Retry { delay_secs: 2 }
        );
        assert_eq!(
            settle_failure(true, 3, 5),
            FailureStep::Retry { delay_secs: 16 }
        );
    }

    #[test]
    fn exhausted_attempts_fail_permanently() {
        assert_eq!(settle_failure(true, 4, 5), FailureStep::Fail);
        assert_eq!(settle_failure(true, 10, 5), FailureStep::Fail);
    }

    #[test]
    fn non_retryable_failure_fails_immediately() {
        assert_eq!(settle_failure(false, 0, 5), FailureStep::Fail);
    }
}
