//! Repository for the `processing_logs` table. Insert-only plus reads;
//! rows are never mutated after insert.

use chrono::NaiveDate;
use sqlx::PgPool;
use timeclock_core::types::DbId;

use crate::models::processing_log::{NewProcessingLog, ProcessingLog};

/// Column list for `processing_logs` queries.
const COLUMNS: &str = "\
    id, user_id, work_date, trigger, event_count, session_count, \
    success, error, duration_ms, created_at";

/// Default page size for log listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides append and read operations for reconciliation audit logs.
pub struct ProcessingLogRepo;

impl ProcessingLogRepo {
    /// Append one reconciliation attempt.
    pub async fn insert(
        pool: &PgPool,
        input: &NewProcessingLog,
    ) -> Result<ProcessingLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO processing_logs \
                 (user_id, work_date, trigger, event_count, session_count, \
                  success, error, duration_ms) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProcessingLog>(&query)
            .bind(input.user_id)
            .bind(input.work_date)
            .bind(&input.trigger)
            .bind(input.event_count)
            .bind(input.session_count)
            .bind(input.success)
            .bind(&input.error)
            .bind(input.duration_ms)
            .fetch_one(pool)
            .await
    }

    /// List attempts for a (user, work date) pair, most recent first.
    pub async fn list_for_day(
        pool: &PgPool,
        user_id: DbId,
        work_date: NaiveDate,
        limit: Option<i64>,
    ) -> Result<Vec<ProcessingLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM processing_logs \
             WHERE user_id = $1 AND work_date = $2 \
             ORDER BY created_at DESC \
             LIMIT $3"
        );
        sqlx::query_as::<_, ProcessingLog>(&query)
            .bind(user_id)
            .bind(work_date)
            .bind(limit.unwrap_or(DEFAULT_LIMIT))
            .fetch_all(pool)
            .await
    }
}
