use chrono::NaiveDate;

use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The webhook signature did not match the configured shared secret.
    /// Rejected at intake; nothing is persisted.
    #[error("Webhook signature verification failed")]
    InvalidSignature,

    /// An administrative operation targeted a day that has never been
    /// reconciled.
    #[error("No attendance record for user {user_id} on {work_date}")]
    RecordMissing { user_id: DbId, work_date: NaiveDate },

    /// The record is locked; no automated or manual mutation may touch it
    /// until it is explicitly unlocked.
    #[error("Attendance record for user {user_id} on {work_date} is locked")]
    RecordLocked { user_id: DbId, work_date: NaiveDate },

    /// Unlock was requested on a record that is not locked.
    #[error("Attendance record for user {user_id} on {work_date} is not locked")]
    NotLocked { user_id: DbId, work_date: NaiveDate },

    /// Quarantine resolution was requested on an event that is not quarantined.
    #[error("Attendance event {event_id} is not quarantined")]
    NotQuarantined { event_id: DbId },

    #[error("Internal error: {0}")]
    Internal(String),
}
