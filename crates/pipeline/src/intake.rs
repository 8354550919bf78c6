//! Webhook intake: signature verification, idempotency, identity
//! resolution, timezone conversion, persistence, and job enqueueing.
//!
//! Intake never retries on its own: the device/gateway retries delivery,
//! which is safe because ingestion is idempotent end to end.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Deserialize;
use timeclock_core::error::CoreError;
use timeclock_core::policy::ReconcilePolicy;
use timeclock_core::scheduling::{
    reconcile_job_key, JOB_RECONCILE_DAY, MAX_JOB_ATTEMPTS, PRIORITY_NORMAL,
};
use timeclock_core::signature::verify_signature;
use timeclock_core::types::Timestamp;
use timeclock_db::models::event::{AttendanceEvent, NewAttendanceEvent, PunchKind};
use timeclock_db::models::job::EnqueueJob;
use timeclock_db::models::processing_log::triggers;
use timeclock_db::models::status::EventStatus;
use timeclock_db::repositories::{is_unique_violation, EventRepo, JobRepo, MappingRepo};
use timeclock_db::DbPool;
use timeclock_events::bus::{event_types, PipelineEvent};
use timeclock_events::EventBus;

use crate::error::PipelineError;
use crate::reconcile::ReconcileJobPayload;

/// The idempotency-key unique constraint that duplicate deliveries race on.
const IDEMPOTENCY_CONSTRAINT: &str = "uq_attendance_events_idempotency_key";

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// The JSON body a terminal device posts to the webhook endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub device_id: String,
    pub terminal_user_id: Option<String>,
    /// `clock_in` or `clock_out` (case-insensitive).
    pub event_type: String,
    /// RFC 3339 with offset, or a naive `YYYY-MM-DDTHH:MM:SS` local time.
    pub timestamp: String,
    /// Offset applied to a naive timestamp; ignored when the timestamp
    /// carries its own.
    pub utc_offset_minutes: Option<i32>,
}

/// Parse and validate the raw webhook body.
pub fn parse_payload(body: &[u8]) -> Result<WebhookPayload, PipelineError> {
    let payload: WebhookPayload = serde_json::from_slice(body)
        .map_err(|e| PipelineError::InvalidPayload(e.to_string()))?;
    if payload.device_id.trim().is_empty() {
        return Err(PipelineError::InvalidPayload(
            "device_id must not be empty".into(),
        ));
    }
    Ok(payload)
}

/// Map the payload's event type onto a punch kind.
pub fn parse_punch_kind(event_type: &str) -> Option<PunchKind> {
    match event_type.to_ascii_lowercase().as_str() {
        "clock_in" => Some(PunchKind::ClockIn),
        "clock_out" => Some(PunchKind::ClockOut),
        _ => None,
    }
}

/// Convert a device-supplied timestamp into a UTC instant, a local-time
/// instant, and the offset that was applied.
///
/// An RFC 3339 timestamp uses its own offset; a naive timestamp falls back
/// to `fallback_offset_minutes` (the payload's explicit offset, else the
/// configured default). Local time drives calendar-day bucketing.
pub fn localize_timestamp(
    raw: &str,
    fallback_offset_minutes: i32,
) -> Result<(Timestamp, NaiveDateTime, i32), PipelineError> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        let offset_minutes = with_offset.offset().local_minus_utc() / 60;
        return Ok((
            with_offset.with_timezone(&Utc),
            with_offset.naive_local(),
            offset_minutes,
        ));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .map_err(|_| {
            PipelineError::InvalidPayload(format!("unparseable timestamp: {raw}"))
        })?;

    let utc = (naive - Duration::minutes(fallback_offset_minutes as i64)).and_utc();
    Ok((utc, naive, fallback_offset_minutes))
}

// ---------------------------------------------------------------------------
// Intake
// ---------------------------------------------------------------------------

/// Result of one ingestion call.
#[derive(Debug)]
pub struct IntakeOutcome {
    pub event: AttendanceEvent,
    /// Whether this delivery was an idempotent replay of an existing row.
    pub replay: bool,
    /// Whether a reconciliation job exists for the event's day (freshly
    /// enqueued or coalesced into one already in flight).
    pub job_enqueued: bool,
}

/// Webhook intake service shared by all handler invocations.
pub struct WebhookIntake {
    pool: DbPool,
    policy: ReconcilePolicy,
    webhook_secret: Option<String>,
    bus: Arc<EventBus>,
}

impl WebhookIntake {
    pub fn new(
        pool: DbPool,
        policy: ReconcilePolicy,
        webhook_secret: Option<String>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            pool,
            policy,
            webhook_secret,
            bus,
        }
    }

    /// Ingest one webhook delivery.
    ///
    /// Idempotent: a second delivery with the same key returns the
    /// existing row unchanged, including when two deliveries race: the
    /// loser of the insert re-reads and returns the winner's row.
    pub async fn ingest(
        &self,
        body: &[u8],
        idempotency_key: &str,
        signature: Option<&str>,
    ) -> Result<IntakeOutcome, PipelineError> {
        if idempotency_key.trim().is_empty() {
            return Err(PipelineError::InvalidPayload(
                "idempotency key must not be empty".into(),
            ));
        }

        // Signature check happens before anything is persisted.
        let signature_valid = match (&self.webhook_secret, signature) {
            (Some(secret), Some(provided)) => {
                if !verify_signature(secret, body, provided) {
                    return Err(PipelineError::Core(CoreError::InvalidSignature));
                }
                true
            }
            _ => false,
        };

        // Idempotent replay before doing any work.
        if let Some(existing) = EventRepo::find_by_idempotency_key(&self.pool, idempotency_key)
            .await?
        {
            tracing::debug!(
                event_id = existing.id,
                idempotency_key,
                "Duplicate delivery returned existing event",
            );
            return Ok(IntakeOutcome {
                job_enqueued: false,
                replay: true,
                event: existing,
            });
        }

        let payload = parse_payload(body)?;
        let punch_kind = parse_punch_kind(&payload.event_type).ok_or_else(|| {
            PipelineError::InvalidPayload(format!(
                "unknown event_type: {}",
                payload.event_type
            ))
        })?;

        let fallback_offset = payload
            .utc_offset_minutes
            .unwrap_or(self.policy.default_utc_offset_minutes);
        let (occurred_at, occurred_at_local, utc_offset_minutes) =
            localize_timestamp(&payload.timestamp, fallback_offset)?;

        // Identity resolution decides the initial processing status.
        let (user_id, status) = match &payload.terminal_user_id {
            Some(terminal_id) => {
                match MappingRepo::find_active(&self.pool, terminal_id, &payload.device_id)
                    .await?
                {
                    Some(mapping) => (Some(mapping.user_id), EventStatus::Processed),
                    None => (None, EventStatus::Quarantined),
                }
            }
            None => (None, EventStatus::Pending),
        };

        let new_event = NewAttendanceEvent {
            user_id,
            terminal_user_id: payload.terminal_user_id.clone(),
            device_id: payload.device_id.clone(),
            punch_kind,
            occurred_at,
            occurred_at_local,
            local_date: occurred_at_local.date(),
            utc_offset_minutes,
            idempotency_key: idempotency_key.to_string(),
            signature_valid,
            status,
        };

        let event = match EventRepo::insert(&self.pool, &new_event).await {
            Ok(event) => event,
            Err(err) if is_unique_violation(&err, IDEMPOTENCY_CONSTRAINT) => {
                // Two deliveries raced on the same key; return the winner.
                let winner = EventRepo::find_by_idempotency_key(&self.pool, idempotency_key)
                    .await?
                    .ok_or_else(|| {
                        CoreError::Internal(
                            "idempotency winner vanished after unique violation".into(),
                        )
                    })?;
                tracing::debug!(
                    event_id = winner.id,
                    idempotency_key,
                    "Concurrent duplicate delivery lost the insert race",
                );
                return Ok(IntakeOutcome {
                    job_enqueued: false,
                    replay: true,
                    event: winner,
                });
            }
            Err(err) => return Err(err.into()),
        };

        // Enqueue only after the event row is committed, so a job can
        // never observe a row that might still roll back.
        let mut job_enqueued = false;
        if let Some(user_id) = event.user_id {
            let payload = ReconcileJobPayload {
                user_id,
                work_date: event.local_date,
                trigger: triggers::WEBHOOK.to_string(),
            };
            let enqueued = JobRepo::enqueue(
                &self.pool,
                &EnqueueJob {
                    job_type: JOB_RECONCILE_DAY.to_string(),
                    job_key: reconcile_job_key(user_id, event.local_date),
                    payload: serde_json::to_value(&payload)
                        .map_err(|e| CoreError::Internal(e.to_string()))?,
                    priority: PRIORITY_NORMAL,
                    max_attempts: MAX_JOB_ATTEMPTS,
                },
            )
            .await?;
            if enqueued.is_none() {
                tracing::debug!(
                    user_id,
                    work_date = %event.local_date,
                    "Reconciliation already in flight; enqueue coalesced",
                );
            }
            job_enqueued = true;
        }

        let bus_event_type = if event.status_id == EventStatus::Quarantined.id() {
            event_types::EVENT_QUARANTINED
        } else {
            event_types::EVENT_INGESTED
        };
        let mut bus_event = PipelineEvent::new(bus_event_type)
            .with_device(event.device_id.clone())
            .with_work_date(event.local_date);
        if let Some(user_id) = event.user_id {
            bus_event = bus_event.with_user(user_id);
        }
        self.bus.publish(bus_event);

        tracing::info!(
            event_id = event.id,
            device_id = %event.device_id,
            status_id = event.status_id,
            job_enqueued,
            "Attendance event ingested",
        );

        Ok(IntakeOutcome {
            event,
            replay: false,
            job_enqueued,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    // -- parse_payload --------------------------------------------------------

    #[test]
    fn parses_full_payload() {
        let body = br#"{
            "device_id": "lobby-01",
            "terminal_user_id": "0042",
            "event_type": "clock_in",
            "timestamp": "2026-03-02T09:00:00+09:00"
        }"#;
        let payload = parse_payload(body).unwrap();
        assert_eq!(payload.device_id, "lobby-01");
        assert_eq!(payload.terminal_user_id.as_deref(), Some("0042"));
        assert!(payload.utc_offset_minutes.is_none());
    }

    #[test]
    fn rejects_empty_device_id() {
        let body = br#"{"device_id": " ", "event_type": "clock_in", "timestamp": "2026-03-02T09:00:00"}"#;
        assert_matches!(parse_payload(body), Err(PipelineError::InvalidPayload(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        assert_matches!(
            parse_payload(b"not json"),
            Err(PipelineError::InvalidPayload(_))
        );
    }

    // -- parse_punch_kind -----------------------------------------------------

    #[test]
    fn punch_kind_is_case_insensitive() {
        assert_eq!(parse_punch_kind("CLOCK_IN"), Some(PunchKind::ClockIn));
        assert_eq!(parse_punch_kind("clock_out"), Some(PunchKind::ClockOut));
        assert_eq!(parse_punch_kind("badge"), None);
    }

    // -- localize_timestamp ---------------------------------------------------

    #[test]
    fn rfc3339_timestamp_uses_its_own_offset() {
        let (utc, local, offset) =
            localize_timestamp("2026-03-02T09:00:00+09:00", 0).unwrap();
        assert_eq!(offset, 540);
        assert_eq!(
            local,
            NaiveDate::from_ymd_opt(2026, 3, 2)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap()
        );
        assert_eq!(utc.to_rfc3339(), "2026-03-02T00:00:00+00:00");
    }

    #[test]
    fn naive_timestamp_applies_fallback_offset() {
        let (utc, local, offset) = localize_timestamp("2026-03-02T09:00:00", 540).unwrap();
        assert_eq!(offset, 540);
        assert_eq!(local.time().to_string(), "09:00:00");
        assert_eq!(utc.to_rfc3339(), "2026-03-02T00:00:00+00:00");
    }

    #[test]
    fn naive_timestamp_with_space_separator() {
        let (_, local, _) = localize_timestamp("2026-03-02 23:30:00", 0).unwrap();
        assert_eq!(local.date(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }

    #[test]
    fn local_date_bucketing_follows_local_time() {
        // 23:30 local at +09:00 is 14:30 UTC the same day; the local date
        // is what the reconciler buckets on.
        let (utc, local, _) = localize_timestamp("2026-03-02T23:30:00+09:00", 0).unwrap();
        assert_eq!(local.date(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(utc.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }

    #[test]
    fn negative_offset_crosses_date_boundary() {
        // 01:00 local at -05:00 is 06:00 UTC; local date stays the 2nd.
        let (utc, local, offset) =
            localize_timestamp("2026-03-02T01:00:00-05:00", 0).unwrap();
        assert_eq!(offset, -300);
        assert_eq!(local.date(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(utc.to_rfc3339(), "2026-03-02T06:00:00+00:00");
    }

    #[test]
    fn garbage_timestamp_is_rejected() {
        assert_matches!(
            localize_timestamp("yesterday-ish", 0),
            Err(PipelineError::InvalidPayload(_))
        );
    }
}
