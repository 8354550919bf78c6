//! Day reconciliation: turn one user-day's events into an attendance
//! record.
//!
//! A run is one unit of work. Any failure aborts it whole (the single
//! versioned INSERT/UPDATE is the only record write, so a failed run
//! leaves no partial mutation) and the contributing events are marked
//! FAILED with the error attached, eligible for the job's bounded retry.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use timeclock_core::error::CoreError;
use timeclock_core::policy::ReconcilePolicy;
use timeclock_core::session::{pair_sessions, Pairing, Punch, PunchDirection};
use timeclock_core::types::DbId;
use timeclock_core::worktime::{compute_day, DayMetrics, DaySchedule, DayStatus};
use timeclock_db::models::event::{AttendanceEvent, PunchKind};
use timeclock_db::models::processing_log::NewProcessingLog;
use timeclock_db::models::record::AttendanceRecord;
use timeclock_db::models::status::RecordStatus;
use timeclock_db::repositories::record_repo::ReconciledFields;
use timeclock_db::repositories::{EventRepo, ProcessingLogRepo, RecordRepo};
use timeclock_db::DbPool;
use timeclock_events::bus::{event_types, PipelineEvent};
use timeclock_events::EventBus;

use crate::error::PipelineError;
use crate::providers::{HolidayProvider, ScheduleProvider};

// ---------------------------------------------------------------------------
// Job payload
// ---------------------------------------------------------------------------

/// Payload carried by a `reconcile_day` queue job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileJobPayload {
    pub user_id: DbId,
    pub work_date: NaiveDate,
    pub trigger: String,
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of a reconciliation run.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// The record was created or refreshed.
    Completed(AttendanceRecord),
    /// The record is locked; nothing was touched and nothing failed.
    Locked,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// The reconciliation engine. Cheap to share behind an `Arc`; holds the
/// immutable policy so every run computes under the same configuration.
pub struct Reconciler {
    pool: DbPool,
    policy: ReconcilePolicy,
    schedules: Arc<dyn ScheduleProvider>,
    holidays: Arc<dyn HolidayProvider>,
    bus: Arc<EventBus>,
}

impl Reconciler {
    pub fn new(
        pool: DbPool,
        policy: ReconcilePolicy,
        schedules: Arc<dyn ScheduleProvider>,
        holidays: Arc<dyn HolidayProvider>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            pool,
            policy,
            schedules,
            holidays,
            bus,
        }
    }

    /// Reconcile one user-day. Idempotent with respect to re-invocation on
    /// the same inputs; guarded by the record lock.
    pub async fn reconcile_day(
        &self,
        user_id: DbId,
        date: NaiveDate,
        trigger: &str,
    ) -> Result<ReconcileOutcome, PipelineError> {
        let started = Instant::now();

        let existing = RecordRepo::find(&self.pool, user_id, date).await?;
        if existing.as_ref().is_some_and(|r| r.is_locked) {
            tracing::warn!(user_id, work_date = %date, "Record locked; reconciliation skipped");
            return Ok(ReconcileOutcome::Locked);
        }

        let schedule = self.schedules.effective_schedule(user_id, date).await;
        let crosses_midnight = schedule.as_ref().is_some_and(DaySchedule::crosses_midnight);
        let events = EventRepo::list_for_day(
            &self.pool,
            user_id,
            date,
            crosses_midnight,
            self.policy.max_events_per_day,
        )
        .await?;
        let event_ids: Vec<DbId> = events.iter().map(|e| e.id).collect();

        match self
            .compute_and_persist(user_id, date, schedule, &events, existing)
            .await
        {
            Ok((record, session_count)) => {
                if !event_ids.is_empty() {
                    EventRepo::mark_processed(&self.pool, &event_ids).await?;
                }
                self.write_log(
                    user_id,
                    date,
                    trigger,
                    event_ids.len(),
                    session_count,
                    true,
                    None,
                    started,
                )
                .await;

                self.bus.publish(
                    PipelineEvent::new(event_types::RECORD_RECONCILED)
                        .with_user(user_id)
                        .with_work_date(date)
                        .with_payload(serde_json::json!({
                            "status_id": record.status_id,
                            "worked_minutes": record.worked_minutes,
                            "requires_approval": record.requires_approval,
                        })),
                );

                tracing::info!(
                    user_id,
                    work_date = %date,
                    status_id = record.status_id,
                    worked_minutes = record.worked_minutes,
                    duration_ms = started.elapsed().as_millis() as i64,
                    "Day reconciled",
                );

                Ok(ReconcileOutcome::Completed(record))
            }
            // The lock appeared between our guard and the write; not a
            // failure, and the events stay untouched.
            Err(PipelineError::Core(CoreError::RecordLocked { .. })) => {
                tracing::warn!(user_id, work_date = %date, "Record locked mid-run; skipped");
                Ok(ReconcileOutcome::Locked)
            }
            Err(err) => {
                let message = err.to_string();
                if !event_ids.is_empty() {
                    if let Err(mark_err) =
                        EventRepo::mark_failed(&self.pool, &event_ids, &message).await
                    {
                        tracing::error!(
                            user_id,
                            work_date = %date,
                            error = %mark_err,
                            "Failed to mark contributing events FAILED",
                        );
                    }
                }
                self.write_log(
                    user_id,
                    date,
                    trigger,
                    event_ids.len(),
                    0,
                    false,
                    Some(message),
                    started,
                )
                .await;
                Err(err)
            }
        }
    }

    async fn compute_and_persist(
        &self,
        user_id: DbId,
        date: NaiveDate,
        schedule: Option<DaySchedule>,
        events: &[AttendanceEvent],
        existing: Option<AttendanceRecord>,
    ) -> Result<(AttendanceRecord, usize), PipelineError> {
        let is_holiday = self.holidays.is_holiday(date).await;
        let is_weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);

        let punches = events
            .iter()
            .map(|e| {
                let direction = match PunchKind::from_id(e.punch_kind) {
                    Some(PunchKind::ClockIn) => PunchDirection::In,
                    Some(PunchKind::ClockOut) => PunchDirection::Out,
                    None => {
                        return Err(PipelineError::Core(CoreError::Internal(format!(
                            "event {} has unknown punch kind {}",
                            e.id, e.punch_kind
                        ))))
                    }
                };
                Ok(Punch {
                    at: e.occurred_at_local,
                    direction,
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;

        let pairing = pair_sessions(&punches);
        let metrics = compute_day(
            &self.policy,
            date,
            schedule.as_ref(),
            is_holiday,
            is_weekend,
            &pairing,
        );
        let session_count = pairing.sessions.len();
        let fields = build_reconciled_fields(schedule, &metrics, events, &pairing);

        let record = match existing {
            Some(current) => self.update_existing(user_id, date, current, &fields).await?,
            None => match RecordRepo::insert_reconciled(&self.pool, user_id, date, &fields)
                .await?
            {
                Some(record) => record,
                None => {
                    // Lost the insert race to a concurrent run; take the
                    // update path against the winner's row.
                    let current = RecordRepo::find(&self.pool, user_id, date)
                        .await?
                        .ok_or_else(|| {
                            CoreError::Internal(
                                "record vanished after losing the insert race".into(),
                            )
                        })?;
                    self.update_existing(user_id, date, current, &fields).await?
                }
            },
        };

        Ok((record, session_count))
    }

    async fn update_existing(
        &self,
        user_id: DbId,
        date: NaiveDate,
        current: AttendanceRecord,
        fields: &ReconciledFields,
    ) -> Result<AttendanceRecord, PipelineError> {
        if current.is_locked {
            return Err(CoreError::RecordLocked {
                user_id,
                work_date: date,
            }
            .into());
        }
        match RecordRepo::update_reconciled(&self.pool, current.id, current.version, fields)
            .await?
        {
            Some(record) => Ok(record),
            None => {
                let fresh = RecordRepo::find(&self.pool, user_id, date)
                    .await?
                    .ok_or_else(|| {
                        CoreError::Internal("record vanished during version check".into())
                    })?;
                if fresh.is_locked {
                    Err(CoreError::RecordLocked {
                        user_id,
                        work_date: date,
                    }
                    .into())
                } else {
                    Err(PipelineError::VersionConflict {
                        user_id,
                        work_date: date,
                    })
                }
            }
        }
    }

    /// Append the processing-log row. Best effort: a log failure is
    /// reported but never overrides the run's outcome.
    #[allow(clippy::too_many_arguments)]
    async fn write_log(
        &self,
        user_id: DbId,
        date: NaiveDate,
        trigger: &str,
        event_count: usize,
        session_count: usize,
        success: bool,
        error: Option<String>,
        started: Instant,
    ) {
        let entry = NewProcessingLog {
            user_id,
            work_date: date,
            trigger: trigger.to_string(),
            event_count: event_count as i32,
            session_count: session_count as i32,
            success,
            error,
            duration_ms: started.elapsed().as_millis() as i64,
        };
        if let Err(err) = ProcessingLogRepo::insert(&self.pool, &entry).await {
            tracing::error!(
                user_id,
                work_date = %date,
                error = %err,
                "Failed to append processing log entry",
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Field assembly
// ---------------------------------------------------------------------------

fn build_reconciled_fields(
    schedule: Option<DaySchedule>,
    metrics: &DayMetrics,
    events: &[AttendanceEvent],
    pairing: &Pairing,
) -> ReconciledFields {
    // Schedule times are only recorded when the day was actually held to
    // them (holidays drop the schedule entirely).
    let scheduled = schedule.filter(|_| metrics.scheduled_minutes.is_some());

    ReconciledFields {
        status_id: record_status(metrics.status).id(),
        scheduled_start: scheduled.map(|s| s.start),
        scheduled_end: scheduled.map(|s| s.end),
        scheduled_minutes: metrics.scheduled_minutes,
        worked_minutes: metrics.worked_minutes,
        late_minutes: metrics.late_minutes,
        early_leave_minutes: metrics.early_leave_minutes,
        overtime_minutes: metrics.overtime_minutes,
        night_minutes: metrics.night_minutes,
        holiday_minutes: metrics.holiday_minutes,
        first_clock_in: metrics.first_clock_in.map(format_local_hm),
        last_clock_out: metrics.last_clock_out.map(format_local_hm),
        event_ids: events.iter().map(|e| e.id).collect(),
        sessions: pairing.sessions.clone(),
        requires_approval: metrics.requires_approval,
    }
}

fn record_status(status: DayStatus) -> RecordStatus {
    match status {
        DayStatus::Ok => RecordStatus::Ok,
        DayStatus::Missing => RecordStatus::Missing,
        DayStatus::Incomplete => RecordStatus::Incomplete,
        DayStatus::Absent => RecordStatus::Absent,
        DayStatus::Holiday => RecordStatus::Holiday,
        DayStatus::Weekend => RecordStatus::Weekend,
    }
}

fn format_local_hm(at: NaiveDateTime) -> String {
    at.format("%H:%M").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_status_maps_onto_record_status_ids() {
        assert_eq!(record_status(DayStatus::Ok), RecordStatus::Ok);
        assert_eq!(record_status(DayStatus::Missing), RecordStatus::Missing);
        assert_eq!(record_status(DayStatus::Incomplete), RecordStatus::Incomplete);
        assert_eq!(record_status(DayStatus::Absent), RecordStatus::Absent);
        assert_eq!(record_status(DayStatus::Holiday), RecordStatus::Holiday);
        assert_eq!(record_status(DayStatus::Weekend), RecordStatus::Weekend);
    }

    #[test]
    fn clock_times_format_as_hh_mm() {
        let at = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(9, 5, 30)
            .unwrap();
        assert_eq!(format_local_hm(at), "09:05");
    }

    #[test]
    fn job_payload_round_trips() {
        let payload = ReconcileJobPayload {
            user_id: 7,
            work_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            trigger: "webhook".into(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        let back: ReconcileJobPayload = serde_json::from_value(value).unwrap();
        assert_eq!(back.user_id, 7);
        assert_eq!(back.trigger, "webhook");
    }
}
