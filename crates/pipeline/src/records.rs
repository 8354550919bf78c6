//! Record lifecycle operations: manual adjustment, approval, unlock, and
//! reprocessing.
//!
//! Adjustments and approvals are append-only history; the repository can
//! only concatenate entries, and each operation captures a before/after
//! snapshot scoped to what it changed.

use chrono::{NaiveDate, NaiveTime, Utc};
use timeclock_core::error::CoreError;
use timeclock_core::scheduling::{
    reconcile_job_key, JOB_RECONCILE_DAY, MAX_JOB_ATTEMPTS, PRIORITY_URGENT,
};
use timeclock_core::types::DbId;
use timeclock_db::models::job::EnqueueJob;
use timeclock_db::models::processing_log::triggers;
use timeclock_db::models::record::{
    AdjustRecordRequest, AdjustmentEntry, AdjustmentKind, AdjustmentRequest,
    ApprovalEntry, ApproveRecordRequest, AttendanceRecord, MinuteField,
    UnlockRecordRequest,
};
use timeclock_db::repositories::record_repo::RecordPatch;
use timeclock_db::repositories::{JobRepo, RecordRepo};
use timeclock_db::DbPool;
use timeclock_events::bus::{event_types, PipelineEvent};
use timeclock_events::EventBus;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::reconcile::ReconcileJobPayload;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

async fn find_required(
    pool: &DbPool,
    user_id: DbId,
    work_date: NaiveDate,
) -> Result<AttendanceRecord, PipelineError> {
    RecordRepo::find(pool, user_id, work_date)
        .await?
        .ok_or_else(|| {
            PipelineError::Core(CoreError::RecordMissing { user_id, work_date })
        })
}

fn locked_error(user_id: DbId, work_date: NaiveDate) -> PipelineError {
    PipelineError::Core(CoreError::RecordLocked { user_id, work_date })
}

/// A version-checked update returned zero rows: either the record got
/// locked underneath us or another writer moved the version.
async fn classify_zero_rows(
    pool: &DbPool,
    user_id: DbId,
    work_date: NaiveDate,
) -> PipelineError {
    match RecordRepo::find(pool, user_id, work_date).await {
        Ok(Some(fresh)) if fresh.is_locked => locked_error(user_id, work_date),
        Ok(_) => PipelineError::Core(CoreError::Conflict(
            "record was modified concurrently; retry the operation".into(),
        )),
        Err(err) => err.into(),
    }
}

// ---------------------------------------------------------------------------
// Adjust
// ---------------------------------------------------------------------------

/// Apply a manual adjustment to a record.
///
/// Rejects with `RecordLocked` when locked. The adjustment is appended to
/// the audit history with its before/after snapshot and the record is
/// flagged for approval.
pub async fn adjust(
    pool: &DbPool,
    bus: &EventBus,
    user_id: DbId,
    work_date: NaiveDate,
    request: AdjustRecordRequest,
) -> Result<AttendanceRecord, PipelineError> {
    let record = find_required(pool, user_id, work_date).await?;
    if record.is_locked {
        return Err(locked_error(user_id, work_date));
    }

    let (patch, before, after) = derive_patch(&record, &request.adjustment)?;
    let entry = AdjustmentEntry {
        id: Uuid::new_v4(),
        kind: adjustment_kind(&request.adjustment),
        before,
        after,
        actor: request.actor.clone(),
        reason: request.reason.clone(),
        applied_at: Utc::now(),
    };

    let updated = RecordRepo::append_adjustment(pool, record.id, record.version, &entry, &patch)
        .await?;
    let Some(updated) = updated else {
        return Err(classify_zero_rows(pool, user_id, work_date).await);
    };

    bus.publish(
        PipelineEvent::new(event_types::RECORD_ADJUSTED)
            .with_user(user_id)
            .with_work_date(work_date)
            .with_payload(serde_json::json!({
                "kind": entry.kind,
                "actor": entry.actor,
            })),
    );

    tracing::info!(
        user_id,
        work_date = %work_date,
        kind = ?entry.kind,
        actor = %entry.actor,
        "Record adjusted",
    );

    Ok(updated)
}

// ---------------------------------------------------------------------------
// Approve
// ---------------------------------------------------------------------------

/// Append an approval. An approval that requests locking locks the
/// record; every approval clears `requires_approval`.
pub async fn approve(
    pool: &DbPool,
    bus: &EventBus,
    user_id: DbId,
    work_date: NaiveDate,
    request: ApproveRecordRequest,
) -> Result<AttendanceRecord, PipelineError> {
    let record = find_required(pool, user_id, work_date).await?;
    if record.is_locked {
        return Err(locked_error(user_id, work_date));
    }

    let entry = ApprovalEntry {
        actor: request.actor.clone(),
        level: request.level,
        locks: request.lock,
        approved_at: Utc::now(),
    };

    let updated = RecordRepo::append_approval(pool, record.id, record.version, &entry).await?;
    let Some(updated) = updated else {
        return Err(classify_zero_rows(pool, user_id, work_date).await);
    };

    bus.publish(
        PipelineEvent::new(event_types::RECORD_APPROVED)
            .with_user(user_id)
            .with_work_date(work_date)
            .with_payload(serde_json::json!({
                "actor": entry.actor,
                "level": entry.level,
                "locks": entry.locks,
            })),
    );

    tracing::info!(
        user_id,
        work_date = %work_date,
        actor = %entry.actor,
        level = entry.level,
        locked = entry.locks,
        "Record approved",
    );

    Ok(updated)
}

// ---------------------------------------------------------------------------
// Unlock
// ---------------------------------------------------------------------------

/// Clear the lock flag. Prior approvals remain as history.
pub async fn unlock(
    pool: &DbPool,
    bus: &EventBus,
    user_id: DbId,
    work_date: NaiveDate,
    request: UnlockRecordRequest,
) -> Result<AttendanceRecord, PipelineError> {
    let record = find_required(pool, user_id, work_date).await?;
    if !record.is_locked {
        return Err(PipelineError::Core(CoreError::NotLocked {
            user_id,
            work_date,
        }));
    }

    let updated = RecordRepo::set_unlocked(pool, record.id, record.version).await?;
    let Some(updated) = updated else {
        return Err(classify_zero_rows(pool, user_id, work_date).await);
    };

    bus.publish(
        PipelineEvent::new(event_types::RECORD_UNLOCKED)
            .with_user(user_id)
            .with_work_date(work_date)
            .with_payload(serde_json::json!({"actor": request.actor})),
    );

    tracing::info!(user_id, work_date = %work_date, actor = %request.actor, "Record unlocked");

    Ok(updated)
}

// ---------------------------------------------------------------------------
// Reprocess
// ---------------------------------------------------------------------------

/// Enqueue an urgent reconciliation for a user-day. Rejects with
/// `RecordLocked` when the record is locked; idempotent by job key.
///
/// Returns `true` when a fresh job was enqueued, `false` when it
/// coalesced into one already in flight.
pub async fn reprocess(
    pool: &DbPool,
    user_id: DbId,
    work_date: NaiveDate,
) -> Result<bool, PipelineError> {
    if let Some(record) = RecordRepo::find(pool, user_id, work_date).await? {
        if record.is_locked {
            return Err(locked_error(user_id, work_date));
        }
    }

    let payload = ReconcileJobPayload {
        user_id,
        work_date,
        trigger: triggers::MANUAL.to_string(),
    };
    let enqueued = JobRepo::enqueue(
        pool,
        &EnqueueJob {
            job_type: JOB_RECONCILE_DAY.to_string(),
            job_key: reconcile_job_key(user_id, work_date),
            payload: serde_json::to_value(&payload)
                .map_err(|e| CoreError::Internal(e.to_string()))?,
            priority: PRIORITY_URGENT,
            max_attempts: MAX_JOB_ATTEMPTS,
        },
    )
    .await?;

    tracing::info!(
        user_id,
        work_date = %work_date,
        coalesced = enqueued.is_none(),
        "Reprocess requested",
    );

    Ok(enqueued.is_some())
}

// ---------------------------------------------------------------------------
// Adjustment derivation
// ---------------------------------------------------------------------------

fn adjustment_kind(request: &AdjustmentRequest) -> AdjustmentKind {
    match request {
        AdjustmentRequest::EditClockTimes { .. } => AdjustmentKind::EditClockTimes,
        AdjustmentRequest::MarkAbsentPaid => AdjustmentKind::MarkAbsentPaid,
        AdjustmentRequest::MarkAbsentUnpaid => AdjustmentKind::MarkAbsentUnpaid,
        AdjustmentRequest::OverrideStatus { .. } => AdjustmentKind::OverrideStatus,
        AdjustmentRequest::AddMinutes { .. } => AdjustmentKind::AddMinutes,
        AdjustmentRequest::RemoveMinutes { .. } => AdjustmentKind::RemoveMinutes,
    }
}

/// Derive the column patch and the before/after snapshot for an
/// adjustment, scoped to the fields the adjustment kind touches.
fn derive_patch(
    record: &AttendanceRecord,
    request: &AdjustmentRequest,
) -> Result<(RecordPatch, serde_json::Value, serde_json::Value), PipelineError> {
    use timeclock_db::models::status::RecordStatus;

    match request {
        AdjustmentRequest::EditClockTimes {
            first_clock_in,
            last_clock_out,
        } => {
            if first_clock_in.is_none() && last_clock_out.is_none() {
                return Err(PipelineError::Core(CoreError::Validation(
                    "edit_clock_times requires at least one of first_clock_in, last_clock_out"
                        .into(),
                )));
            }
            for value in [first_clock_in, last_clock_out].into_iter().flatten() {
                NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| {
                    CoreError::Validation(format!("'{value}' is not a valid HH:MM time"))
                })?;
            }
            let patch = RecordPatch {
                first_clock_in: first_clock_in.clone(),
                last_clock_out: last_clock_out.clone(),
                ..Default::default()
            };
            let before = serde_json::json!({
                "first_clock_in": record.first_clock_in,
                "last_clock_out": record.last_clock_out,
            });
            let after = serde_json::json!({
                "first_clock_in": first_clock_in.clone().or_else(|| record.first_clock_in.clone()),
                "last_clock_out": last_clock_out.clone().or_else(|| record.last_clock_out.clone()),
            });
            Ok((patch, before, after))
        }

        AdjustmentRequest::MarkAbsentPaid => {
            // A paid absence credits the scheduled minutes as worked.
            let credited = record.scheduled_minutes.unwrap_or(0);
            let patch = RecordPatch {
                status_id: Some(RecordStatus::Absent.id()),
                worked_minutes: Some(credited),
                late_minutes: Some(0),
                early_leave_minutes: Some(0),
                overtime_minutes: Some(0),
                night_minutes: Some(0),
                ..Default::default()
            };
            let before = minutes_snapshot(record);
            let after = serde_json::json!({
                "status_id": RecordStatus::Absent.id(),
                "worked_minutes": credited,
                "late_minutes": 0,
                "early_leave_minutes": 0,
                "overtime_minutes": 0,
                "night_minutes": 0,
            });
            Ok((patch, before, after))
        }

        AdjustmentRequest::MarkAbsentUnpaid => {
            let patch = RecordPatch {
                status_id: Some(RecordStatus::Absent.id()),
                worked_minutes: Some(0),
                late_minutes: Some(0),
                early_leave_minutes: Some(0),
                overtime_minutes: Some(0),
                night_minutes: Some(0),
                holiday_minutes: Some(0),
                ..Default::default()
            };
            let before = minutes_snapshot(record);
            let after = serde_json::json!({
                "status_id": RecordStatus::Absent.id(),
                "worked_minutes": 0,
                "late_minutes": 0,
                "early_leave_minutes": 0,
                "overtime_minutes": 0,
                "night_minutes": 0,
                "holiday_minutes": 0,
            });
            Ok((patch, before, after))
        }

        AdjustmentRequest::OverrideStatus { status_id } => {
            if !(RecordStatus::Ok.id()..=RecordStatus::Weekend.id()).contains(status_id) {
                return Err(PipelineError::Core(CoreError::Validation(format!(
                    "unknown record status id: {status_id}"
                ))));
            }
            let patch = RecordPatch {
                status_id: Some(*status_id),
                ..Default::default()
            };
            let before = serde_json::json!({"status_id": record.status_id});
            let after = serde_json::json!({"status_id": status_id});
            Ok((patch, before, after))
        }

        AdjustmentRequest::AddMinutes { field, minutes } => {
            validate_minutes(*minutes)?;
            let current = minute_value(record, *field);
            let updated = current + minutes;
            Ok((
                minute_patch(*field, updated),
                serde_json::json!({minute_field_name(*field): current}),
                serde_json::json!({minute_field_name(*field): updated}),
            ))
        }

        AdjustmentRequest::RemoveMinutes { field, minutes } => {
            validate_minutes(*minutes)?;
            let current = minute_value(record, *field);
            let updated = (current - minutes).max(0);
            Ok((
                minute_patch(*field, updated),
                serde_json::json!({minute_field_name(*field): current}),
                serde_json::json!({minute_field_name(*field): updated}),
            ))
        }
    }
}

fn validate_minutes(minutes: i32) -> Result<(), PipelineError> {
    if minutes <= 0 {
        return Err(PipelineError::Core(CoreError::Validation(
            "minutes must be positive".into(),
        )));
    }
    Ok(())
}

fn minute_value(record: &AttendanceRecord, field: MinuteField) -> i32 {
    match field {
        MinuteField::Worked => record.worked_minutes,
        MinuteField::Overtime => record.overtime_minutes,
        MinuteField::Night => record.night_minutes,
        MinuteField::Holiday => record.holiday_minutes,
    }
}

fn minute_field_name(field: MinuteField) -> &'static str {
    match field {
        MinuteField::Worked => "worked_minutes",
        MinuteField::Overtime => "overtime_minutes",
        MinuteField::Night => "night_minutes",
        MinuteField::Holiday => "holiday_minutes",
    }
}

fn minute_patch(field: MinuteField, value: i32) -> RecordPatch {
    let mut patch = RecordPatch::default();
    match field {
        MinuteField::Worked => patch.worked_minutes = Some(value),
        MinuteField::Overtime => patch.overtime_minutes = Some(value),
        MinuteField::Night => patch.night_minutes = Some(value),
        MinuteField::Holiday => patch.holiday_minutes = Some(value),
    }
    patch
}

fn minutes_snapshot(record: &AttendanceRecord) -> serde_json::Value {
    serde_json::json!({
        "status_id": record.status_id,
        "worked_minutes": record.worked_minutes,
        "late_minutes": record.late_minutes,
        "early_leave_minutes": record.early_leave_minutes,
        "overtime_minutes": record.overtime_minutes,
        "night_minutes": record.night_minutes,
        "holiday_minutes": record.holiday_minutes,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sqlx::types::Json;
    use timeclock_db::models::status::RecordStatus;

    fn sample_record() -> AttendanceRecord {
        AttendanceRecord {
            id: 1,
            user_id: 7,
            work_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            status_id: RecordStatus::Ok.id(),
            scheduled_start: NaiveTime::from_hms_opt(9, 0, 0),
            scheduled_end: NaiveTime::from_hms_opt(18, 0, 0),
            scheduled_minutes: Some(540),
            worked_minutes: 480,
            late_minutes: 0,
            early_leave_minutes: 0,
            overtime_minutes: 30,
            night_minutes: 0,
            holiday_minutes: 0,
            first_clock_in: Some("09:00".into()),
            last_clock_out: Some("18:30".into()),
            event_ids: Json(vec![1, 2]),
            sessions: Json(vec![]),
            adjustments: Json(vec![]),
            approvals: Json(vec![]),
            is_locked: false,
            requires_approval: false,
            version: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    // -- edit clock times -----------------------------------------------------

    #[test]
    fn edit_clock_times_snapshots_only_clock_fields() {
        let record = sample_record();
        let request = AdjustmentRequest::EditClockTimes {
            first_clock_in: None,
            last_clock_out: Some("18:00".into()),
        };
        let (patch, before, after) = derive_patch(&record, &request).unwrap();

        assert!(patch.first_clock_in.is_none());
        assert_eq!(patch.last_clock_out.as_deref(), Some("18:00"));
        assert_eq!(before["last_clock_out"], "18:30");
        assert_eq!(after["last_clock_out"], "18:00");
        assert_eq!(after["first_clock_in"], "09:00");
    }

    #[test]
    fn edit_clock_times_rejects_bad_time() {
        let record = sample_record();
        let request = AdjustmentRequest::EditClockTimes {
            first_clock_in: Some("25:99".into()),
            last_clock_out: None,
        };
        assert_matches!(
            derive_patch(&record, &request),
            Err(PipelineError::Core(CoreError::Validation(_)))
        );
    }

    #[test]
    fn edit_clock_times_rejects_empty_edit() {
        let record = sample_record();
        let request = AdjustmentRequest::EditClockTimes {
            first_clock_in: None,
            last_clock_out: None,
        };
        assert_matches!(
            derive_patch(&record, &request),
            Err(PipelineError::Core(CoreError::Validation(_)))
        );
    }

    // -- absences -------------------------------------------------------------

    #[test]
    fn mark_absent_paid_credits_scheduled_minutes() {
        let record = sample_record();
        let (patch, before, after) =
            derive_patch(&record, &AdjustmentRequest::MarkAbsentPaid).unwrap();

        assert_eq!(patch.status_id, Some(RecordStatus::Absent.id()));
        assert_eq!(patch.worked_minutes, Some(540));
        assert_eq!(patch.overtime_minutes, Some(0));
        assert_eq!(before["worked_minutes"], 480);
        assert_eq!(after["worked_minutes"], 540);
    }

    #[test]
    fn mark_absent_unpaid_zeroes_all_minutes() {
        let record = sample_record();
        let (patch, _, after) =
            derive_patch(&record, &AdjustmentRequest::MarkAbsentUnpaid).unwrap();

        assert_eq!(patch.worked_minutes, Some(0));
        assert_eq!(patch.holiday_minutes, Some(0));
        assert_eq!(after["worked_minutes"], 0);
    }

    // -- status override ------------------------------------------------------

    #[test]
    fn override_status_validates_known_ids() {
        let record = sample_record();
        let ok = derive_patch(
            &record,
            &AdjustmentRequest::OverrideStatus {
                status_id: RecordStatus::Holiday.id(),
            },
        );
        assert!(ok.is_ok());

        let bad = derive_patch(&record, &AdjustmentRequest::OverrideStatus { status_id: 42 });
        assert_matches!(bad, Err(PipelineError::Core(CoreError::Validation(_))));
    }

    // -- minute arithmetic ----------------------------------------------------

    #[test]
    fn add_minutes_targets_one_field() {
        let record = sample_record();
        let (patch, before, after) = derive_patch(
            &record,
            &AdjustmentRequest::AddMinutes {
                field: MinuteField::Overtime,
                minutes: 15,
            },
        )
        .unwrap();

        assert_eq!(patch.overtime_minutes, Some(45));
        assert!(patch.worked_minutes.is_none());
        assert_eq!(before["overtime_minutes"], 30);
        assert_eq!(after["overtime_minutes"], 45);
    }

    #[test]
    fn remove_minutes_floors_at_zero() {
        let record = sample_record();
        let (patch, _, _) = derive_patch(
            &record,
            &AdjustmentRequest::RemoveMinutes {
                field: MinuteField::Overtime,
                minutes: 90,
            },
        )
        .unwrap();
        assert_eq!(patch.overtime_minutes, Some(0));
    }

    #[test]
    fn non_positive_minutes_rejected() {
        let record = sample_record();
        assert_matches!(
            derive_patch(
                &record,
                &AdjustmentRequest::AddMinutes {
                    field: MinuteField::Worked,
                    minutes: 0,
                },
            ),
            Err(PipelineError::Core(CoreError::Validation(_)))
        );
    }
}
