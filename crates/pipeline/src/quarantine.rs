//! Quarantine resolution: reattach an unresolved event to a user after
//! the fact, optionally backfilling the identity mapping and re-running
//! reconciliation for the affected day.
//!
//! All effects commit in one transaction or not at all.

use timeclock_core::error::CoreError;
use timeclock_core::scheduling::{
    reconcile_job_key, JOB_RECONCILE_DAY, MAX_JOB_ATTEMPTS, PRIORITY_URGENT,
};
use timeclock_core::types::DbId;
use timeclock_db::models::event::AttendanceEvent;
use timeclock_db::models::job::EnqueueJob;
use timeclock_db::models::processing_log::triggers;
use timeclock_db::models::status::EventStatus;
use timeclock_db::repositories::{EventRepo, JobRepo, MappingRepo};
use timeclock_db::DbPool;
use timeclock_events::bus::{event_types, PipelineEvent};
use timeclock_events::EventBus;

use crate::error::PipelineError;
use crate::reconcile::ReconcileJobPayload;

/// Options for a quarantine resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Backfill a `UserDeviceMapping` for the (terminal user id, device)
    /// pair if none exists, so future events resolve automatically.
    pub create_mapping: bool,
    /// Enqueue reconciliation for the event's day.
    pub reprocess: bool,
}

/// Result of a quarantine resolution.
#[derive(Debug)]
pub struct ResolveOutcome {
    pub event: AttendanceEvent,
    /// Whether a new mapping row was created.
    pub mapping_created: bool,
    /// Whether a reconciliation job was enqueued (or coalesced).
    pub job_enqueued: bool,
}

/// Resolve a quarantined event onto `target_user_id`.
///
/// Rejects with `NotQuarantined` unless the event's status is exactly
/// QUARANTINED, so resolving twice fails the second time. The user
/// reassignment, status flip, resolver stamp, optional mapping backfill,
/// and optional job enqueue are atomic.
pub async fn resolve(
    pool: &DbPool,
    bus: &EventBus,
    event_id: DbId,
    target_user_id: DbId,
    options: ResolveOptions,
    actor: &str,
) -> Result<ResolveOutcome, PipelineError> {
    let mut tx = pool.begin().await?;

    let event = EventRepo::find_by_id_for_update_tx(&mut *tx, event_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "AttendanceEvent",
            id: event_id,
        })?;

    if event.status_id != EventStatus::Quarantined.id() {
        return Err(PipelineError::Core(CoreError::NotQuarantined { event_id }));
    }

    let resolved = EventRepo::apply_quarantine_resolution_tx(&mut *tx, event_id, target_user_id, actor)
        .await?
        .ok_or_else(|| {
            // The row is locked by our own FOR UPDATE; the guard cannot
            // fail underneath us.
            CoreError::Internal("quarantined event changed status while locked".into())
        })?;

    let mut mapping_created = false;
    if options.create_mapping {
        if let Some(terminal_id) = &event.terminal_user_id {
            mapping_created = MappingRepo::insert_if_absent_tx(
                &mut *tx,
                terminal_id,
                &event.device_id,
                target_user_id,
            )
            .await?;
        }
    }

    let mut job_enqueued = false;
    if options.reprocess {
        let payload = ReconcileJobPayload {
            user_id: target_user_id,
            work_date: resolved.local_date,
            trigger: triggers::QUARANTINE.to_string(),
        };
        JobRepo::enqueue_tx(
            &mut *tx,
            &EnqueueJob {
                job_type: JOB_RECONCILE_DAY.to_string(),
                job_key: reconcile_job_key(target_user_id, resolved.local_date),
                payload: serde_json::to_value(&payload)
                    .map_err(|e| CoreError::Internal(e.to_string()))?,
                priority: PRIORITY_URGENT,
                max_attempts: MAX_JOB_ATTEMPTS,
            },
        )
        .await?;
        job_enqueued = true;
    }

    tx.commit().await?;

    bus.publish(
        PipelineEvent::new(event_types::EVENT_RESOLVED)
            .with_user(target_user_id)
            .with_device(resolved.device_id.clone())
            .with_work_date(resolved.local_date)
            .with_payload(serde_json::json!({
                "event_id": event_id,
                "actor": actor,
                "mapping_created": mapping_created,
            })),
    );

    tracing::info!(
        event_id,
        target_user_id,
        actor,
        mapping_created,
        job_enqueued,
        "Quarantined event resolved",
    );

    Ok(ResolveOutcome {
        event: resolved,
        mapping_created,
        job_enqueued,
    })
}
