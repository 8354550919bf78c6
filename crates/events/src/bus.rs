//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`PipelineEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use timeclock_core::types::DbId;

// ---------------------------------------------------------------------------
// Event type names
// ---------------------------------------------------------------------------

/// Known event type names published on the bus.
pub mod event_types {
    pub const EVENT_INGESTED: &str = "attendance.event.ingested";
    pub const EVENT_QUARANTINED: &str = "attendance.event.quarantined";
    pub const EVENT_RESOLVED: &str = "attendance.event.resolved";
    pub const RECORD_RECONCILED: &str = "attendance.record.reconciled";
    pub const RECORD_ADJUSTED: &str = "attendance.record.adjusted";
    pub const RECORD_APPROVED: &str = "attendance.record.approved";
    pub const RECORD_UNLOCKED: &str = "attendance.record.unlocked";
}

// ---------------------------------------------------------------------------
// PipelineEvent
// ---------------------------------------------------------------------------

/// A domain event that occurred in the attendance pipeline.
///
/// Constructed via [`PipelineEvent::new`] and enriched with the builder
/// methods [`with_user`](PipelineEvent::with_user),
/// [`with_device`](PipelineEvent::with_device),
/// [`with_work_date`](PipelineEvent::with_work_date), and
/// [`with_payload`](PipelineEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Dot-separated event name, e.g. `"attendance.record.reconciled"`.
    pub event_type: String,

    /// Internal user the event concerns, when resolved.
    pub user_id: Option<DbId>,

    /// Terminal device the event originated from, when applicable.
    pub device_id: Option<String>,

    /// Local work date the event concerns, when applicable.
    pub work_date: Option<NaiveDate>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl PipelineEvent {
    /// Create a new event with only the required `event_type`.
    ///
    /// All optional fields default to `None` / empty object.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            user_id: None,
            device_id: None,
            work_date: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the concerned user to the event.
    pub fn with_user(mut self, user_id: DbId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Attach the originating device to the event.
    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Attach the concerned local work date to the event.
    pub fn with_work_date(mut self, work_date: NaiveDate) -> Self {
        self.work_date = Some(work_date);
        self
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`PipelineEvent`].
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: PipelineEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let work_date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let event = PipelineEvent::new(event_types::RECORD_RECONCILED)
            .with_user(42)
            .with_device("lobby-01")
            .with_work_date(work_date)
            .with_payload(serde_json::json!({"worked_minutes": 540}));

        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, event_types::RECORD_RECONCILED);
        assert_eq!(received.user_id, Some(42));
        assert_eq!(received.device_id.as_deref(), Some("lobby-01"));
        assert_eq!(received.work_date, Some(work_date));
        assert_eq!(received.payload["worked_minutes"], 540);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PipelineEvent::new(event_types::EVENT_INGESTED));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.event_type, event_types::EVENT_INGESTED);
        assert_eq!(e2.event_type, event_types::EVENT_INGESTED);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        // No subscribers — this must not panic.
        bus.publish(PipelineEvent::new(event_types::EVENT_QUARANTINED));
    }

    #[test]
    fn default_event_has_empty_optional_fields() {
        let event = PipelineEvent::new("bare.event");
        assert_eq!(event.event_type, "bare.event");
        assert!(event.user_id.is_none());
        assert!(event.device_id.is_none());
        assert!(event.work_date.is_none());
        assert!(event.payload.is_object());
    }
}
