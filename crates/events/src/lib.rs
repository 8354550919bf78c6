//! In-process domain-event bus for the attendance platform.
//!
//! Downstream consumers (analytics exports, notification fan-out) subscribe
//! to the bus; the intake and reconciliation pipeline publish to it.

pub mod bus;

pub use bus::{PipelineEvent, EventBus};
