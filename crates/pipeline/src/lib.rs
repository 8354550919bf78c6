//! The attendance processing engine: webhook intake, day reconciliation,
//! record lifecycle, quarantine resolution, and job dispatch.
//!
//! Shared by the API server (intake, administrative operations) and the
//! worker binary (job execution) so both sides run the same semantics.

pub mod dispatch;
pub mod error;
pub mod intake;
pub mod providers;
pub mod quarantine;
pub mod reconcile;
pub mod records;

pub use error::PipelineError;
pub use intake::WebhookIntake;
pub use reconcile::{ReconcileOutcome, Reconciler};
