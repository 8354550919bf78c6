use std::sync::Arc;

use timeclock_pipeline::WebhookIntake;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: timeclock_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Webhook intake service.
    pub intake: Arc<WebhookIntake>,
    /// Centralized event bus for publishing pipeline events.
    pub bus: Arc<timeclock_events::EventBus>,
}
