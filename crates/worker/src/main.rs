//! Reconciliation worker: a small, bounded pool of claim loops pulling
//! jobs from the durable queue and running them through the dispatch
//! table.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timeclock_core::policy::ReconcilePolicy;
use timeclock_core::scheduling::JOB_RECONCILE_DAY;
use timeclock_events::EventBus;
use timeclock_pipeline::dispatch::{Dispatcher, ReconcileDayHandler, DEFAULT_POLL_INTERVAL};
use timeclock_pipeline::providers::{FixedHolidayProvider, WeeklyScheduleProvider};
use timeclock_pipeline::Reconciler;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timeclock_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let policy = ReconcilePolicy::from_env();
    tracing::info!(
        grace_in = policy.grace_in_minutes,
        grace_out = policy.grace_out_minutes,
        overtime_threshold = policy.overtime_threshold_minutes,
        rounding = policy.rounding_minutes,
        "Loaded reconciliation policy",
    );

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = timeclock_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    timeclock_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    let concurrency: usize = std::env::var("WORKER_CONCURRENCY")
        .unwrap_or_else(|_| "4".into())
        .parse()
        .expect("WORKER_CONCURRENCY must be a valid usize");

    let poll_interval = std::env::var("WORKER_POLL_INTERVAL_SECS")
        .ok()
        .map(|raw| {
            Duration::from_secs(
                raw.parse()
                    .expect("WORKER_POLL_INTERVAL_SECS must be a valid u64"),
            )
        })
        .unwrap_or(DEFAULT_POLL_INTERVAL);

    let bus = Arc::new(EventBus::default());
    let reconciler = Arc::new(Reconciler::new(
        pool.clone(),
        policy,
        Arc::new(WeeklyScheduleProvider::from_env()),
        Arc::new(FixedHolidayProvider::from_env()),
        bus,
    ));

    let dispatcher = Arc::new(
        Dispatcher::new(pool, poll_interval).register(
            JOB_RECONCILE_DAY,
            Arc::new(ReconcileDayHandler::new(reconciler)),
        ),
    );

    let shutdown = CancellationToken::new();
    let mut loops = Vec::with_capacity(concurrency);
    for worker_idx in 0..concurrency {
        let dispatcher = dispatcher.clone();
        let shutdown = shutdown.clone();
        loops.push(tokio::spawn(async move {
            tracing::info!(worker_idx, "Claim loop started");
            dispatcher.run(shutdown).await;
        }));
    }
    tracing::info!(concurrency, "Worker pool running");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install ctrl-c handler");
    tracing::info!("Shutdown signal received; stopping claim loops");
    shutdown.cancel();

    for handle in loops {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Claim loop panicked");
        }
    }
    tracing::info!("Worker stopped");
}
