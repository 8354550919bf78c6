use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timeclock_api::config::ServerConfig;
use timeclock_api::router::build_app_router;
use timeclock_api::state::AppState;
use timeclock_core::policy::ReconcilePolicy;
use timeclock_events::EventBus;
use timeclock_pipeline::WebhookIntake;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timeclock_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let policy = ReconcilePolicy::from_env();
    tracing::info!(
        grace_in = policy.grace_in_minutes,
        grace_out = policy.grace_out_minutes,
        overtime_threshold = policy.overtime_threshold_minutes,
        rounding = policy.rounding_minutes,
        "Loaded reconciliation policy",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = timeclock_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    timeclock_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    timeclock_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    // --- Services ---
    let bus = Arc::new(EventBus::default());
    let intake = Arc::new(WebhookIntake::new(
        pool.clone(),
        policy,
        config.webhook_secret.clone(),
        bus.clone(),
    ));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        intake,
        bus,
    };

    // --- Server ---
    let app = build_app_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid bind address");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    tracing::info!(%addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install ctrl-c handler");
    tracing::info!("Shutdown signal received; draining connections");
}
