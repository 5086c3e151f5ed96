use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use parish_forms_api::app;
use parish_forms_api::config::Config;
use parish_forms_api::jobs::{JobScheduler, PoolMetricsJob, RateLimitSweepJob};
use parish_forms_api::middleware;
use parish_forms_api::services::{AttemptLimiter, EmailService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    middleware::logging::init_logging(&config.logging);
    middleware::init_metrics()?;

    info!("Starting Parish Forms API v{}", env!("CARGO_PKG_VERSION"));

    // Create database pool
    let pool = persistence::db::create_pool(&config.database.pool_config()).await?;

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations")
        .run(&pool)
        .await?;
    info!("Migrations completed");

    let attempt_limiter = Arc::new(AttemptLimiter::in_memory(config.rate_limits.clone()));

    // Background jobs
    let mut scheduler = JobScheduler::new();
    scheduler.register(RateLimitSweepJob::new(
        attempt_limiter.clone(),
        config.rate_limits.sweep_interval_secs,
    ));
    scheduler.register(PoolMetricsJob::new(pool.clone()));
    scheduler.start();

    // Build application
    let email = Arc::new(EmailService::new(config.email.clone()));
    let app = app::create_app_with_state(config.clone(), pool, email, attempt_limiter);

    // Start server
    let addr = config.socket_addr()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(10)).await;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}
