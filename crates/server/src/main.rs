mod api;
mod bootstrap;
mod clients;
mod health;

use std::time::Duration;

use anyhow::{Context, Result};
use coverquote_core::config::{AppConfig, LoadOptions};
use coverquote_core::IntegrationRegistry;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use coverquote_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let runtime = bootstrap::bootstrap_with_config(config, IntegrationRegistry::new()).await?;
    let grace = Duration::from_secs(runtime.config.server.graceful_shutdown_secs);
    let address = format!("{}:{}", runtime.config.server.bind_address, runtime.config.server.port);

    let worker = tokio::spawn(runtime.notification_worker.run());
    let app = api::router(runtime.api).merge(health::router(health::HealthState {
        db_pool: runtime.db_pool.clone(),
        carriers_registered: runtime.carriers_registered,
    }));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        address = %address,
        environment = runtime.config.runtime.environment.as_str(),
        "coverquote-server listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown()).await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "coverquote-server stopping; draining notifications"
    );

    // The worker exits once every queue sender (held by in-flight quote runs) is gone.
    if tokio::time::timeout(grace, worker).await.is_err() {
        tracing::warn!(
            event_name = "system.server.drain_timeout",
            correlation_id = "shutdown",
            "notification queue not drained before shutdown grace period elapsed"
        );
    }
    runtime.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_failed",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
    }
}
