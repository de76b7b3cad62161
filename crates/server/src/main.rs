mod api;
mod bootstrap;
mod bot;
mod health;
#[cfg(test)]
mod test_support;

use std::time::Duration;

use anyhow::Result;
use hyperbot_core::config::{AppConfig, LoadOptions};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use hyperbot_core::config::LogFormat::*;

    // RUST_LOG wins over the configured level so a single module can be turned up.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap(config).await?;
    let bootstrap::Application { config, router, worker, job_receiver, slack_runner, .. } = app;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // The worker must be draining the queue before recovery refills it.
    let worker_task = tokio::spawn(worker.clone().run(job_receiver, shutdown_rx.clone()));
    if let Err(error) = worker.recover().await {
        tracing::warn!(
            event_name = "system.server.recovery_failed",
            correlation_id = "bootstrap",
            error = %error,
            "unfinished uipath jobs could not be requeued"
        );
    }

    let slack_task = tokio::spawn(async move {
        if let Err(error) = slack_runner.start(shutdown_rx).await {
            tracing::error!(
                event_name = "system.server.slack_runner_failed",
                correlation_id = "bootstrap",
                error = %error,
                "slack socket mode runner stopped with an error"
            );
        }
    });

    let address = config.server_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "hyperbot-server started"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(error) = wait_for_shutdown().await {
                tracing::warn!(error = %error, "failed to listen for ctrl-c; shutting down");
            }
            let _ = shutdown_tx.send(true);
        })
        .await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "hyperbot-server stopping"
    );

    let grace = Duration::from_secs(config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, worker_task).await.is_err() {
        tracing::warn!(
            event_name = "system.server.worker_shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = config.server.graceful_shutdown_secs,
            "job worker did not stop within the grace period"
        );
    }
    if tokio::time::timeout(grace, slack_task).await.is_err() {
        tracing::warn!(
            event_name = "system.server.slack_shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = config.server.graceful_shutdown_secs,
            "slack runner did not drain within the grace period"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
