use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drawq_worker::config::WorkerConfig;
use drawq_worker::Services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drawq_worker=debug,drawq_queue=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env()?;
    tracing::info!(
        store_timeout_secs = config.store_timeout.as_secs(),
        notify_pool_size = config.notify_pool_size,
        "Loaded worker configuration"
    );

    let services = Services::start(config)?;
    tracing::info!("Worker running, press Ctrl-C to stop");

    shutdown_signal().await?;

    services.shutdown().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::info!("Received SIGTERM, starting graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl-C, starting graceful shutdown");
    }

    Ok(())
}
