use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use outbox_sync::clock::SystemClock;
use outbox_sync::config::Config;
use outbox_sync::processors::ProcessorRegistry;
use outbox_sync::processors::remote_api::RemoteApiProcessor;
use outbox_sync::store::PgActionStore;
use outbox_sync::worker::{self, SyncScheduler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!("Starting outbox sync");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied");

    let mut processors = ProcessorRegistry::new();
    for processor in
        RemoteApiProcessor::for_all_types(&config.api_base_url, config.sync.processor_timeout)?
    {
        processors.register(Arc::new(processor));
    }

    let runner = outbox_sync::build_runner(
        Arc::new(PgActionStore::new(pool.clone())),
        processors,
        Arc::new(SystemClock),
        &config.sync,
    )?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (handle, join) = worker::spawn(Arc::new(runner), config.scheduler.clone(), shutdown_rx);

    // Drain anything left over from the previous run right away.
    handle.schedule_sync(true);

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
    join.await?;
    pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping sync loop");
}
