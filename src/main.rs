use chrono::{Local, Utc};
use clap::Parser;
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use newtab_sync_server::{
    bootstrap, logging, open_database, router, AppState, Cli, Config, LogDirectory,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()
        .map_err(|e| anyhow::anyhow!(e))?
        .with_cli(cli);

    let logs = LogDirectory::open(
        &config.log_dir,
        config.log_keep_days,
        Local::now().date_naive(),
    )?;

    // Initialize tracing: console plus the daily log file
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newtab_sync_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(logs.clone()),
        )
        .init();

    tracing::info!("Starting new-tab sync server...");
    tracing::info!(
        "Environment: {}, Server: {}, log directory: {:?} (keep {} days)",
        config.environment,
        config.server_address(),
        logs.dir(),
        logs.keep_days()
    );

    let db = open_database(&config.database_path, config.database_max_connections).await?;

    bootstrap::ensure_admin(&db, &config, Utc::now().timestamp()).await?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let housekeeping = logging::spawn_housekeeping(logs.clone(), stop_rx);

    let addr: SocketAddr = config.server_address().parse()?;
    let app = router(AppState::new(db.clone(), config, logs));

    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    let _ = stop_tx.send(true);
    if let Err(e) = housekeeping.await {
        tracing::error!("Log housekeeping task failed: {}", e);
    }
    db.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
