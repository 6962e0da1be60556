//! Harvest API server entry point.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use harvest_api::{create_router, AppState};
use harvest_db::{Database, DbConfig};
use harvest_sync::{HarvestConfig, SyncEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,harvest_sync=debug")),
        )
        .with_target(true)
        .init();

    info!("Starting Harvest API server...");

    // Load configuration
    let config_path = std::env::args().nth(1).map(Into::into);
    let config = HarvestConfig::load(config_path).context("Failed to load configuration")?;
    info!(
        api_base = %config.vendor.api_base_url,
        database = %config.database.path.display(),
        parallel = config.sync.parallel_branches,
        "Configuration loaded"
    );

    // Open the mirror
    let db = Database::new(DbConfig::new(config.database.path.clone()))
        .await
        .context("Failed to open database")?;
    info!("Database ready");

    let engine = SyncEngine::new(&config, db).context("Failed to build sync engine")?;
    let app = create_router(AppState::new(engine));

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
