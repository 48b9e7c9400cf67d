//! linkhub-web: REST server for the linkhub social backend.
//!
//! Opens the SQLite store under the data directory, mounts the API router
//! and serves until Ctrl-C or SIGTERM.

pub mod config;
pub mod handlers;
pub mod identity;
pub mod router;
pub mod state;

use clap::Parser;
use tokio::signal;
use tower_http::cors::CorsLayer;

use crate::notifications::NotificationWriter;
use crate::storage::{db_path, Storage};

use config::{Cli, Config};

/// Entry point: parse CLI, open the store, start the server.
pub async fn run() {
    let cli = Cli::parse();
    let config = Config::from_cli_and_env(cli);

    crate::logging::init();

    tracing::info!("linkhub-web starting");
    tracing::info!("  data directory: {}", config.data_dir.display());

    let path = db_path(&config.data_dir);
    let storage = match Storage::open(&path) {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!("failed to open database {}: {e}", path.display());
            std::process::exit(1);
        }
    };
    tracing::info!("  database: {}", path.display());

    // Events left behind by an interrupted drain.
    NotificationWriter::new(&storage).drain_logged();

    let state = state::shared(storage);
    let app = router::build_router(state).layer(CorsLayer::permissive());

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to bind {}: {e}", config.bind_addr);
            std::process::exit(1);
        }
    };
    tracing::info!("linkhub-web listening on http://{}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
    tracing::info!("linkhub-web stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl-C: {e}");
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
                tracing::warn!("failed to install SIGTERM handler: {e}");
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
    tracing::info!("shutdown signal received");
}
