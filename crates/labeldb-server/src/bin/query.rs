// crates/labeldb-server/src/bin/query.rs
// ============================================================================
// Module: Query Service Entry Point
// Description: Serve the Prometheus series API over an existing store.
// Purpose: Run the read path: series queries, metrics, idle-handle cleanup.
// Dependencies: labeldb-server, labeldb-store, axum, clap, tokio, tracing
// ============================================================================

//! ## Overview
//! The query service opens the partition directory read-side, serves
//! `/api/v1/series` and `/metrics`, and closes partition handles that sit
//! idle. Exit code 0 on a clean shutdown, 1 on startup failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use labeldb_server::AppState;
use labeldb_server::HttpMetrics;
use labeldb_server::SharedRegistry;
use labeldb_server::router;
use labeldb_store::LabelStore;
use prometheus_client::registry::Registry;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Interval between idle-handle cleanup sweeps.
const IDLE_CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

// ============================================================================
// SECTION: CLI
// ============================================================================

/// Prometheus series API over the partitioned label store.
#[derive(Debug, Parser)]
#[command(name = "query", version)]
struct Args {
    /// Path to the database directory.
    #[arg(long = "db.dir", default_value = "./data/")]
    db_dir: PathBuf,
    /// Address to listen on.
    #[arg(long = "web.listen-address", default_value = "0.0.0.0:8080")]
    listen_address: String,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let store = match LabelStore::open(&args.db_dir) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!(error = %err, dir = %args.db_dir.display(), "failed to open label store");
            return ExitCode::FAILURE;
        }
    };

    let mut registry = Registry::default();
    let metrics = HttpMetrics::new(&mut registry);
    let state = AppState {
        store: Arc::clone(&store),
        fresh: None,
        metrics,
        registry: SharedRegistry::new(registry),
    };

    // Periodically close partition handles the query traffic stopped using.
    let cleanup_store = Arc::clone(&store);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(IDLE_CLEANUP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // the first tick fires immediately
        loop {
            ticker.tick().await;
            match cleanup_store.cleanup_idle() {
                Ok(()) => info!("idle handle cleanup completed"),
                Err(err) => error!(error = %err, "idle handle cleanup failed"),
            }
        }
    });

    let listener = match tokio::net::TcpListener::bind(&args.listen_address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, address = %args.listen_address, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };
    info!(address = %args.listen_address, "starting query server");

    let serve = axum::serve(listener, router(state)).with_graceful_shutdown(shutdown_signal());
    if let Err(err) = serve.await {
        error!(error = %err, "server failed");
        return ExitCode::FAILURE;
    }

    if let Err(err) = store.close() {
        error!(error = %err, "failed to close label store");
    }
    info!("query server stopped");
    ExitCode::SUCCESS
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for sigterm");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("received shutdown signal");
}
