// crates/labeldb-server/src/bin/recorder.rs
// ============================================================================
// Module: Recorder Service Entry Point
// Description: Run the ingest-queue consumer and its metrics endpoint.
// Purpose: Assemble store, recorder loop, and scraper-facing channel.
// Dependencies: labeldb-server, labeldb-recorder, labeldb-config, clap, tokio
// ============================================================================

//! ## Overview
//! The recorder service owns the write path: it opens the store, starts the
//! single recorder loop over the bounded ingest channel, and serves
//! `/metrics`. Scrapers are external collaborators; they publish identity
//! records through the channel sender this process hands out. On SIGINT or
//! SIGTERM — or immediately in `--oneshot` mode — the channel closes, the
//! loop drains, the WAL is checkpointed, and handles are closed. Exit code 0
//! on a clean shutdown, 1 on startup failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use labeldb_config::Config;
use labeldb_recorder::Recorder;
use labeldb_recorder::RecorderMetrics;
use labeldb_recorder::ingest_channel;
use labeldb_server::SharedRegistry;
use labeldb_server::metrics_router;
use labeldb_store::LabelStore;
use prometheus_client::registry::Registry;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: CLI
// ============================================================================

/// Ingest-queue consumer for the partitioned label store.
#[derive(Debug, Parser)]
#[command(name = "recorder", version)]
struct Args {
    /// Path to the config file.
    #[arg(long = "config.file", default_value = "config.toml")]
    config_file: PathBuf,
    /// Path to the database directory.
    #[arg(long = "db.dir", default_value = "./data/")]
    db_dir: PathBuf,
    /// Address to listen on.
    #[arg(long = "web.listen-address", default_value = "0.0.0.0:8081")]
    listen_address: String,
    /// Drain whatever producers enqueue, then exit.
    #[arg(long)]
    oneshot: bool,
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

    let config = match Config::load(&args.config_file) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, file = %args.config_file.display(), "failed to load config");
            return ExitCode::FAILURE;
        }
    };

    let store = match LabelStore::open(&args.db_dir) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!(error = %err, dir = %args.db_dir.display(), "failed to open label store");
            return ExitCode::FAILURE;
        }
    };

    let mut registry = Registry::default();
    let metrics = RecorderMetrics::new(&mut registry);
    let registry = SharedRegistry::new(registry);

    let (sender, receiver) = ingest_channel();
    let recorder = Recorder::new(Arc::clone(&store), receiver, metrics);
    let recorder_handle = tokio::spawn(recorder.run());

    for target in &config.targets {
        info!(
            region = %target.region,
            namespaces = ?target.namespaces,
            "configured scrape target"
        );
    }

    let listener = match tokio::net::TcpListener::bind(&args.listen_address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, address = %args.listen_address, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };
    info!(address = %args.listen_address, "starting metrics server");
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, metrics_router(registry)).await {
            error!(error = %err, "metrics server failed");
        }
    });

    if args.oneshot {
        info!("oneshot mode: draining ingest queue");
    } else {
        shutdown_signal().await;
        info!("stopping the recorder");
    }

    // Closing the send side ends the loop after it drains buffered records.
    drop(sender);
    if let Err(err) = recorder_handle.await {
        error!(error = %err, "recorder loop panicked");
    }
    if let Err(err) = store.wal_checkpoint() {
        error!(error = %err, "final wal checkpoint failed");
    }
    if let Err(err) = store.close() {
        error!(error = %err, "failed to close label store");
    }
    info!("recorder stopped");
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
