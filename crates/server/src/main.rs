//! sigtrack server binary.

use anyhow::{Context, Result};
use clap::Parser;
use sigtrack_server::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use sigtrack_server::{AppState, create_router, trigger};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// sigtrack - signature request tracker
#[derive(Parser, Debug)]
#[command(name = "sigtrackd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = CONFIG_PATH_ENV, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("sigtrack v{}", env!("CARGO_PKG_VERSION"));

    let config = sigtrack_server::config::load(&args.config)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;

    sigtrack_server::metrics::register_metrics();

    let records = sigtrack_records::from_config(&config.records)
        .await
        .context("failed to initialize record store")?;
    records
        .health_check()
        .await
        .context("record store health check failed")?;
    tracing::info!("record store initialized");

    let provider =
        sigtrack_provider::from_config(&config.provider).context("failed to configure provider")?;

    let archiver = sigtrack_archive::from_config(&config.archive)
        .await
        .context("failed to initialize archive backend")?;
    archiver
        .health_check()
        .await
        .context("archive backend health check failed")?;
    tracing::info!(backend = archiver.backend_name(), "archive backend verified");

    let state = AppState::new(config.clone(), records, provider, archiver)
        .context("failed to build reconciler")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener_task = trigger::spawn_insert_listener(
        state.records.as_ref(),
        state.trigger.clone(),
        shutdown_rx.clone(),
    );
    let driver_task = trigger::spawn_driver(
        state.reconciler.clone(),
        state.trigger.clone(),
        config.reconcile.poll_interval(),
        config.reconcile.reconcile_on_startup,
        shutdown_rx,
    );

    let app = create_router(state);
    let addr: SocketAddr = config
        .server
        .bind_addr()
        .parse()
        .context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!("Server running on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    driver_task.await.context("reconcile driver panicked")?;
    listener_task.await.context("insert listener panicked")?;
    Ok(())
}

/// Resolves on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
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
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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
}
