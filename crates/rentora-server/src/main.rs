//! # Rentora Scheduler
//!
//! Runs the booking lifecycle workers, the sweep triggers and the
//! operational HTTP surface in one process.

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use rentora_config::ConfigLoader;
use rentora_core::telemetry::init_logging;
use rentora_server::{startup, App};
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Application error: {e:#}");
        eprintln!("Application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ConfigLoader::from_default_location()?.get().await;
    init_logging(&config.logging)?;

    startup::print_banner();
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.environment);

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("installing Prometheus recorder")?;
    rentora_jobs::register_metrics();

    let app = App::build(&config, Some(metrics)).await?;
    let addr = config.server.addr();
    startup::print_startup_info(&addr, &app.workers.queues(), &app.scheduler.trigger_names());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    app.start();

    let router = app.router();
    let served = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    app.shutdown().await;
    served.context("HTTP server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        () = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        }
    }
}
