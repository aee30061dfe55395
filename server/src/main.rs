use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum_server::Handle;
use clap::Parser;
use fleettrack_server::{config::Settings, http, store::SledLocationStore, Pipeline};
use tower::make::Shared;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "fleettrack-server", about)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Logging verbosity (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level)
        .with_context(|| format!("invalid log level: {}", args.log_level))?;
    fmt().with_env_filter(filter).with_target(true).init();

    let settings = Settings::load(args.config.as_deref()).context("loading configuration")?;

    let store = SledLocationStore::open(&settings.server.db_path)
        .with_context(|| format!("opening database at {}", settings.server.db_path))?;
    let pipeline = Pipeline::new(&settings, Arc::new(store));
    pipeline.scheduler.start();

    let handle = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone()));

    let addr = settings.server.listen_addr;
    info!(%addr, flush_interval = ?settings.flush.interval(), "serving");
    axum_server::bind(addr)
        .handle(handle)
        .serve(Shared::new(http::router(pipeline.clone())))
        .await?;

    pipeline.scheduler.stop().await;
    info!("fleettrack stopped");
    Ok(())
}

async fn shutdown_on_signal(handle: Handle) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                }
            }
            Err(_) => {
                let _ = ctrl_c.await;
                info!("received SIGINT, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        info!("received SIGINT, shutting down");
    }

    handle.graceful_shutdown(Some(Duration::from_secs(5)));
}
