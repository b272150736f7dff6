#![forbid(unsafe_code)]

//! `groved` – the Grove API server binary.

use std::future::IntoFuture;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grove_server::{bootstrap, router, ServerConfig};

/// How long in-flight connections may drain after the shutdown signal.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "groved")]
#[command(about = "Grove API server - hierarchical event and time tracking")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// TCP port to listen on (overrides the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Directory holding the snapshot file (overrides the config file)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Snapshot file stem (overrides the config file)
    #[arg(long)]
    db_name: Option<String>,

    /// Ops log file served by /logs (overrides the config file)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// JWT signing secret
    #[arg(long, env = "GROVE_JWT_SECRET")]
    jwt_secret: Option<String>,

    /// Worker tasks serving the mutation queue
    #[arg(long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    info!("starting groved v{}", env!("CARGO_PKG_VERSION"));
    if std::env::var("SPAWNED").as_deref() == Ok("1") {
        debug!("running inline as a spawned child");
    }

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.server_port = port;
    }
    if let Some(db_path) = cli.db_path {
        config.database_path = db_path;
    }
    if let Some(db_name) = cli.db_name {
        config.database_name = db_name;
    }
    if let Some(log_file) = cli.log_file {
        config.log_file = Some(log_file);
    }
    if let Some(jwt_secret) = cli.jwt_secret {
        config.jwt_secret = jwt_secret;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }

    let port = config.server_port;
    let (state, pool) = bootstrap(config, cli.config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind to port {port}"))?;
    info!("API server listening on http://localhost:{port}");

    // One signal task feeds both the graceful-shutdown hook and the
    // drain timer.
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    });

    let mut graceful_rx = stop_rx.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = graceful_rx.wait_for(|stop| *stop).await;
            info!("received shutdown signal");
        })
        .into_future();

    let mut drain_rx = stop_rx;
    let drain_deadline = async move {
        let _ = drain_rx.wait_for(|stop| *stop).await;
        tokio::time::sleep(SHUTDOWN_DRAIN).await;
    };

    tokio::select! {
        result = server => {
            if let Err(err) = result {
                error!(error = %err, "API server error");
            }
        }
        _ = drain_deadline => {
            warn!("drain window elapsed, closing remaining connections");
        }
    }

    info!("shutting down API server");
    pool.shutdown().await;
    info!("groved stopped");
    Ok(())
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = format!(
        "groved={log_level},grove_server={log_level},grove_core={log_level},grove_store={log_level},grove_queue={log_level},tower_http={log_level}"
    );
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
