use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use simple_fileserver::config::{Config, ENV_PREFIX};
use simple_fileserver::logging::init_logging;
use simple_fileserver::{AppState, create_router};

#[derive(Parser, Debug)]
#[command(name = "simple-fileserver")]
#[command(about = "Browse, search, view and upload files over HTTP")]
#[command(version)]
struct Cli {
    /// Config file path (created with defaults if missing)
    #[arg(short, long, env = "SIMPLE_SERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the directory files are served from
    #[arg(short, long)]
    root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(root) = cli.root {
        config.storage.upload_dir = root;
    }

    // Hold the guard so buffered log lines are flushed on exit
    let _log_guard = init_logging(&config.logging)?;

    config.storage.ensure_directories()?;

    let root_dir = config
        .storage
        .upload_dir
        .canonicalize()
        .with_context(|| format!("resolving {}", config.storage.upload_dir.display()))?;
    if !root_dir.is_dir() {
        bail!("Root path is not a directory: {}", root_dir.display());
    }
    config.storage.upload_dir = root_dir;
    config.storage.incoming_dir = config
        .storage
        .incoming_dir
        .canonicalize()
        .with_context(|| format!("resolving {}", config.storage.incoming_dir.display()))?;

    info!("Environment overrides use the {}__ prefix", ENV_PREFIX);
    config.print_summary();

    let addr = config.listen_addr();
    let state = AppState::new(config).context("initializing application state")?;
    let app = create_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running server")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received");
}
