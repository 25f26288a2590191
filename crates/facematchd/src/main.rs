use anyhow::{Context, Result};
use clap::Parser;
use facematch_core::OnnxFaceAnalyzer;
use facematchd::{router, spawn_engine, AppState, Config, ImageResolver};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "facematchd", version, about = "Face match HTTP service")]
struct Cli {
    /// TOML config file (defaults to $FACEMATCH_CONFIG when set)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the listening port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "facematchd starting");

    let analyzer = OnnxFaceAnalyzer::load(&config.model_dir, config.inference_threads)
        .with_context(|| format!("failed to load face models from {}", config.model_dir.display()))?;
    let engine = spawn_engine(analyzer)?;

    let resolver = ImageResolver::new(
        Duration::from_secs(config.fetch_timeout_secs),
        config.max_image_bytes,
    )
    .context("failed to build HTTP client")?;

    let app = router(AppState::new(engine, resolver), config.max_request_bytes());

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "facematchd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("facematchd shutting down");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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
