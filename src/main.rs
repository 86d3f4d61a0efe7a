//! Blobnotes -- notes and image board backed by SQLite and Azure Blob Storage.
//!
//! Startup loads `.env`, the optional YAML config and the environment, then
//! connects the note database and the blob container before listening.
//! SIGTERM/SIGINT stop accepting connections and drain in-flight requests.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use blobnotes::config::{Config, LoggingConfig};

/// Command-line arguments for the Blobnotes server.
#[derive(Parser, Debug)]
#[command(
    name = "blobnotes",
    version,
    about = "Notes and image board backed by Azure Blob Storage"
)]
struct Cli {
    /// Path to an optional YAML configuration file.
    #[arg(short, long)]
    config: Option<String>,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env is normal in production.
    let dotenv = dotenvy::dotenv();

    let config: Config = blobnotes::config::load_config(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match dotenv {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => error!("Ignoring unreadable .env: {}", e),
    }
    if let Some(path) = &cli.config {
        info!("Loaded configuration from {}", path);
    }

    if config.observability.metrics {
        blobnotes::metrics::init_metrics()?;
        info!("Prometheus metrics initialized");
    }

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    let state = blobnotes::build_state(config).await?;
    let app = blobnotes::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Blobnotes listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Blobnotes shut down");

    Ok(())
}

/// Install the global subscriber.  `RUST_LOG` overrides `logging.level`.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", e);
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
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        },
    }
}
