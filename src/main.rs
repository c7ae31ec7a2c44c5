use std::path::PathBuf;

use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use userpages::config::Configuration;
use userpages::telemetry::{self, Providers};

const DEFAULT_LOG_FILTER: &str = "userpages=debug,tower_http=info,mongodb=warn";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // optional path to `config.yaml` as first argument.
    let mut config = Configuration::default();
    if let Some(path) = std::env::args().nth(1) {
        config = config.path(PathBuf::from(path));
    }
    let config = config.read();

    let (providers, log_bridge) = Providers::init(config.telemetry.otlp_endpoint.as_deref())?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with(fmt::layer().with_target(true))
        .with(log_bridge)
        .init();

    let metrics = if config.telemetry.metrics {
        Some(telemetry::setup_metrics_recorder()?)
    } else {
        None
    };

    let state = userpages::initialize_state(config.clone(), metrics).await?;
    let client = state.db.client.clone();

    let listener = TcpListener::bind(config.socket_addr()).await?;
    tracing::info!(address = %config.socket_addr(), version = %config.version, "server listening");

    axum::serve(listener, userpages::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    client.shutdown().await;
    providers.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "cannot listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(err) => {
                tracing::error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
