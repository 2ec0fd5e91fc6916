//! Housing API - serves the registered California housing regressor
//!
//! Resolves one pinned (model name, version) from the registry at startup.
//! A failed load leaves the service running in degraded mode.

use anyhow::{Context, Result};
use housing_core::{
    observability::{ServiceMetrics, StructuredLogger},
    regression::Regressor,
    serving::{ModelHandle, ServiceState},
    tracking::open_store,
};
use housing_server::{api, config::ServerConfig};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_NAME: &str = "housing-api";
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::load()?;
    init_tracing(config.log_file.as_deref())?;

    info!(?config, "Starting housing-server");

    let metrics = ServiceMetrics::new();
    let logger = StructuredLogger::new(SERVICE_NAME);
    logger.log_startup(SERVICE_VERSION, config.api_port, &config.tracking_uri);

    let model = match open_store(&config.tracking_uri) {
        Ok(store) => ModelHandle::load(&store, &config.model_name, config.model_version),
        Err(e) => ModelHandle::degraded(format!("cannot open tracking store: {e}")),
    };

    match model.state() {
        ServiceState::Ready {
            model: regressor,
            name,
            version,
        } => {
            let family = regressor.family().to_string();
            metrics.set_model(name, *version, &family);
            logger.log_model_loaded(name, *version, &family);
        }
        ServiceState::Degraded { reason } => {
            metrics.set_model_unavailable();
            logger.log_model_load_failed(&config.model_name, config.model_version, reason);
        }
    }

    let state = Arc::new(api::AppState::new(model, metrics, logger.clone()));
    api::serve(config.api_port, state, shutdown_signal(logger)).await?;

    info!("Shutdown complete");
    Ok(())
}

/// JSON logs to stdout, plus an appended JSON file when configured
fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let file_layer = log_file
        .map(|path| -> Result<_> {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Ok(fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(Arc::new(file)))
        })
        .transpose()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .with(file_layer)
        .init();
    Ok(())
}

async fn shutdown_signal(logger: StructuredLogger) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let reason = tokio::select! {
        _ = ctrl_c => "SIGINT received",
        _ = terminate => "SIGTERM received",
    };
    logger.log_shutdown(reason);
}
