//! Fraud Scoring Service - Main Entry Point
//!
//! Loads the trained classifier and scaler, then serves `POST /predict`.

use anyhow::{Context, Result};
use fraud_scoring_service::{
    config::{AppConfig, LoggingConfig},
    metrics::{MetricsReporter, ServiceMetrics},
    models::{Artifacts, InferenceEngine},
    server::{self, AppState},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    init_logging(&config.logging)?;
    info!("Starting Fraud Scoring Service");
    info!(
        bind = %config.server.bind,
        model = %config.artifacts.model_path.display(),
        scaler = %config.artifacts.scaler_path.display(),
        "Configuration loaded successfully"
    );

    // Artifacts must be fully loaded before the listener accepts anything
    let artifacts = Artifacts::load(&config.artifacts).context("Failed to load artifacts")?;
    let engine = Arc::new(InferenceEngine::new(&artifacts));
    info!(
        features = engine.feature_count(),
        classes = ?engine.classes(),
        "Inference engine initialized"
    );

    let metrics = Arc::new(ServiceMetrics::new());
    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let app = server::router(
        AppState::new(engine, metrics.clone()),
        config.server.allow_any_origin,
    );

    let listener = tokio::net::TcpListener::bind(config.server.bind.as_str())
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!("Listening on {}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Print final summary
    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!(
            "fraud_scoring_service={level},tower_http={level}",
            level = logging.level
        ))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
