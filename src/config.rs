//! Configuration management for the scoring service

use anyhow::{Context, Result};
use config::{Config, Environment, File, Source};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Prefix of environment overrides, e.g. `FRAUD_SCORING__SERVER__BIND`
pub const ENV_PREFIX: &str = "FRAUD_SCORING";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
    /// Allow browser calls from any origin (the dashboard is served elsewhere)
    pub allow_any_origin: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:81".to_string(),
            allow_any_origin: true,
        }
    }
}

/// Trained artifact locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// ONNX classifier
    pub model_path: PathBuf,
    /// JSON scaler parameters
    pub scaler_path: PathBuf,
    /// Class labels in probability order, used when the model has no label output
    pub classes: Vec<i64>,
    /// Number of threads for ONNX inference (default: 1)
    pub onnx_threads: usize,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("voting_clf_soft.onnx"),
            scaler_path: PathBuf::from("scaler.json"),
            classes: vec![0, 1],
            onnx_threads: 1,
        }
    }
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Seconds between logged summaries, 0 disables them
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file if present, then the environment
    pub fn load() -> Result<Self> {
        Self::build(File::from(Path::new(DEFAULT_CONFIG_PATH)).required(false))
    }

    /// Load configuration from a specific path, then the environment
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(File::from(path.as_ref()))
    }

    fn build<S>(file: S) -> Result<Self>
    where
        S: Source + Send + Sync + 'static,
    {
        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
