//! Command-line and environment configuration for the `hookwatch` binary.

use std::time::Duration;

use clap::Parser;

use crate::logging::LogFormat;
use crate::network::NetworkConfig;
use crate::service::config::{AlertThresholds, BatcherConfig, ConfigError, MonitorConfig};

#[derive(Debug, Clone, Parser)]
#[command(name = "hookwatch")]
#[command(about = "Chainhook webhook receiver with batching, routing, and monitoring")]
pub struct Cli {
    #[arg(long, env = "HOOKWATCH_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "HOOKWATCH_PORT", default_value_t = 3100)]
    pub port: u16,

    /// Bearer token required on `POST /chainhook`.
    #[arg(long, env = "HOOKWATCH_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    #[arg(long, env = "HOOKWATCH_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    pub cors_origins: Vec<String>,

    #[arg(long, env = "HOOKWATCH_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[arg(long, env = "HOOKWATCH_BATCH_SIZE", default_value_t = 10)]
    pub batch_size: usize,

    #[arg(long, env = "HOOKWATCH_BATCH_TIMEOUT_MS", default_value_t = 5_000)]
    pub batch_timeout_ms: u64,

    #[arg(long, env = "HOOKWATCH_MAX_QUEUE_SIZE", default_value_t = 10_000)]
    pub max_queue_size: usize,

    #[arg(long, env = "HOOKWATCH_NODE_URL", default_value = "http://localhost:20456")]
    pub node_url: String,

    #[arg(long, env = "HOOKWATCH_HEALTH_CHECK_INTERVAL_MS", default_value_t = 30_000)]
    pub health_check_interval_ms: u64,

    #[arg(long, env = "HOOKWATCH_HEALTH_CHECK_TIMEOUT_MS", default_value_t = 5_000)]
    pub health_check_timeout_ms: u64,

    #[arg(long, env = "HOOKWATCH_METRICS_INTERVAL_MS", default_value_t = 60_000)]
    pub metrics_interval_ms: u64,

    #[arg(long, env = "HOOKWATCH_LOG_RETENTION_DAYS", default_value_t = 30)]
    pub log_retention_days: u32,

    #[arg(long, env = "HOOKWATCH_PERFORMANCE_THRESHOLD_MS", default_value_t = 1_000)]
    pub performance_threshold_ms: u64,

    #[arg(long, env = "HOOKWATCH_FAILURE_RATE_THRESHOLD", default_value_t = 10.0)]
    pub failure_rate_threshold: f64,

    #[arg(long, env = "HOOKWATCH_MAX_CONSECUTIVE_FAILURES", default_value_t = 3)]
    pub max_consecutive_failures: u32,
}

/// Validated settings for every component.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub batcher: BatcherConfig,
    pub monitor: MonitorConfig,
    pub log_format: LogFormat,
}

impl Cli {
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found in the batcher or monitor
    /// settings.
    pub fn into_config(self) -> Result<AppConfig, ConfigError> {
        let batcher = BatcherConfig {
            batch_size: self.batch_size,
            batch_timeout: Duration::from_millis(self.batch_timeout_ms),
            max_queue_size: self.max_queue_size,
            ..BatcherConfig::default()
        };
        batcher.validate()?;

        let monitor = MonitorConfig {
            node_url: self.node_url,
            health_check_interval: Duration::from_millis(self.health_check_interval_ms),
            health_check_timeout: Duration::from_millis(self.health_check_timeout_ms),
            metrics_interval: Duration::from_millis(self.metrics_interval_ms),
            log_retention_days: self.log_retention_days,
            thresholds: AlertThresholds {
                performance_ms: self.performance_threshold_ms,
                failure_rate_percent: self.failure_rate_threshold,
                max_consecutive_failures: self.max_consecutive_failures,
            },
        };
        monitor.validate()?;

        let network = NetworkConfig {
            host: self.host,
            port: self.port,
            cors_origins: self.cors_origins,
            auth_token: self.auth_token.filter(|t| !t.is_empty()),
            ..NetworkConfig::default()
        };

        Ok(AppConfig {
            network,
            batcher,
            monitor,
            log_format: self.log_format,
        })
    }
}
