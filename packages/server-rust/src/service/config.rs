//! Configuration for the batcher and the monitoring services.
//!
//! Values are validated once at startup; components themselves trust the
//! configuration they are handed.

use std::time::Duration;

/// Minimum interval between node health checks.
pub const MIN_HEALTH_CHECK_INTERVAL: Duration = Duration::from_millis(5_000);
/// Minimum interval between metrics snapshots.
pub const MIN_METRICS_INTERVAL: Duration = Duration::from_millis(10_000);
/// Smallest accepted performance alert threshold.
pub const MIN_PERFORMANCE_THRESHOLD_MS: u64 = 100;
/// Anomaly detection runs on a fixed cadence.
pub const ANOMALY_CHECK_INTERVAL: Duration = Duration::from_secs(60);
/// Resolved alerts older than this many days are purged at shutdown.
pub const RESOLVED_ALERT_RETENTION_DAYS: u32 = 7;

/// Errors raised while validating configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("node URL must start with http:// or https://, got {url:?}")]
    InvalidNodeUrl { url: String },
    #[error("health check interval must be at least 5000ms, got {ms}ms")]
    HealthCheckIntervalTooShort { ms: u128 },
    #[error("metrics interval must be at least 10000ms, got {ms}ms")]
    MetricsIntervalTooShort { ms: u128 },
    #[error("log retention must be at least one day")]
    ZeroLogRetention,
    #[error("performance threshold must be at least 100ms, got {ms}ms")]
    PerformanceThresholdTooLow { ms: u64 },
    #[error("failure rate threshold must be between 1 and 100 percent, got {percent}")]
    FailureRateOutOfRange { percent: f64 },
    #[error("max consecutive failures must be at least 1")]
    ZeroConsecutiveFailures,
    #[error("batch size must be at least 1")]
    ZeroBatchSize,
    #[error("max queue size {max_queue_size} is smaller than batch size {batch_size}")]
    QueueSmallerThanBatch {
        max_queue_size: usize,
        batch_size: usize,
    },
}

// ---------------------------------------------------------------------------
// BatcherConfig
// ---------------------------------------------------------------------------

/// Sizing and timing for the event batcher.
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Maximum events per batch; reaching it triggers an immediate flush.
    pub batch_size: usize,
    /// How long a partial batch may wait before it is flushed.
    pub batch_timeout: Duration,
    /// Hard bound on queued events. Overflow drops the oldest 20%.
    pub max_queue_size: usize,
    /// Number of processing-time samples kept for the rolling average.
    pub sample_capacity: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_timeout: Duration::from_millis(5_000),
            max_queue_size: 10_000,
            sample_capacity: 100,
        }
    }
}

impl BatcherConfig {
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.max_queue_size < self.batch_size {
            return Err(ConfigError::QueueSmallerThanBatch {
                max_queue_size: self.max_queue_size,
                batch_size: self.batch_size,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MonitorConfig
// ---------------------------------------------------------------------------

/// Thresholds consulted by anomaly detection and health monitoring.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertThresholds {
    /// Average processing time above which a performance alert is raised.
    pub performance_ms: u64,
    /// Failure percentage above which a failure-rate alert is raised.
    pub failure_rate_percent: f64,
    /// Consecutive failed health checks before a connection alert.
    pub max_consecutive_failures: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            performance_ms: 1_000,
            failure_rate_percent: 10.0,
            max_consecutive_failures: 3,
        }
    }
}

/// Settings for the monitoring orchestrator and its sub-services.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Base URL of the Chainhook node whose health is probed.
    pub node_url: String,
    pub health_check_interval: Duration,
    pub health_check_timeout: Duration,
    pub metrics_interval: Duration,
    /// Event logs older than this are purged at shutdown.
    pub log_retention_days: u32,
    pub thresholds: AlertThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            node_url: "http://localhost:20456".to_string(),
            health_check_interval: Duration::from_secs(30),
            health_check_timeout: Duration::from_secs(5),
            metrics_interval: Duration::from_secs(60),
            log_retention_days: 30,
            thresholds: AlertThresholds::default(),
        }
    }
}

impl MonitorConfig {
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.node_url.starts_with("http://") || self.node_url.starts_with("https://")) {
            return Err(ConfigError::InvalidNodeUrl {
                url: self.node_url.clone(),
            });
        }
        if self.health_check_interval < MIN_HEALTH_CHECK_INTERVAL {
            return Err(ConfigError::HealthCheckIntervalTooShort {
                ms: self.health_check_interval.as_millis(),
            });
        }
        if self.metrics_interval < MIN_METRICS_INTERVAL {
            return Err(ConfigError::MetricsIntervalTooShort {
                ms: self.metrics_interval.as_millis(),
            });
        }
        if self.log_retention_days == 0 {
            return Err(ConfigError::ZeroLogRetention);
        }
        if self.thresholds.performance_ms < MIN_PERFORMANCE_THRESHOLD_MS {
            return Err(ConfigError::PerformanceThresholdTooLow {
                ms: self.thresholds.performance_ms,
            });
        }
        let rate = self.thresholds.failure_rate_percent;
        if !(1.0..=100.0).contains(&rate) {
            return Err(ConfigError::FailureRateOutOfRange { percent: rate });
        }
        if self.thresholds.max_consecutive_failures == 0 {
            return Err(ConfigError::ZeroConsecutiveFailures);
        }
        Ok(())
    }
}
