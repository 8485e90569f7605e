//! Alert creation, anomaly thresholds, and resolution.

use std::sync::Arc;

use hookwatch_core::clock::retention_cutoff;
use hookwatch_core::{Alert, AlertKind, AlertSeverity, ClockSource};
use serde_json::{json, Value};

use crate::logging::SharedLogger;
use crate::service::config::AlertThresholds;
use crate::storage::StoreError;
use crate::traits::MonitoringStore;

pub struct AlertService {
    store: Arc<dyn MonitoringStore>,
    clock: Arc<dyn ClockSource>,
    logger: SharedLogger,
    thresholds: AlertThresholds,
}

impl AlertService {
    #[must_use]
    pub fn new(
        store: Arc<dyn MonitoringStore>,
        clock: Arc<dyn ClockSource>,
        logger: SharedLogger,
        thresholds: AlertThresholds,
    ) -> Self {
        Self {
            store,
            clock,
            logger,
            thresholds,
        }
    }

    #[must_use]
    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Persists a new unresolved alert and logs it.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn create_alert(
        &self,
        kind: AlertKind,
        severity: AlertSeverity,
        message: impl Into<String>,
        metadata: Value,
    ) -> Result<Alert, StoreError> {
        let alert = Alert {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            severity,
            message: message.into(),
            metadata,
            resolved: false,
            resolved_at_ms: None,
            created_at_ms: self.clock.now(),
        };
        self.store.insert_alert(&alert).await?;

        let line = format!("[{severity}] {kind} alert: {}", alert.message);
        if severity >= AlertSeverity::High {
            self.logger.error(&line);
        } else {
            self.logger.warn(&line);
        }
        Ok(alert)
    }

    /// Raises a critical alert for a node that failed too many health checks.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn create_connection_alert(
        &self,
        node_url: &str,
        consecutive_failures: u32,
        last_error: Option<&str>,
    ) -> Result<Alert, StoreError> {
        self.create_alert(
            AlertKind::Connection,
            AlertSeverity::Critical,
            format!("{node_url} failed {consecutive_failures} consecutive health checks"),
            json!({
                "nodeUrl": node_url,
                "consecutiveFailures": consecutive_failures,
                "lastError": last_error,
            }),
        )
        .await
    }

    /// Compares current metrics with the thresholds and raises performance or
    /// failure-rate alerts. A kind that already has an unresolved alert is
    /// skipped. Returns the alerts created by this call.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn check_thresholds(
        &self,
        average_processing_time_ms: f64,
        failure_rate_percent: f64,
    ) -> Result<Vec<Alert>, StoreError> {
        let open = self.store.unresolved_alerts().await?;
        let is_open = |kind: AlertKind| open.iter().any(|a| a.kind == kind);
        let mut created = Vec::new();

        #[allow(clippy::cast_precision_loss)]
        let performance_limit = self.thresholds.performance_ms as f64;
        if average_processing_time_ms > performance_limit && !is_open(AlertKind::Performance) {
            created.push(
                self.create_alert(
                    AlertKind::Performance,
                    AlertSeverity::High,
                    format!(
                        "average processing time {average_processing_time_ms}ms exceeds {}ms",
                        self.thresholds.performance_ms
                    ),
                    json!({
                        "averageProcessingTimeMs": average_processing_time_ms,
                        "thresholdMs": self.thresholds.performance_ms,
                    }),
                )
                .await?,
            );
        }

        let rate_limit = self.thresholds.failure_rate_percent;
        if failure_rate_percent > rate_limit && !is_open(AlertKind::FailureRate) {
            let severity = if failure_rate_percent > rate_limit * 2.0 {
                AlertSeverity::Critical
            } else {
                AlertSeverity::High
            };
            created.push(
                self.create_alert(
                    AlertKind::FailureRate,
                    severity,
                    format!("failure rate {failure_rate_percent}% exceeds {rate_limit}%"),
                    json!({
                        "failureRatePercent": failure_rate_percent,
                        "thresholdPercent": rate_limit,
                    }),
                )
                .await?,
            );
        }

        Ok(created)
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn resolve_alert(&self, id: &str) -> Result<bool, StoreError> {
        let resolved = self.store.resolve_alert(id, self.clock.now()).await?;
        if resolved {
            self.logger.info(&format!("alert {id} resolved"));
        }
        Ok(resolved)
    }

    /// Resolves every open alert of `kind`. Returns how many were resolved.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn resolve_kind(&self, kind: AlertKind) -> Result<usize, StoreError> {
        let mut resolved = 0;
        for alert in self.store.unresolved_alerts().await? {
            if alert.kind == kind && self.resolve_alert(&alert.id).await? {
                resolved += 1;
            }
        }
        Ok(resolved)
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn unresolved_alerts(&self) -> Result<Vec<Alert>, StoreError> {
        self.store.unresolved_alerts().await
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn unresolved_count(&self) -> Result<usize, StoreError> {
        Ok(self.store.unresolved_alerts().await?.len())
    }

    /// Deletes alerts resolved more than `days` days ago.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn clear_resolved_older_than(&self, days: u32) -> Result<u64, StoreError> {
        let cutoff = retention_cutoff(self.clock.now(), days);
        self.store.delete_resolved_alerts_before(cutoff).await
    }
}
