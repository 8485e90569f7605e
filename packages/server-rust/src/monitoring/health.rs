//! Node connectivity checks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use dashmap::DashMap;
use hookwatch_core::{ClockSource, HealthStatus};

use crate::logging::SharedLogger;
use crate::storage::StoreError;
use crate::traits::{MonitoringStore, NodeProbe};

/// Path appended to the node URL by [`HttpNodeProbe`].
pub const PING_PATH: &str = "/ping";

// ---------------------------------------------------------------------------
// HttpNodeProbe
// ---------------------------------------------------------------------------

/// Probes a node with `GET {node_url}/ping`; any 2xx counts as healthy.
#[derive(Clone, Default)]
pub struct HttpNodeProbe {
    client: reqwest::Client,
}

impl HttpNodeProbe {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NodeProbe for HttpNodeProbe {
    async fn probe(&self, node_url: &str, timeout: Duration) -> anyhow::Result<Duration> {
        let url = format!("{}{PING_PATH}", node_url.trim_end_matches('/'));
        let started = Instant::now();
        self.client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()?;
        Ok(started.elapsed())
    }
}

// ---------------------------------------------------------------------------
// HealthMonitor
// ---------------------------------------------------------------------------

/// Result of one [`HealthMonitor::check_health`] call.
#[derive(Debug, Clone)]
pub struct HealthCheckOutcome {
    pub status: HealthStatus,
    /// Set on the check whose failure count first reaches the configured
    /// maximum, so a failure streak raises at most one connection alert.
    pub threshold_reached: bool,
    /// Set when a healthy check ends a streak that had reached the maximum.
    pub recovered: bool,
}

pub struct HealthMonitor {
    probe: Arc<dyn NodeProbe>,
    store: Arc<dyn MonitoringStore>,
    clock: Arc<dyn ClockSource>,
    logger: SharedLogger,
    timeout: Duration,
    max_consecutive_failures: u32,
    failures: DashMap<String, u32>,
    last: ArcSwapOption<HealthStatus>,
}

impl HealthMonitor {
    #[must_use]
    pub fn new(
        probe: Arc<dyn NodeProbe>,
        store: Arc<dyn MonitoringStore>,
        clock: Arc<dyn ClockSource>,
        logger: SharedLogger,
        timeout: Duration,
        max_consecutive_failures: u32,
    ) -> Self {
        Self {
            probe,
            store,
            clock,
            logger,
            timeout,
            max_consecutive_failures,
            failures: DashMap::new(),
            last: ArcSwapOption::empty(),
        }
    }

    /// Probes `node_url`, updates the failure streak, and persists the result.
    ///
    /// A failed probe is reported as an unhealthy status, not an error.
    ///
    /// # Errors
    ///
    /// Returns the store error if the status could not be persisted.
    pub async fn check_health(&self, node_url: &str) -> Result<HealthCheckOutcome, StoreError> {
        let result = self.probe.probe(node_url, self.timeout).await;
        let checked_at_ms = self.clock.now();

        let (status, threshold_reached, recovered) = match result {
            Ok(latency) => {
                let previous = self.failures.insert(node_url.to_string(), 0).unwrap_or(0);
                let recovered = previous >= self.max_consecutive_failures;
                if recovered {
                    self.logger
                        .info(&format!("{node_url} reachable again after {previous} failed checks"));
                }
                let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                let status = HealthStatus {
                    node_url: node_url.to_string(),
                    is_healthy: true,
                    latency_ms: Some(latency_ms),
                    consecutive_failures: 0,
                    error: None,
                    checked_at_ms,
                };
                (status, false, recovered)
            }
            Err(e) => {
                let count = {
                    let mut entry = self.failures.entry(node_url.to_string()).or_insert(0);
                    *entry = entry.saturating_add(1);
                    *entry
                };
                let message = format!("{e:#}");
                self.logger.warn(&format!(
                    "health check for {node_url} failed ({count} in a row): {message}"
                ));
                let status = HealthStatus {
                    node_url: node_url.to_string(),
                    is_healthy: false,
                    latency_ms: None,
                    consecutive_failures: count,
                    error: Some(message),
                    checked_at_ms,
                };
                (status, count == self.max_consecutive_failures, false)
            }
        };

        self.last.store(Some(Arc::new(status.clone())));
        self.store.insert_health_status(&status).await?;

        Ok(HealthCheckOutcome {
            status,
            threshold_reached,
            recovered,
        })
    }

    #[must_use]
    pub fn consecutive_failures(&self, node_url: &str) -> u32 {
        self.failures.get(node_url).map_or(0, |v| *v)
    }

    #[must_use]
    pub fn last_status(&self) -> Option<HealthStatus> {
        self.last.load_full().map(|s| (*s).clone())
    }

    /// `true` when the most recent check succeeded.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        (*self.last.load()).as_ref().is_some_and(|s| s.is_healthy)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
