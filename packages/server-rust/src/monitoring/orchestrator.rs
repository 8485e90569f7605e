//! Wires the monitoring sub-services together and drives their schedules.
//!
//! Three independent periodic tasks run after [`MonitoringOrchestrator::initialize`]:
//! node health checks, metrics snapshots, and anomaly detection. Each
//! metrics tick also sweeps records past their retention window. Tick
//! failures are logged and never stop a schedule.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hookwatch_core::sample::DEFAULT_SAMPLE_CAPACITY;
use hookwatch_core::clock::retention_cutoff;
use hookwatch_core::{Alert, AlertKind, ClockSource, HealthStatus, MetricsSnapshot};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use super::alerts::AlertService;
use super::event_logger::EventLogger;
use super::health::{HealthCheckOutcome, HealthMonitor};
use super::metrics_tracker::MetricsTracker;
use crate::logging::SharedLogger;
use crate::service::config::{MonitorConfig, ANOMALY_CHECK_INTERVAL, RESOLVED_ALERT_RETENTION_DAYS};
use crate::service::worker::{PeriodicJob, PeriodicTask};
use crate::storage::StoreError;
use crate::traits::{MonitoringStore, NodeProbe};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("monitoring store failed: {0}")]
    Store(#[from] StoreError),

    #[error("monitoring has not been initialized")]
    NotInitialized,
}

/// Aggregated view returned by [`MonitoringOrchestrator::get_status`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringStatus {
    pub node_url: String,
    pub is_connected: bool,
    pub last_health_check: Option<HealthStatus>,
    pub metrics: MetricsSnapshot,
    pub unresolved_alerts: usize,
    pub active_tasks: Vec<&'static str>,
}

// ---------------------------------------------------------------------------
// Shared services
// ---------------------------------------------------------------------------

struct Services {
    config: MonitorConfig,
    store: Arc<dyn MonitoringStore>,
    event_logger: Arc<EventLogger>,
    metrics: Arc<MetricsTracker>,
    health: Arc<HealthMonitor>,
    alerts: Arc<AlertService>,
    clock: Arc<dyn ClockSource>,
    logger: SharedLogger,
}

impl Services {
    async fn run_health_check(&self) -> Result<HealthCheckOutcome, StoreError> {
        let outcome = self.health.check_health(&self.config.node_url).await?;
        if outcome.threshold_reached {
            self.alerts
                .create_connection_alert(
                    &self.config.node_url,
                    outcome.status.consecutive_failures,
                    outcome.status.error.as_deref(),
                )
                .await?;
        } else if outcome.recovered {
            self.alerts.resolve_kind(AlertKind::Connection).await?;
        }
        Ok(outcome)
    }

    async fn collect_metrics(&self) -> Result<MetricsSnapshot, StoreError> {
        let snapshot = self.metrics.snapshot(self.health.is_connected());
        self.store.insert_metrics_snapshot(&snapshot).await?;
        self.logger.debug(&format!(
            "metrics snapshot: {} received, {} processed, {} failed",
            snapshot.total_events, snapshot.processed_events, snapshot.failed_events
        ));
        Ok(snapshot)
    }

    /// Removes event logs, snapshots, and health statuses older than
    /// `log_retention_days`, and resolved alerts older than
    /// [`RESOLVED_ALERT_RETENTION_DAYS`]. Every step runs; the first error
    /// is returned.
    async fn sweep_retention(&self) -> Result<(), StoreError> {
        let days = self.config.log_retention_days;
        let cutoff = retention_cutoff(self.clock.now(), days);
        let mut first_error: Option<StoreError> = None;
        let mut record = |what: &str, result: Result<u64, StoreError>| match result {
            Ok(removed) if removed > 0 => {
                self.logger.info(&format!("removed {removed} {what}"));
            }
            Ok(_) => {}
            Err(e) => {
                self.logger.error(&format!("{what} cleanup failed: {e}"));
                first_error.get_or_insert(e);
            }
        };

        record("event logs", self.event_logger.purge_older_than(days).await);
        record(
            "metrics snapshots",
            self.store.delete_metrics_snapshots_before(cutoff).await,
        );
        record(
            "health statuses",
            self.store.delete_health_statuses_before(cutoff).await,
        );
        record(
            "resolved alerts",
            self.alerts
                .clear_resolved_older_than(RESOLVED_ALERT_RETENTION_DAYS)
                .await,
        );

        first_error.map_or(Ok(()), Err)
    }

    async fn check_anomalies(&self) -> Result<Vec<Alert>, StoreError> {
        self.alerts
            .check_thresholds(
                self.metrics.average_processing_time_ms(),
                self.metrics.failure_rate_percent(),
            )
            .await
    }
}

struct HealthCheckJob(Arc<Services>);

#[async_trait]
impl PeriodicJob for HealthCheckJob {
    fn name(&self) -> &'static str {
        "health-check"
    }

    async fn tick(&self) -> anyhow::Result<()> {
        self.0.run_health_check().await?;
        Ok(())
    }
}

struct MetricsJob(Arc<Services>);

#[async_trait]
impl PeriodicJob for MetricsJob {
    fn name(&self) -> &'static str {
        "metrics-snapshot"
    }

    async fn tick(&self) -> anyhow::Result<()> {
        self.0.collect_metrics().await?;
        self.0.sweep_retention().await?;
        Ok(())
    }
}

struct AnomalyJob(Arc<Services>);

#[async_trait]
impl PeriodicJob for AnomalyJob {
    fn name(&self) -> &'static str {
        "anomaly-check"
    }

    async fn tick(&self) -> anyhow::Result<()> {
        self.0.check_anomalies().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MonitoringOrchestrator
// ---------------------------------------------------------------------------

pub struct MonitoringOrchestrator {
    services: Arc<Services>,
    tasks: Mutex<Vec<PeriodicTask>>,
    initialized: AtomicBool,
}

impl MonitoringOrchestrator {
    #[must_use]
    pub fn new(
        config: MonitorConfig,
        store: Arc<dyn MonitoringStore>,
        probe: Arc<dyn NodeProbe>,
        clock: Arc<dyn ClockSource>,
        logger: SharedLogger,
    ) -> Self {
        let event_logger = Arc::new(EventLogger::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&logger),
        ));
        let metrics = Arc::new(MetricsTracker::new(
            DEFAULT_SAMPLE_CAPACITY,
            Arc::clone(&clock),
        ));
        let health = Arc::new(HealthMonitor::new(
            probe,
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&logger),
            config.health_check_timeout,
            config.thresholds.max_consecutive_failures,
        ));
        let alerts = Arc::new(AlertService::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&logger),
            config.thresholds.clone(),
        ));

        Self {
            services: Arc::new(Services {
                config,
                store,
                event_logger,
                metrics,
                health,
                alerts,
                clock,
                logger,
            }),
            tasks: Mutex::new(Vec::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Initializes the store, runs one health check, and starts the
    /// periodic tasks. Calling it again while initialized does nothing.
    ///
    /// # Errors
    ///
    /// Fails fast if the store cannot be initialized or the first health
    /// status cannot be persisted; no task is started in that case.
    pub async fn initialize(&self) -> Result<(), MonitorError> {
        if self.initialized.load(Ordering::SeqCst) {
            self.services.logger.debug("monitoring already initialized");
            return Ok(());
        }
        let services = &self.services;

        if let Err(e) = services.store.initialize().await {
            services
                .logger
                .error(&format!("monitoring store initialization failed: {e}"));
            return Err(e.into());
        }
        if let Err(e) = services.run_health_check().await {
            services.logger.error(&format!("initial health check failed: {e}"));
            return Err(e.into());
        }

        let jobs: [(Arc<dyn PeriodicJob>, _); 3] = [
            (
                Arc::new(HealthCheckJob(Arc::clone(services))),
                services.config.health_check_interval,
            ),
            (
                Arc::new(MetricsJob(Arc::clone(services))),
                services.config.metrics_interval,
            ),
            (
                Arc::new(AnomalyJob(Arc::clone(services))),
                ANOMALY_CHECK_INTERVAL,
            ),
        ];
        let started: Vec<PeriodicTask> = jobs
            .into_iter()
            .map(|(job, period)| PeriodicTask::start(job, period, Arc::clone(&services.logger)))
            .collect();
        *self.tasks.lock() = started;

        self.initialized.store(true, Ordering::SeqCst);
        services.logger.info(&format!(
            "monitoring started for {}",
            services.config.node_url
        ));
        Ok(())
    }

    /// Stops every periodic task, sweeps expired records, and closes the
    /// store. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns the first cleanup failure. The store is closed regardless.
    pub async fn shutdown(&self) -> Result<(), MonitorError> {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for mut task in tasks {
            task.stop().await;
        }
        if !self.initialized.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let services = &self.services;
        let mut first_error = services.sweep_retention().await.err();
        if let Err(e) = services.store.close().await {
            services.logger.error(&format!("closing monitoring store failed: {e}"));
            first_error.get_or_insert(e);
        }

        services.logger.info("monitoring stopped");
        first_error.map_or(Ok(()), |e| Err(e.into()))
    }

    /// # Errors
    ///
    /// Returns [`MonitorError::NotInitialized`] before `initialize`, or the
    /// store error if alerts cannot be read.
    pub async fn get_status(&self) -> Result<MonitoringStatus, MonitorError> {
        if !self.is_initialized() {
            return Err(MonitorError::NotInitialized);
        }
        let services = &self.services;
        let is_connected = services.health.is_connected();
        Ok(MonitoringStatus {
            node_url: services.config.node_url.clone(),
            is_connected,
            last_health_check: services.health.last_status(),
            metrics: services.metrics.snapshot(is_connected),
            unresolved_alerts: services.alerts.unresolved_count().await?,
            active_tasks: self.active_tasks(),
        })
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Names of the periodic tasks that are still running.
    #[must_use]
    pub fn active_tasks(&self) -> Vec<&'static str> {
        self.tasks
            .lock()
            .iter()
            .filter(|t| t.is_running())
            .map(PeriodicTask::name)
            .collect()
    }

    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.services.config
    }

    #[must_use]
    pub fn event_logger(&self) -> Arc<EventLogger> {
        Arc::clone(&self.services.event_logger)
    }

    #[must_use]
    pub fn metrics(&self) -> Arc<MetricsTracker> {
        Arc::clone(&self.services.metrics)
    }

    #[must_use]
    pub fn health(&self) -> Arc<HealthMonitor> {
        Arc::clone(&self.services.health)
    }

    #[must_use]
    pub fn alerts(&self) -> Arc<AlertService> {
        Arc::clone(&self.services.alerts)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
