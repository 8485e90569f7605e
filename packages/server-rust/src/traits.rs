use std::time::Duration;

use async_trait::async_trait;
use hookwatch_core::{Alert, EventLog, EventStatus, HealthStatus, MetricsSnapshot};

use crate::storage::StoreError;

/// Fields changed when an event log moves to a new status.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLogUpdate {
    pub status: EventStatus,
    pub processing_time_ms: Option<f64>,
    pub error: Option<String>,
    pub updated_at_ms: u64,
}

/// Pluggable persistence for monitoring records.
/// Implementations: memory (default, tests); document stores plug in here.
#[async_trait]
pub trait MonitoringStore: Send + Sync {
    /// One-time initialization (connect, create indexes).
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Release resources and close connections.
    async fn close(&self) -> Result<(), StoreError>;

    /// Insert or replace the log for `log.event_id`.
    async fn upsert_event_log(&self, log: &EventLog) -> Result<(), StoreError>;

    /// Apply a status update. Returns `false` if no log has that id.
    async fn update_event_log(&self, event_id: &str, update: &EventLogUpdate)
        -> Result<bool, StoreError>;

    async fn get_event_log(&self, event_id: &str) -> Result<Option<EventLog>, StoreError>;

    /// Delete logs created before `cutoff_ms`. Returns the number removed.
    async fn delete_event_logs_before(&self, cutoff_ms: u64) -> Result<u64, StoreError>;

    async fn insert_metrics_snapshot(&self, snapshot: &MetricsSnapshot) -> Result<(), StoreError>;

    async fn latest_metrics_snapshot(&self) -> Result<Option<MetricsSnapshot>, StoreError>;

    /// Delete snapshots captured before `cutoff_ms`. Returns the number removed.
    async fn delete_metrics_snapshots_before(&self, cutoff_ms: u64) -> Result<u64, StoreError>;

    async fn insert_health_status(&self, status: &HealthStatus) -> Result<(), StoreError>;

    async fn latest_health_status(&self, node_url: &str)
        -> Result<Option<HealthStatus>, StoreError>;

    /// Delete health statuses checked before `cutoff_ms`. Returns the number removed.
    async fn delete_health_statuses_before(&self, cutoff_ms: u64) -> Result<u64, StoreError>;

    async fn insert_alert(&self, alert: &Alert) -> Result<(), StoreError>;

    /// Mark an alert resolved. Returns `false` if it is unknown or already resolved.
    async fn resolve_alert(&self, id: &str, resolved_at_ms: u64) -> Result<bool, StoreError>;

    async fn unresolved_alerts(&self) -> Result<Vec<Alert>, StoreError>;

    /// Delete resolved alerts whose resolution predates `cutoff_ms`.
    async fn delete_resolved_alerts_before(&self, cutoff_ms: u64) -> Result<u64, StoreError>;
}

/// Connectivity probe against a blockchain node.
#[async_trait]
pub trait NodeProbe: Send + Sync {
    /// Probe `node_url` and return the observed round-trip latency.
    async fn probe(&self, node_url: &str, timeout: Duration) -> anyhow::Result<Duration>;
}
