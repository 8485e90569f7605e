//! Persisted monitoring records: event logs, metrics snapshots, health
//! checks, and alerts.
//!
//! Enumerated fields serialize to the lowercase names used by the document
//! store (`received`, `critical`, `failure_rate`, ...).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of a logged chain event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Received,
    Processing,
    Completed,
    Failed,
}

impl EventStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// `true` once the event reached a final state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What condition raised an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Node health checks failed repeatedly.
    Connection,
    /// Average processing time exceeded the configured threshold.
    Performance,
    /// Failure rate exceeded the configured percentage.
    FailureRate,
    /// A processing error the host chose to escalate.
    Processing,
}

impl AlertKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Performance => "performance",
            Self::FailureRate => "failure_rate",
            Self::Processing => "processing",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logged chain event and its processing outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    pub event_id: String,
    pub event_type: String,
    pub status: EventStatus,
    pub block_height: Option<u64>,
    pub tx_id: Option<String>,
    pub processing_time_ms: Option<f64>,
    pub error: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

/// Point-in-time view of processing metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_events: u64,
    pub processed_events: u64,
    pub failed_events: u64,
    pub average_processing_time_ms: f64,
    pub failure_rate_percent: f64,
    pub is_connected: bool,
    pub events_by_type: BTreeMap<String, u64>,
    pub captured_at_ms: u64,
}

/// Result of a single node connectivity check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub node_url: String,
    pub is_healthy: bool,
    pub latency_ms: Option<u64>,
    pub consecutive_failures: u32,
    pub error: Option<String>,
    pub checked_at_ms: u64,
}

/// An anomaly or connectivity notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    #[serde(default)]
    pub metadata: Value,
    pub resolved: bool,
    pub resolved_at_ms: Option<u64>,
    pub created_at_ms: u64,
}

impl Alert {
    /// Marks the alert resolved at `now`. Returns `false` if it already was.
    pub fn resolve(&mut self, now: u64) -> bool {
        if self.resolved {
            return false;
        }
        self.resolved = true;
        self.resolved_at_ms = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(serde_json::to_value(EventStatus::Processing).unwrap(), json!("processing"));
        assert_eq!(serde_json::to_value(AlertSeverity::Critical).unwrap(), json!("critical"));
        assert_eq!(serde_json::to_value(AlertKind::FailureRate).unwrap(), json!("failure_rate"));
    }

    #[test]
    fn severity_orders_by_escalation() {
        assert!(AlertSeverity::Low < AlertSeverity::Medium);
        assert!(AlertSeverity::High < AlertSeverity::Critical);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!EventStatus::Received.is_terminal());
        assert!(!EventStatus::Processing.is_terminal());
        assert!(EventStatus::Completed.is_terminal());
        assert!(EventStatus::Failed.is_terminal());
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut alert = Alert {
            id: "a1".to_string(),
            kind: AlertKind::Connection,
            severity: AlertSeverity::Critical,
            message: "node down".to_string(),
            metadata: Value::Null,
            resolved: false,
            resolved_at_ms: None,
            created_at_ms: 10,
        };
        assert!(alert.resolve(20));
        assert!(!alert.resolve(30));
        assert_eq!(alert.resolved_at_ms, Some(20));
    }
}
