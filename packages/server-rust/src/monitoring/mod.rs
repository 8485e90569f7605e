//! Event logging, metrics, node health, and alerting.

pub mod alerts;
pub mod event_logger;
pub mod health;
pub mod metrics_tracker;
pub mod orchestrator;

pub use alerts::AlertService;
pub use event_logger::EventLogger;
pub use health::{HealthCheckOutcome, HealthMonitor, HttpNodeProbe};
pub use metrics_tracker::MetricsTracker;
pub use orchestrator::{MonitorError, MonitoringOrchestrator, MonitoringStatus};
