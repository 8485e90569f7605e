//! axum handlers and the state they share.

pub mod health;
pub mod ingest;
pub mod status;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use ingest::chainhook_handler;
pub use status::status_handler;

use std::sync::Arc;
use std::time::Instant;

use super::{NetworkConfig, ShutdownController};
use crate::monitoring::MonitoringOrchestrator;
use crate::service::pipeline::ChainhookPipeline;

/// Cloned into every handler; all fields are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    pub pipeline: Arc<ChainhookPipeline>,
    pub monitor: Arc<MonitoringOrchestrator>,
    pub start_time: Instant,
}
