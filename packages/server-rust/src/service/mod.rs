//! Event processing: batching, routing, ingestion, and background tasks.
//!
//! 1. **Pipeline** (`pipeline`): Chainhook payload -> `ChainEvent`s -> batcher
//! 2. **Batcher** (`batcher`): bounded queue flushed by size or timeout
//! 3. **Router** (`router`): first-match dispatch of operations to handlers
//! 4. **Workers** (`worker`): individually cancellable periodic jobs

pub mod batcher;
pub mod config;
pub mod pipeline;
pub mod router;
pub mod worker;

pub use batcher::{BatchHandler, BatchMetrics, EventBatcher};
pub use config::{AlertThresholds, BatcherConfig, ConfigError, MonitorConfig};
pub use pipeline::{ChainhookPipeline, IngestSummary};
pub use router::{OperationHandler, OperationRouter, RouteContext, RouteMetrics};
pub use worker::{PeriodicJob, PeriodicTask};
