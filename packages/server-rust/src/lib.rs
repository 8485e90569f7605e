//! `hookwatch` Server: Chainhook webhook intake, event batching, operation
//! routing, and node/pipeline monitoring.

pub mod cli;
pub mod logging;
pub mod monitoring;
pub mod network;
pub mod service;
pub mod storage;
pub mod traits;

pub use logging::{Logger, SharedLogger, TracingLogger};
pub use monitoring::{MonitorError, MonitoringOrchestrator};
pub use service::batcher::EventBatcher;
pub use service::pipeline::ChainhookPipeline;
pub use service::router::OperationRouter;
pub use traits::{MonitoringStore, NodeProbe};
