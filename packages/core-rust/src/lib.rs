//! `hookwatch` Core: chain events, operations, route filters, and monitoring records.

pub mod chainhook;
pub mod clock;
pub mod error_log;
pub mod event;
pub mod operation;
pub mod records;
pub mod sample;

pub use chainhook::{ChainhookPayload, PayloadError};
pub use clock::{ClockSource, ManualClock, SystemClock};
pub use error_log::{ErrorCategory, ErrorLog, ErrorRecord};
pub use event::{ChainEvent, QueuedEvent};
pub use operation::{Operation, OperationFilter};
pub use records::{
    Alert, AlertKind, AlertSeverity, EventLog, EventStatus, HealthStatus, MetricsSnapshot,
};
pub use sample::SampleWindow;
