//! Persistence for monitoring records.
//!
//! The [`MonitoringStore`](crate::traits::MonitoringStore) trait is the
//! seam; [`MemoryStore`] is the in-process implementation used by default
//! and in tests.

mod memory;

pub use memory::{MemoryStore, DEFAULT_HISTORY_LIMIT};

/// Errors returned by monitoring store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store is not initialized")]
    NotInitialized,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
