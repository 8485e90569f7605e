//! Persists the lifecycle of each chain event (`received` through
//! `completed`/`failed`).

use std::sync::Arc;

use hookwatch_core::clock::retention_cutoff;
use hookwatch_core::{ChainEvent, ClockSource, EventLog, EventStatus};

use crate::logging::SharedLogger;
use crate::storage::StoreError;
use crate::traits::{EventLogUpdate, MonitoringStore};

pub struct EventLogger {
    store: Arc<dyn MonitoringStore>,
    clock: Arc<dyn ClockSource>,
    logger: SharedLogger,
}

impl EventLogger {
    #[must_use]
    pub fn new(
        store: Arc<dyn MonitoringStore>,
        clock: Arc<dyn ClockSource>,
        logger: SharedLogger,
    ) -> Self {
        Self {
            store,
            clock,
            logger,
        }
    }

    /// Records a newly received event.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn log_received(&self, event: &ChainEvent) -> Result<(), StoreError> {
        let now = self.clock.now();
        let log = EventLog {
            event_id: event.event_id.clone(),
            event_type: event.event_type().to_string(),
            status: EventStatus::Received,
            block_height: Some(event.block_height),
            tx_id: Some(event.tx_id.clone()),
            processing_time_ms: None,
            error: None,
            created_at_ms: now,
            updated_at_ms: now,
        };
        self.store.upsert_event_log(&log).await
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn mark_processing(&self, event_id: &str) -> Result<bool, StoreError> {
        self.transition(event_id, EventStatus::Processing, None, None)
            .await
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn mark_completed(
        &self,
        event_id: &str,
        processing_time_ms: f64,
    ) -> Result<bool, StoreError> {
        self.transition(event_id, EventStatus::Completed, Some(processing_time_ms), None)
            .await
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn mark_failed(
        &self,
        event_id: &str,
        error: &str,
        processing_time_ms: Option<f64>,
    ) -> Result<bool, StoreError> {
        self.transition(
            event_id,
            EventStatus::Failed,
            processing_time_ms,
            Some(error.to_string()),
        )
        .await
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn get(&self, event_id: &str) -> Result<Option<EventLog>, StoreError> {
        self.store.get_event_log(event_id).await
    }

    /// Deletes logs created more than `days` days ago. Returns how many.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn purge_older_than(&self, days: u32) -> Result<u64, StoreError> {
        let cutoff = retention_cutoff(self.clock.now(), days);
        let removed = self.store.delete_event_logs_before(cutoff).await?;
        if removed > 0 {
            self.logger
                .info(&format!("purged {removed} event logs older than {days} days"));
        }
        Ok(removed)
    }

    async fn transition(
        &self,
        event_id: &str,
        status: EventStatus,
        processing_time_ms: Option<f64>,
        error: Option<String>,
    ) -> Result<bool, StoreError> {
        let update = EventLogUpdate {
            status,
            processing_time_ms,
            error,
            updated_at_ms: self.clock.now(),
        };
        let found = self.store.update_event_log(event_id, &update).await?;
        if !found {
            self.logger
                .warn(&format!("no event log for {event_id}, cannot mark {status}"));
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use hookwatch_core::clock::MILLIS_PER_DAY;
    use hookwatch_core::{ManualClock, Operation};
    use serde_json::json;

    use super::*;
    use crate::logging::{LogLevel, MemoryLogger};
    use crate::storage::MemoryStore;

    fn chain_event(id: &str) -> ChainEvent {
        ChainEvent {
            event_id: id.to_string(),
            block_height: 42,
            block_hash: "0xb".to_string(),
            tx_id: id.to_string(),
            chainhook_uuid: None,
            operations: vec![Operation::new(json!({ "type": "badge_mint" }))],
        }
    }

    async fn setup() -> (EventLogger, Arc<ManualClock>, Arc<MemoryLogger>) {
        let store = Arc::new(MemoryStore::new());
        store.initialize().await.unwrap();
        let clock = Arc::new(ManualClock::new(10 * MILLIS_PER_DAY));
        let logger = MemoryLogger::new();
        (
            EventLogger::new(store, clock.clone(), logger.clone()),
            clock,
            logger,
        )
    }

    #[tokio::test]
    async fn lifecycle_reaches_completed() {
        let (events, clock, _) = setup().await;
        events.log_received(&chain_event("0x1")).await.unwrap();

        let log = events.get("0x1").await.unwrap().unwrap();
        assert_eq!(log.status, EventStatus::Received);
        assert_eq!(log.event_type, "badge_mint");

        clock.advance(5);
        assert!(events.mark_processing("0x1").await.unwrap());
        assert!(events.mark_completed("0x1", 3.25).await.unwrap());

        let log = events.get("0x1").await.unwrap().unwrap();
        assert_eq!(log.status, EventStatus::Completed);
        assert_eq!(log.processing_time_ms, Some(3.25));
        assert_eq!(log.updated_at_ms, log.created_at_ms + 5);
    }

    #[tokio::test]
    async fn failure_records_error() {
        let (events, _, _) = setup().await;
        events.log_received(&chain_event("0x2")).await.unwrap();
        events.mark_failed("0x2", "no route", None).await.unwrap();

        let log = events.get("0x2").await.unwrap().unwrap();
        assert_eq!(log.status, EventStatus::Failed);
        assert_eq!(log.error.as_deref(), Some("no route"));
    }

    #[tokio::test]
    async fn unknown_event_is_reported() {
        let (events, _, logger) = setup().await;
        assert!(!events.mark_processing("0xmissing").await.unwrap());
        assert!(logger.contains(LogLevel::Warn, "0xmissing"));
    }

    #[tokio::test]
    async fn purge_respects_retention_days() {
        let (events, clock, _) = setup().await;
        events.log_received(&chain_event("old")).await.unwrap();
        clock.advance(5 * MILLIS_PER_DAY);
        events.log_received(&chain_event("recent")).await.unwrap();

        clock.advance(MILLIS_PER_DAY);
        assert_eq!(events.purge_older_than(3).await.unwrap(), 1);
        assert!(events.get("old").await.unwrap().is_none());
        assert!(events.get("recent").await.unwrap().is_some());
    }
}
