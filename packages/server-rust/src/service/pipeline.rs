//! Chainhook ingestion: payload → event logs → batcher → router.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use hookwatch_core::{
    ChainEvent, ChainhookPayload, ClockSource, ErrorCategory, ErrorLog, ErrorRecord, PayloadError,
    QueuedEvent,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use tokio::time::Instant;

use super::batcher::{BatchHandler, EventBatcher};
use super::router::{OperationRouter, RouteContext};
use crate::logging::SharedLogger;
use crate::monitoring::{EventLogger, MetricsTracker, MonitoringOrchestrator};

/// Outcome of one [`ChainhookPipeline::ingest`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Events enqueued for processing.
    pub accepted: usize,
    /// Events the batcher refused.
    pub rejected: usize,
    /// Transactions inside rolled-back blocks. Counted, never routed.
    pub rollbacks: usize,
}

type SharedErrorLog = Arc<Mutex<ErrorLog>>;

// ---------------------------------------------------------------------------
// Batch handler
// ---------------------------------------------------------------------------

/// Routes every operation of each batched event and records the outcome.
struct RoutingBatchHandler {
    router: Arc<OperationRouter>,
    event_logger: Arc<EventLogger>,
    metrics: Arc<MetricsTracker>,
    errors: SharedErrorLog,
    clock: Arc<dyn ClockSource>,
    logger: SharedLogger,
}

impl RoutingBatchHandler {
    async fn process_event(&self, event: &ChainEvent) {
        if let Err(e) = self.event_logger.mark_processing(&event.event_id).await {
            self.logger
                .warn(&format!("could not mark {} processing: {e}", event.event_id));
        }

        let started = Instant::now();
        let ctx = RouteContext::from_event(event);
        let routed = self
            .router
            .route_operation_batch(&event.operations, &ctx)
            .await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let persisted = if routed == 0 && !event.operations.is_empty() {
            let message = format!(
                "none of {} operations in {} was routed",
                event.operations.len(),
                event.event_id
            );
            self.logger.warn(&message);
            self.errors.lock().record(
                ErrorCategory::Handler,
                &message,
                json!({ "eventId": event.event_id, "blockHeight": event.block_height }),
                self.clock.now(),
            );
            self.metrics.record_failed(Some(elapsed_ms));
            self.event_logger
                .mark_failed(&event.event_id, &message, Some(elapsed_ms))
                .await
        } else {
            self.metrics.record_processed(elapsed_ms);
            self.event_logger
                .mark_completed(&event.event_id, elapsed_ms)
                .await
        };

        if let Err(e) = persisted {
            self.logger
                .warn(&format!("could not persist outcome of {}: {e}", event.event_id));
        }
    }
}

#[async_trait]
impl BatchHandler<ChainEvent> for RoutingBatchHandler {
    async fn handle_batch(&self, batch: &[QueuedEvent<ChainEvent>]) -> anyhow::Result<()> {
        for queued in batch {
            self.process_event(&queued.payload).await;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ChainhookPipeline
// ---------------------------------------------------------------------------

pub struct ChainhookPipeline {
    batcher: EventBatcher<ChainEvent>,
    router: Arc<OperationRouter>,
    event_logger: Arc<EventLogger>,
    metrics: Arc<MetricsTracker>,
    errors: SharedErrorLog,
    clock: Arc<dyn ClockSource>,
    logger: SharedLogger,
}

impl ChainhookPipeline {
    /// Connects `batcher` to `router` and to the monitoring services.
    ///
    /// Registers the routing callback on `batcher`.
    #[must_use]
    pub fn new(
        batcher: EventBatcher<ChainEvent>,
        router: Arc<OperationRouter>,
        monitor: &MonitoringOrchestrator,
        clock: Arc<dyn ClockSource>,
        logger: SharedLogger,
    ) -> Self {
        let errors: SharedErrorLog = Arc::new(Mutex::new(ErrorLog::new()));
        let event_logger = monitor.event_logger();
        let metrics = monitor.metrics();

        batcher.register_handler(Arc::new(RoutingBatchHandler {
            router: Arc::clone(&router),
            event_logger: Arc::clone(&event_logger),
            metrics: Arc::clone(&metrics),
            errors: Arc::clone(&errors),
            clock: Arc::clone(&clock),
            logger: Arc::clone(&logger),
        }));

        Self {
            batcher,
            router,
            event_logger,
            metrics,
            errors,
            clock,
            logger,
        }
    }

    /// Decodes a raw webhook body and enqueues its applied transactions.
    ///
    /// # Errors
    ///
    /// Returns the [`PayloadError`] for an undecodable or invalid payload.
    /// The failure is also written to the error log.
    pub async fn ingest(&self, body: &[u8]) -> Result<IngestSummary, PayloadError> {
        match ChainhookPayload::from_slice(body) {
            Ok(payload) => self.ingest_payload(&payload).await,
            Err(e) => {
                self.record_error(ErrorCategory::Parse, &e, json!({ "bytes": body.len() }));
                Err(e)
            }
        }
    }

    /// # Errors
    ///
    /// Returns [`PayloadError::Empty`] or
    /// [`PayloadError::MissingTransactionHash`] for a structurally invalid
    /// payload.
    pub async fn ingest_payload(
        &self,
        payload: &ChainhookPayload,
    ) -> Result<IngestSummary, PayloadError> {
        let events = match payload.applied_events() {
            Ok(events) => events,
            Err(e) => {
                let uuid = payload.chainhook.as_ref().map(|c| c.uuid.as_str());
                self.record_error(ErrorCategory::Validation, &e, json!({ "chainhook": uuid }));
                return Err(e);
            }
        };

        let mut summary = IngestSummary {
            rollbacks: payload.rollback_transaction_count(),
            ..IngestSummary::default()
        };
        if summary.rollbacks > 0 {
            self.logger.info(&format!(
                "ignoring {} rolled-back transactions",
                summary.rollbacks
            ));
        }

        for event in events {
            self.metrics.record_received(event.event_type());
            if let Err(e) = self.event_logger.log_received(&event).await {
                self.logger
                    .warn(&format!("could not log {} as received: {e}", event.event_id));
            }
            if self.batcher.add_event(event).await {
                summary.accepted += 1;
            } else {
                summary.rejected += 1;
            }
        }

        self.logger.debug(&format!(
            "ingested payload: {} accepted, {} rejected",
            summary.accepted, summary.rejected
        ));
        Ok(summary)
    }

    #[must_use]
    pub fn batcher(&self) -> &EventBatcher<ChainEvent> {
        &self.batcher
    }

    #[must_use]
    pub fn router(&self) -> &Arc<OperationRouter> {
        &self.router
    }

    /// Up to `n` most recent pipeline errors, newest last.
    #[must_use]
    pub fn recent_errors(&self, n: usize) -> Vec<ErrorRecord> {
        self.errors.lock().recent(n)
    }

    #[must_use]
    pub fn error_counts(&self) -> BTreeMap<ErrorCategory, usize> {
        self.errors.lock().count_by_category()
    }

    fn record_error(&self, category: ErrorCategory, error: &PayloadError, context: serde_json::Value) {
        let message = error.to_string();
        self.logger.warn(&format!("{category} error: {message}"));
        self.errors
            .lock()
            .record(category, message, context, self.clock.now());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
