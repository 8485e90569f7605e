//! Event batching: bounded queue, size/timeout flush, sequential callbacks.
//!
//! Events are queued with an enqueue timestamp. Reaching `batch_size`
//! processes batches before `add_event` returns; otherwise a single timeout
//! is armed. One processing loop runs at a time and keeps taking batches
//! from the front of the queue until it is empty, so callbacks observe
//! events in order. The loop runs on its own task: a caller that stops
//! waiting does not cancel a batch already taken from the queue.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use hookwatch_core::sample::round4;
use hookwatch_core::{ClockSource, QueuedEvent, SampleWindow};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::config::{BatcherConfig, ConfigError};
use crate::logging::SharedLogger;

// ---------------------------------------------------------------------------
// BatchHandler trait
// ---------------------------------------------------------------------------

/// Callback invoked with every flushed batch.
///
/// Handlers run sequentially in registration order. An error is logged and
/// counted; it does not stop later handlers or the queue.
#[async_trait]
pub trait BatchHandler<T>: Send + Sync {
    async fn handle_batch(&self, batch: &[QueuedEvent<T>]) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters and rolling averages reported by [`EventBatcher::get_metrics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchMetrics {
    pub total_batches: u64,
    pub total_events: u64,
    pub average_batch_size: f64,
    pub average_processing_time_ms: f64,
    pub callback_errors: u64,
    pub dropped_events: u64,
    pub queue_length: usize,
    pub sample_count: usize,
}

struct MetricsState {
    total_batches: u64,
    total_events: u64,
    callback_errors: u64,
    dropped_events: u64,
    processing_times: SampleWindow,
}

impl MetricsState {
    fn new(sample_capacity: usize) -> Self {
        Self {
            total_batches: 0,
            total_events: 0,
            callback_errors: 0,
            dropped_events: 0,
            processing_times: SampleWindow::new(sample_capacity),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

/// Armed flush timer. The generation tells a firing task whether it is
/// still the current timer.
struct TimerSlot {
    generation: u64,
    handle: JoinHandle<()>,
}

struct QueueState<T> {
    queue: VecDeque<QueuedEvent<T>>,
    timer: Option<TimerSlot>,
    next_generation: u64,
    processing: bool,
    destroyed: bool,
}

impl<T> QueueState<T> {
    fn cancel_timer(&mut self) {
        if let Some(slot) = self.timer.take() {
            slot.handle.abort();
        }
    }
}

enum Drain {
    Done(usize),
    Busy,
}

struct Inner<T> {
    config: BatcherConfig,
    logger: SharedLogger,
    clock: Arc<dyn ClockSource>,
    state: Mutex<QueueState<T>>,
    handlers: RwLock<Vec<Arc<dyn BatchHandler<T>>>>,
    metrics: Mutex<MetricsState>,
    idle: Notify,
}

/// Releases the processing flag if a drain loop is cancelled mid-batch.
struct ProcessingGuard<'a, T> {
    inner: &'a Inner<T>,
    active: bool,
}

impl<T> Drop for ProcessingGuard<'_, T> {
    fn drop(&mut self) {
        if self.active {
            self.inner.state.lock().processing = false;
        }
        self.inner.idle.notify_waiters();
    }
}

impl<T: Send + Sync + 'static> Inner<T> {
    fn arm_timer(self: &Arc<Self>, state: &mut QueueState<T>) {
        let generation = state.next_generation;
        state.next_generation += 1;

        let weak: Weak<Self> = Arc::downgrade(self);
        let timeout = self.config.batch_timeout;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            {
                let mut state = inner.state.lock();
                match &state.timer {
                    Some(slot) if slot.generation == generation => state.timer = None,
                    _ => return,
                }
            }
            inner.logger.debug("batch timeout elapsed, flushing partial batch");
            inner.drain().await;
        });

        state.timer = Some(TimerSlot { generation, handle });
    }

    /// Processes batches until the queue is empty. Returns `Busy` when
    /// another loop already owns the queue; that loop will pick up anything
    /// queued meanwhile.
    async fn drain(&self) -> Drain {
        {
            let mut state = self.state.lock();
            if state.processing {
                return Drain::Busy;
            }
            state.processing = true;
        }
        let mut guard = ProcessingGuard {
            inner: self,
            active: true,
        };

        let mut processed = 0;
        loop {
            let batch: Vec<QueuedEvent<T>> = {
                let mut state = self.state.lock();
                let take = state.queue.len().min(self.config.batch_size);
                if take == 0 {
                    state.processing = false;
                    state.cancel_timer();
                    guard.active = false;
                    break;
                }
                state.queue.drain(..take).collect()
            };
            self.run_handlers(&batch).await;
            processed += batch.len();
        }

        drop(guard);
        Drain::Done(processed)
    }

    /// Runs [`Inner::drain`] on a spawned task and waits for it.
    async fn drain_detached(self: &Arc<Self>) -> Drain {
        let inner = Arc::clone(self);
        match tokio::spawn(async move { inner.drain().await }).await {
            Ok(drain) => drain,
            Err(err) => {
                self.logger.error(&format!("batch processing task failed: {err}"));
                Drain::Done(0)
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    async fn run_handlers(&self, batch: &[QueuedEvent<T>]) {
        let handlers: Vec<Arc<dyn BatchHandler<T>>> = self.handlers.read().clone();
        let started = Instant::now();
        let mut errors = 0u64;

        for (index, handler) in handlers.iter().enumerate() {
            if let Err(err) = handler.handle_batch(batch).await {
                errors += 1;
                self.logger.error(&format!(
                    "batch callback #{index} failed on {} events: {err:#}",
                    batch.len()
                ));
            }
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let mut metrics = self.metrics.lock();
        metrics.total_batches += 1;
        metrics.total_events += batch.len() as u64;
        metrics.callback_errors += errors;
        metrics.processing_times.push(elapsed_ms);
        drop(metrics);

        self.logger.debug(&format!(
            "processed batch of {} events in {elapsed_ms:.3}ms",
            batch.len()
        ));
    }
}

// ---------------------------------------------------------------------------
// EventBatcher
// ---------------------------------------------------------------------------

/// Accumulates events and hands them to registered handlers in batches.
///
/// Cloning is cheap; clones share the same queue, handlers, and metrics.
pub struct EventBatcher<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for EventBatcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> EventBatcher<T> {
    /// # Errors
    ///
    /// Returns the first constraint `config` violates.
    pub fn new(
        config: BatcherConfig,
        logger: SharedLogger,
        clock: Arc<dyn ClockSource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let metrics = MetricsState::new(config.sample_capacity);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                logger,
                clock,
                state: Mutex::new(QueueState {
                    queue: VecDeque::new(),
                    timer: None,
                    next_generation: 0,
                    processing: false,
                    destroyed: false,
                }),
                handlers: RwLock::new(Vec::new()),
                metrics: Mutex::new(metrics),
                idle: Notify::new(),
            }),
        })
    }

    /// Registers a handler; it receives every batch flushed from now on.
    pub fn register_handler(&self, handler: Arc<dyn BatchHandler<T>>) {
        self.inner.handlers.write().push(handler);
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.read().len()
    }

    /// Enqueues an event.
    ///
    /// When the queue is full the oldest events are dropped so that the most
    /// recent 80% survive. Reaching `batch_size` processes batches before
    /// returning; otherwise the flush timer is armed if it is not already.
    ///
    /// Returns `false` only when the batcher has been destroyed.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn add_event(&self, payload: T) -> bool {
        let inner = &self.inner;
        let flush_now = {
            let mut state = inner.state.lock();
            if state.destroyed {
                drop(state);
                inner.logger.warn("event rejected: batcher has been destroyed");
                return false;
            }

            let max = inner.config.max_queue_size;
            if state.queue.len() >= max {
                let keep = max * 4 / 5;
                let dropped = state.queue.len() - keep;
                state.queue.drain(..dropped);
                inner.metrics.lock().dropped_events += dropped as u64;
                inner.logger.warn(&format!(
                    "event queue full ({max}), dropped {dropped} oldest events"
                ));
            }

            state
                .queue
                .push_back(QueuedEvent::new(payload, inner.clock.now()));

            if state.queue.len() >= inner.config.batch_size {
                true
            } else {
                if state.timer.is_none() {
                    inner.arm_timer(&mut state);
                }
                false
            }
        };

        if flush_now {
            inner.drain_detached().await;
        }
        true
    }

    /// Processes queued events now, without touching the timer first.
    ///
    /// Returns the number of events handed to handlers by this call; zero
    /// when another processing loop is already running.
    pub async fn process_batch(&self) -> usize {
        match self.inner.drain_detached().await {
            Drain::Done(n) => n,
            Drain::Busy => 0,
        }
    }

    /// Cancels the pending timer and drains the whole queue, waiting for any
    /// in-progress loop to finish first. Returns the number of events this
    /// call processed.
    pub async fn flush(&self) -> usize {
        let mut total = 0;
        loop {
            let idle = self.inner.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            self.inner.state.lock().cancel_timer();
            match self.inner.drain_detached().await {
                Drain::Done(n) => {
                    total += n;
                    return total;
                }
                Drain::Busy => idle.await,
            }
        }
    }

    /// Cancels the pending timer and discards every queued event.
    /// Returns how many were discarded.
    pub fn clear_queue(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.cancel_timer();
        let cleared = state.queue.len();
        state.queue.clear();
        cleared
    }

    /// Cancels the timer, discards the queue and handlers, and rejects any
    /// further events.
    pub fn destroy(&self) {
        {
            let mut state = self.inner.state.lock();
            state.cancel_timer();
            state.queue.clear();
            state.destroyed = true;
        }
        self.inner.handlers.write().clear();
        self.inner.logger.info("event batcher destroyed");
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    #[must_use]
    pub fn has_pending_timer(&self) -> bool {
        self.inner.state.lock().timer.is_some()
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.state.lock().destroyed
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn get_metrics(&self) -> BatchMetrics {
        let queue_length = self.queue_len();
        let metrics = self.inner.metrics.lock();
        let average_batch_size = if metrics.total_batches == 0 {
            0.0
        } else {
            metrics.total_events as f64 / metrics.total_batches as f64
        };
        BatchMetrics {
            total_batches: metrics.total_batches,
            total_events: metrics.total_events,
            average_batch_size: round4(average_batch_size),
            average_processing_time_ms: round4(metrics.processing_times.average()),
            callback_errors: metrics.callback_errors,
            dropped_events: metrics.dropped_events,
            queue_length,
            sample_count: metrics.processing_times.len(),
        }
    }

    pub fn reset_metrics(&self) {
        let mut metrics = self.inner.metrics.lock();
        *metrics = MetricsState::new(self.inner.config.sample_capacity);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hookwatch_core::ManualClock;

    use super::*;
    use crate::logging::{LogLevel, MemoryLogger};

    /// Records every batch it receives.
    #[derive(Default)]
    struct RecordingHandler {
        batches: Mutex<Vec<Vec<&'static str>>>,
    }

    impl RecordingHandler {
        fn batches(&self) -> Vec<Vec<&'static str>> {
            self.batches.lock().clone()
        }
    }

    #[async_trait]
    impl BatchHandler<&'static str> for RecordingHandler {
        async fn handle_batch(&self, batch: &[QueuedEvent<&'static str>]) -> anyhow::Result<()> {
            self.batches
                .lock()
                .push(batch.iter().map(|e| e.payload).collect());
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl BatchHandler<&'static str> for FailingHandler {
        async fn handle_batch(&self, _batch: &[QueuedEvent<&'static str>]) -> anyhow::Result<()> {
            anyhow::bail!("sink unavailable")
        }
    }

    fn batcher(
        batch_size: usize,
        timeout_ms: u64,
        max_queue_size: usize,
    ) -> (EventBatcher<&'static str>, Arc<MemoryLogger>) {
        let logger = MemoryLogger::new();
        let config = BatcherConfig {
            batch_size,
            batch_timeout: Duration::from_millis(timeout_ms),
            max_queue_size,
            sample_capacity: 5,
        };
        let batcher =
            EventBatcher::new(config, logger.clone(), Arc::new(ManualClock::new(1_000))).unwrap();
        (batcher, logger)
    }

    #[tokio::test(start_paused = true)]
    async fn size_threshold_flushes_without_waiting_for_timer() {
        let (batcher, _) = batcher(3, 1_000, 100);
        let handler = Arc::new(RecordingHandler::default());
        batcher.register_handler(handler.clone());

        assert!(batcher.add_event("e1").await);
        assert!(batcher.add_event("e2").await);
        assert!(handler.batches().is_empty());
        assert!(batcher.has_pending_timer());

        assert!(batcher.add_event("e3").await);
        assert_eq!(handler.batches(), vec![vec!["e1", "e2", "e3"]]);
        assert!(!batcher.has_pending_timer());

        let metrics = batcher.get_metrics();
        assert_eq!(metrics.total_batches, 1);
        assert_eq!(metrics.total_events, 3);
        assert!((metrics.average_batch_size - 3.0).abs() < f64::EPSILON);
        assert_eq!(metrics.queue_length, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_flushes_partial_batch() {
        let (batcher, _) = batcher(10, 1_000, 100);
        let handler = Arc::new(RecordingHandler::default());
        batcher.register_handler(handler.clone());

        batcher.add_event("a").await;
        batcher.add_event("b").await;

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(handler.batches().is_empty());

        tokio::time::sleep(Duration::from_millis(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(handler.batches(), vec![vec!["a", "b"]]);
        assert!(!batcher.has_pending_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_timer_is_armed() {
        let (batcher, _) = batcher(10, 1_000, 100);
        let handler = Arc::new(RecordingHandler::default());
        batcher.register_handler(handler.clone());

        batcher.add_event("a").await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        batcher.add_event("b").await;

        // The first timer fires at 1000ms and takes both events.
        tokio::time::sleep(Duration::from_millis(500)).await;
        tokio::task::yield_now().await;
        assert_eq!(handler.batches(), vec![vec!["a", "b"]]);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handler.batches().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn batches_never_exceed_batch_size() {
        let (batcher, _) = batcher(4, 1_000, 100);
        let handler = Arc::new(RecordingHandler::default());
        batcher.register_handler(handler.clone());

        for _ in 0..11 {
            batcher.add_event("x").await;
        }
        batcher.flush().await;

        let sizes: Vec<usize> = handler.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 11);
        assert!(sizes.iter().all(|&s| s <= 4));
        assert_eq!(batcher.get_metrics().total_events, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_drains_everything_and_cancels_timer() {
        let (batcher, _) = batcher(3, 1_000, 100);
        let handler = Arc::new(RecordingHandler::default());
        batcher.register_handler(handler.clone());

        batcher.add_event("a").await;
        batcher.add_event("b").await;
        assert!(batcher.has_pending_timer());

        assert_eq!(batcher.flush().await, 2);
        assert!(!batcher.has_pending_timer());
        assert_eq!(batcher.queue_len(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handler.batches(), vec![vec!["a", "b"]]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_callback_does_not_stop_others() {
        let (batcher, logger) = batcher(2, 1_000, 100);
        let handler = Arc::new(RecordingHandler::default());
        batcher.register_handler(Arc::new(FailingHandler));
        batcher.register_handler(handler.clone());

        batcher.add_event("a").await;
        batcher.add_event("b").await;

        assert_eq!(handler.batches(), vec![vec!["a", "b"]]);
        assert_eq!(batcher.get_metrics().callback_errors, 1);
        assert!(logger.contains(LogLevel::Error, "sink unavailable"));
    }

    /// Handler that blocks until released, used to hold the processing loop.
    struct GateHandler {
        gate: Arc<tokio::sync::Semaphore>,
        seen: Mutex<usize>,
    }

    #[async_trait]
    impl BatchHandler<&'static str> for GateHandler {
        async fn handle_batch(&self, batch: &[QueuedEvent<&'static str>]) -> anyhow::Result<()> {
            let _permit = self.gate.acquire().await?;
            *self.seen.lock() += batch.len();
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_keeps_most_recent_eighty_percent() {
        let (batcher, logger) = batcher(2, 60_000, 10);
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let handler = Arc::new(GateHandler {
            gate: gate.clone(),
            seen: Mutex::new(0),
        });
        batcher.register_handler(handler.clone());

        // The first two events start a processing loop that blocks on the gate.
        let first = batcher.clone();
        let blocked = tokio::spawn(async move {
            first.add_event("held-1").await;
            first.add_event("held-2").await;
        });
        tokio::task::yield_now().await;

        // While the loop is blocked, later adds return immediately.
        for _ in 0..10 {
            assert!(batcher.add_event("q").await);
        }
        assert_eq!(batcher.queue_len(), 10);

        assert!(batcher.add_event("overflow").await);
        assert_eq!(batcher.queue_len(), 9);
        assert_eq!(batcher.get_metrics().dropped_events, 2);
        assert!(logger.contains(LogLevel::Warn, "dropped 2 oldest"));

        gate.add_permits(100);
        blocked.await.unwrap();
        batcher.flush().await;
        assert_eq!(*handler.seen.lock(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_add_event_still_delivers_its_batch() {
        let (batcher, _) = batcher(2, 1_000, 100);
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let handler = Arc::new(GateHandler {
            gate: gate.clone(),
            seen: Mutex::new(0),
        });
        batcher.register_handler(handler.clone());

        batcher.add_event("a").await;
        // The caller gives up while the handler is still blocked.
        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), batcher.add_event("b")).await;
        assert!(abandoned.is_err());

        gate.add_permits(1);
        assert_eq!(batcher.flush().await, 0);

        assert_eq!(*handler.seen.lock(), 2);
        assert_eq!(batcher.queue_len(), 0);
        assert_eq!(batcher.get_metrics().total_events, 2);
        assert!(!batcher.has_pending_timer());
    }

    #[test]
    fn new_rejects_queue_smaller_than_batch() {
        let config = BatcherConfig {
            batch_size: 5,
            max_queue_size: 0,
            ..BatcherConfig::default()
        };
        let result = EventBatcher::<&'static str>::new(
            config,
            MemoryLogger::new(),
            Arc::new(ManualClock::new(0)),
        );
        assert!(matches!(
            result,
            Err(ConfigError::QueueSmallerThanBatch {
                max_queue_size: 0,
                batch_size: 5
            })
        ));

        let zero = BatcherConfig {
            batch_size: 0,
            ..BatcherConfig::default()
        };
        let result = EventBatcher::<&'static str>::new(
            zero,
            MemoryLogger::new(),
            Arc::new(ManualClock::new(0)),
        );
        assert!(matches!(result, Err(ConfigError::ZeroBatchSize)));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_queue_discards_and_cancels_timer() {
        let (batcher, _) = batcher(5, 1_000, 100);
        let handler = Arc::new(RecordingHandler::default());
        batcher.register_handler(handler.clone());

        batcher.add_event("a").await;
        batcher.add_event("b").await;
        assert_eq!(batcher.clear_queue(), 2);
        assert!(!batcher.has_pending_timer());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(handler.batches().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn destroy_rejects_further_events() {
        let (batcher, logger) = batcher(5, 1_000, 100);
        batcher.register_handler(Arc::new(RecordingHandler::default()));
        batcher.add_event("a").await;

        batcher.destroy();
        assert!(batcher.is_destroyed());
        assert_eq!(batcher.handler_count(), 0);
        assert_eq!(batcher.queue_len(), 0);
        assert!(!batcher.has_pending_timer());
        assert!(!batcher.add_event("late").await);
        assert!(logger.contains(LogLevel::Warn, "destroyed"));
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_and_reset_metrics_are_zero() {
        let (batcher, _) = batcher(2, 1_000, 100);
        assert_eq!(batcher.get_metrics(), BatchMetrics::default());

        batcher.register_handler(Arc::new(RecordingHandler::default()));
        batcher.add_event("a").await;
        batcher.add_event("b").await;
        assert_eq!(batcher.get_metrics().sample_count, 1);

        batcher.reset_metrics();
        let metrics = batcher.get_metrics();
        assert_eq!(metrics, BatchMetrics::default());
        assert_eq!(metrics.sample_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn events_carry_enqueue_timestamp() {
        struct StampHandler(Mutex<Vec<u64>>);

        #[async_trait]
        impl BatchHandler<&'static str> for StampHandler {
            async fn handle_batch(
                &self,
                batch: &[QueuedEvent<&'static str>],
            ) -> anyhow::Result<()> {
                self.0.lock().extend(batch.iter().map(|e| e.enqueued_at_ms));
                Ok(())
            }
        }

        let (batcher, _) = batcher(1, 1_000, 10);
        let handler = Arc::new(StampHandler(Mutex::new(Vec::new())));
        batcher.register_handler(handler.clone());
        batcher.add_event("a").await;
        assert_eq!(*handler.0.lock(), vec![1_000]);
    }

    proptest::proptest! {
        #[test]
        fn queue_never_exceeds_max(max_queue in 1usize..40, adds in 0usize..200) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();
            rt.block_on(async {
                let (batcher, _) = batcher(1, 60_000, max_queue);
                let gate = Arc::new(tokio::sync::Semaphore::new(0));
                batcher.register_handler(Arc::new(GateHandler {
                    gate: gate.clone(),
                    seen: Mutex::new(0),
                }));

                // Hold the processing loop so every later event stays queued.
                let held = batcher.clone();
                let blocked = tokio::spawn(async move {
                    held.add_event("held").await;
                });
                tokio::task::yield_now().await;

                for _ in 0..adds {
                    batcher.add_event("p").await;
                    assert!(batcher.queue_len() <= max_queue);
                }
                let dropped = batcher.get_metrics().dropped_events;
                assert_eq!(batcher.queue_len() as u64 + dropped, adds as u64);

                gate.add_permits(1);
                blocked.await.unwrap();
            });
        }
    }
}
