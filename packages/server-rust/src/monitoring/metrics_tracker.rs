//! In-memory processing counters and rolling averages.

use std::collections::BTreeMap;
use std::sync::Arc;

use hookwatch_core::sample::round4;
use hookwatch_core::{ClockSource, MetricsSnapshot, SampleWindow};
use parking_lot::Mutex;

struct TrackerState {
    total_events: u64,
    processed_events: u64,
    failed_events: u64,
    events_by_type: BTreeMap<String, u64>,
    processing_times: SampleWindow,
}

impl TrackerState {
    fn new(sample_capacity: usize) -> Self {
        Self {
            total_events: 0,
            processed_events: 0,
            failed_events: 0,
            events_by_type: BTreeMap::new(),
            processing_times: SampleWindow::new(sample_capacity),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn failure_rate_percent(&self) -> f64 {
        let finished = self.processed_events + self.failed_events;
        if finished == 0 {
            return 0.0;
        }
        round4(self.failed_events as f64 / finished as f64 * 100.0)
    }
}

/// Tracks received, processed, and failed events plus processing times.
pub struct MetricsTracker {
    state: Mutex<TrackerState>,
    sample_capacity: usize,
    clock: Arc<dyn ClockSource>,
}

impl MetricsTracker {
    #[must_use]
    pub fn new(sample_capacity: usize, clock: Arc<dyn ClockSource>) -> Self {
        Self {
            state: Mutex::new(TrackerState::new(sample_capacity)),
            sample_capacity,
            clock,
        }
    }

    pub fn record_received(&self, event_type: &str) {
        let mut state = self.state.lock();
        state.total_events += 1;
        *state.events_by_type.entry(event_type.to_string()).or_insert(0) += 1;
    }

    pub fn record_processed(&self, processing_time_ms: f64) {
        let mut state = self.state.lock();
        state.processed_events += 1;
        state.processing_times.push(processing_time_ms);
    }

    /// Failed events contribute their time to the average when it is known.
    pub fn record_failed(&self, processing_time_ms: Option<f64>) {
        let mut state = self.state.lock();
        state.failed_events += 1;
        if let Some(ms) = processing_time_ms {
            state.processing_times.push(ms);
        }
    }

    #[must_use]
    pub fn average_processing_time_ms(&self) -> f64 {
        round4(self.state.lock().processing_times.average())
    }

    /// Failed share of finished events, in percent.
    #[must_use]
    pub fn failure_rate_percent(&self) -> f64 {
        self.state.lock().failure_rate_percent()
    }

    #[must_use]
    pub fn snapshot(&self, is_connected: bool) -> MetricsSnapshot {
        let state = self.state.lock();
        MetricsSnapshot {
            total_events: state.total_events,
            processed_events: state.processed_events,
            failed_events: state.failed_events,
            average_processing_time_ms: round4(state.processing_times.average()),
            failure_rate_percent: state.failure_rate_percent(),
            is_connected,
            events_by_type: state.events_by_type.clone(),
            captured_at_ms: self.clock.now(),
        }
    }

    pub fn reset(&self) {
        *self.state.lock() = TrackerState::new(self.sample_capacity);
    }
}
