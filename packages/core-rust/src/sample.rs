//! Fixed-capacity timing sample window.
//!
//! Keeps the most recent N samples and evicts the oldest first. Batch,
//! routing, and processing-time averages are all computed from one of these.

use std::collections::VecDeque;

/// Default number of samples retained by rolling averages.
pub const DEFAULT_SAMPLE_CAPACITY: usize = 100;

/// Bounded FIFO buffer of timing samples in milliseconds.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    capacity: usize,
    samples: VecDeque<f64>,
}

impl SampleWindow {
    /// Creates an empty window holding at most `capacity` samples.
    ///
    /// A zero capacity is bumped to one so the window can always report the
    /// latest sample.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends a sample, evicting the oldest one when full.
    pub fn push(&mut self, sample_ms: f64) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample_ms);
    }

    /// Mean of the retained samples, or `0.0` when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Retained samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_CAPACITY)
    }
}

/// Rounds to four decimal places, the precision reported by every metrics view.
#[must_use]
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_averages_zero() {
        let window = SampleWindow::new(4);
        assert!(window.is_empty());
        assert!(window.average().abs() < f64::EPSILON);
    }

    #[test]
    fn evicts_oldest_first() {
        let mut window = SampleWindow::new(3);
        for sample in [1.0, 2.0, 3.0, 4.0, 5.0] {
            window.push(sample);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![3.0, 4.0, 5.0]);
        assert!((window.average() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_capacity_keeps_latest() {
        let mut window = SampleWindow::new(0);
        window.push(7.0);
        window.push(9.0);
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![9.0]);
    }

    #[test]
    fn clear_empties_window() {
        let mut window = SampleWindow::default();
        window.push(1.5);
        window.clear();
        assert!(window.is_empty());
    }

    #[test]
    fn round4_truncates_precision() {
        assert!((round4(1.234_567) - 1.2346).abs() < 1e-12);
        assert!((round4(2.0) - 2.0).abs() < f64::EPSILON);
    }

    proptest::proptest! {
        #[test]
        fn window_keeps_most_recent_samples(
            capacity in 1usize..32,
            samples in proptest::collection::vec(0.0f64..10_000.0, 0..128),
        ) {
            let mut window = SampleWindow::new(capacity);
            for &sample in &samples {
                window.push(sample);
            }
            proptest::prop_assert!(window.len() <= capacity);
            let expected: Vec<f64> = samples
                .iter()
                .copied()
                .skip(samples.len().saturating_sub(capacity))
                .collect();
            proptest::prop_assert_eq!(window.iter().collect::<Vec<_>>(), expected);
        }
    }
}
