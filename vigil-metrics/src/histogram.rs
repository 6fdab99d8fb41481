//! Fixed-capacity sliding-window histogram.
//!
//! Retains only the most recent `capacity` samples; the oldest sample is
//! evicted first once the window is full. Percentiles are computed on demand
//! from the retained samples.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use hdrhistogram::Histogram;
use vigil_core::WINDOW_CAPACITY_MAX;

/// Significant figures kept when computing percentiles.
const SIGNIFICANT_FIGURES: u8 = 3;

/// Point-in-time view of a histogram window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistogramSnapshot {
    /// Number of samples in the window.
    pub count: u64,
    /// Smallest sample.
    pub min: u64,
    /// Largest sample.
    pub max: u64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Median.
    pub p50: u64,
    /// 75th percentile.
    pub p75: u64,
    /// 95th percentile.
    pub p95: u64,
    /// 99th percentile.
    pub p99: u64,
}

/// A latency histogram over a bounded window of recent samples.
#[derive(Debug)]
pub struct SlidingWindowHistogram {
    window: Mutex<Window>,
}

#[derive(Debug)]
struct Window {
    capacity: usize,
    samples: VecDeque<u64>,
}

impl SlidingWindowHistogram {
    /// Creates a histogram retaining the last `capacity` samples.
    ///
    /// Capacity is clamped to `1..=WINDOW_CAPACITY_MAX`.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        let capacity = clamp_capacity(capacity);
        Self {
            window: Mutex::new(Window {
                capacity,
                samples: VecDeque::with_capacity(capacity),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Window> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a sample, evicting the oldest if the window is full.
    pub fn update(&self, value: u64) {
        let mut window = self.lock();
        if window.samples.len() == window.capacity {
            window.samples.pop_front();
        }
        window.samples.push_back(value);
    }

    /// Changes the window capacity, keeping the most recent samples.
    pub fn resize(&self, capacity: u32) {
        let capacity = clamp_capacity(capacity);
        let mut window = self.lock();
        while window.samples.len() > capacity {
            window.samples.pop_front();
        }
        window.capacity = capacity;
    }

    /// Returns the window capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Returns the number of retained samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().samples.len()
    }

    /// Returns true if no sample has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().samples.is_empty()
    }

    /// Returns the retained samples, oldest first.
    #[must_use]
    pub fn values(&self) -> Vec<u64> {
        self.lock().samples.iter().copied().collect()
    }

    /// Computes summary statistics over the retained samples.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&self) -> HistogramSnapshot {
        let samples = self.values();
        if samples.is_empty() {
            return HistogramSnapshot::default();
        }

        let count = samples.len() as u64;
        let sum: u128 = samples.iter().map(|&v| u128::from(v)).sum();
        let min = samples.iter().copied().min().unwrap_or_default();
        let max = samples.iter().copied().max().unwrap_or_default();

        let mut snapshot = HistogramSnapshot {
            count,
            min,
            max,
            mean: sum as f64 / count as f64,
            ..HistogramSnapshot::default()
        };

        if let Some(hdr) = to_hdr(&samples) {
            snapshot.p50 = hdr.value_at_quantile(0.50);
            snapshot.p75 = hdr.value_at_quantile(0.75);
            snapshot.p95 = hdr.value_at_quantile(0.95);
            snapshot.p99 = hdr.value_at_quantile(0.99);
        }
        snapshot
    }
}

fn clamp_capacity(capacity: u32) -> usize {
    capacity.clamp(1, WINDOW_CAPACITY_MAX) as usize
}

fn to_hdr(samples: &[u64]) -> Option<Histogram<u64>> {
    let mut hdr = Histogram::<u64>::new(SIGNIFICANT_FIGURES).ok()?;
    for &sample in samples {
        hdr.record(sample).ok()?;
    }
    Some(hdr)
}
