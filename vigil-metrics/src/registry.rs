//! Process-wide metric registry.
//!
//! One registry is shared by every worker role. All mutation goes through a
//! single mutex so that the check-then-act of "register if absent" is atomic:
//! two roles racing to register the same key end up sharing one instrument.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::histogram::{HistogramSnapshot, SlidingWindowHistogram};

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A different instrument is already registered under this key.
    #[error("metric already registered: {key}")]
    Duplicate {
        /// The encoded key.
        key: String,
    },

    /// The key is registered with another instrument type.
    #[error("metric {key} is not a {expected}")]
    KindMismatch {
        /// The encoded key.
        key: String,
        /// The instrument type that was asked for.
        expected: &'static str,
    },
}

/// A gauge holding the latest `f64` value.
#[derive(Debug, Default)]
pub struct Gauge {
    bits: AtomicU64,
}

impl Gauge {
    /// Creates a gauge with an initial value.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    /// Sets the current value.
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    /// Returns the current value.
    #[must_use]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// A registered instrument.
#[derive(Debug, Clone)]
pub enum Instrument {
    /// Sliding-window latency histogram.
    Histogram(Arc<SlidingWindowHistogram>),
    /// Point-in-time value.
    Gauge(Arc<Gauge>),
}

impl Instrument {
    /// Captures the instrument's current state.
    #[must_use]
    pub fn snapshot(&self) -> InstrumentSnapshot {
        match self {
            Self::Histogram(h) => InstrumentSnapshot::Histogram(h.snapshot()),
            Self::Gauge(g) => InstrumentSnapshot::Gauge(g.get()),
        }
    }
}

/// Point-in-time value of an instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InstrumentSnapshot {
    /// Histogram statistics.
    Histogram(HistogramSnapshot),
    /// Gauge value.
    Gauge(f64),
}

/// Shared registry of named instruments.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    instruments: Mutex<BTreeMap<String, Instrument>>,
}

impl MetricRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Instrument>> {
        self.instruments.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true if `key` is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Registers `instrument` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if the key is already present; the
    /// existing instrument is left in place.
    pub fn register(&self, key: impl Into<String>, instrument: Instrument) -> Result<(), RegistryError> {
        let key = key.into();
        let mut instruments = self.lock();
        if instruments.contains_key(&key) {
            return Err(RegistryError::Duplicate { key });
        }
        instruments.insert(key, instrument);
        Ok(())
    }

    /// Returns the instrument under `key`, registering `make()` first if absent.
    pub fn get_or_register(&self, key: &str, make: impl FnOnce() -> Instrument) -> Instrument {
        self.lock().entry(key.to_string()).or_insert_with(make).clone()
    }

    /// Returns the histogram under `key`, registering one of `capacity` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::KindMismatch`] if `key` holds a gauge.
    pub fn histogram(&self, key: &str, capacity: u32) -> Result<Arc<SlidingWindowHistogram>, RegistryError> {
        match self.get_or_register(key, || {
            Instrument::Histogram(Arc::new(SlidingWindowHistogram::new(capacity)))
        }) {
            Instrument::Histogram(h) => Ok(h),
            Instrument::Gauge(_) => Err(RegistryError::KindMismatch {
                key: key.to_string(),
                expected: "histogram",
            }),
        }
    }

    /// Returns the gauge under `key`, registering one at `0.0` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::KindMismatch`] if `key` holds a histogram.
    pub fn gauge(&self, key: &str) -> Result<Arc<Gauge>, RegistryError> {
        match self.get_or_register(key, || Instrument::Gauge(Arc::new(Gauge::default()))) {
            Instrument::Gauge(g) => Ok(g),
            Instrument::Histogram(_) => Err(RegistryError::KindMismatch {
                key: key.to_string(),
                expected: "gauge",
            }),
        }
    }

    /// Returns the instrument under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Instrument> {
        self.lock().get(key).cloned()
    }

    /// Returns all registered keys in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Returns the number of registered instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Captures every instrument's state, sorted by key.
    ///
    /// The registry lock is released before instruments are read.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, InstrumentSnapshot)> {
        let instruments: Vec<(String, Instrument)> = self
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        instruments
            .into_iter()
            .map(|(key, instrument)| (key, instrument.snapshot()))
            .collect()
    }
}
