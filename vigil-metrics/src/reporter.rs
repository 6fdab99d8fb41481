//! Metric reporting backends.

use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tracing::{debug, info};

use crate::registry::{InstrumentSnapshot, MetricRegistry};

/// Errors from a reporting backend.
#[derive(Debug, Error)]
pub enum ReporterError {
    /// The backend could not be started.
    #[error("reporter failed to start: {message}")]
    Start {
        /// Description of the failure.
        message: String,
    },

    /// A report could not be delivered.
    #[error("reporter failed to report: {message}")]
    Report {
        /// Description of the failure.
        message: String,
    },
}

/// A destination for registry snapshots.
///
/// `stop` is best-effort and must tolerate a `start` that failed part way.
pub trait MetricsReporter: Send + Sync {
    /// Starts a reporting session.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    fn start(&self) -> Result<(), ReporterError>;

    /// Reports the current state of `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be delivered.
    fn report(&self, registry: &MetricRegistry) -> Result<(), ReporterError>;

    /// Ends a reporting session.
    fn stop(&self);
}

/// Reports every instrument as a structured `tracing` event.
#[derive(Debug)]
pub struct LogReporter {
    cluster_name: String,
    active_sessions: AtomicUsize,
}

impl LogReporter {
    /// Creates a reporter tagging every event with `cluster_name`.
    #[must_use]
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            active_sessions: AtomicUsize::new(0),
        }
    }

    /// Returns the number of sessions started and not yet stopped.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Acquire)
    }
}

impl MetricsReporter for LogReporter {
    fn start(&self) -> Result<(), ReporterError> {
        let active = self.active_sessions.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(cluster = %self.cluster_name, active, "metrics session started");
        Ok(())
    }

    fn report(&self, registry: &MetricRegistry) -> Result<(), ReporterError> {
        for (metric, snapshot) in registry.snapshot() {
            match snapshot {
                InstrumentSnapshot::Histogram(h) => info!(
                    cluster = %self.cluster_name,
                    %metric,
                    count = h.count,
                    min = h.min,
                    max = h.max,
                    mean = h.mean,
                    p50 = h.p50,
                    p75 = h.p75,
                    p95 = h.p95,
                    p99 = h.p99,
                    "histogram"
                ),
                InstrumentSnapshot::Gauge(value) => {
                    info!(cluster = %self.cluster_name, %metric, value, "gauge");
                }
            }
        }
        Ok(())
    }

    fn stop(&self) {
        let previous = self
            .active_sessions
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)))
            .unwrap_or_default();
        debug!(
            cluster = %self.cluster_name,
            active = previous.saturating_sub(1),
            "metrics session stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_without_start_is_tolerated() {
        let reporter = LogReporter::new("test");
        reporter.stop();
        assert_eq!(reporter.active_sessions(), 0);
    }

    #[test]
    fn test_session_counting() {
        let reporter = LogReporter::new("test");
        reporter.start().unwrap();
        reporter.start().unwrap();
        reporter.stop();
        assert_eq!(reporter.active_sessions(), 1);
    }

    #[test]
    fn test_report_empty_and_populated_registry() {
        let reporter = LogReporter::new("test");
        let registry = MetricRegistry::new();
        reporter.report(&registry).unwrap();

        registry.gauge("g").unwrap().set(1.0);
        registry.histogram("h", 2).unwrap().update(4);
        reporter.report(&registry).unwrap();
    }
}
