//! Scoped metrics sessions.
//!
//! A session brackets one round: start the reporter, run, report, stop. Stop
//! runs on drop, so it happens on every exit path, including a panicking round.

use tracing::{error, warn};

use crate::registry::MetricRegistry;
use crate::reporter::{MetricsReporter, ReporterError};

/// An active reporting session. Stops the reporter when dropped.
pub struct MetricsSession<'a> {
    reporter: &'a dyn MetricsReporter,
    registry: &'a MetricRegistry,
}

impl<'a> MetricsSession<'a> {
    /// Starts a session.
    ///
    /// # Errors
    ///
    /// Returns the start error after a best-effort `stop`.
    pub fn start(
        reporter: &'a dyn MetricsReporter,
        registry: &'a MetricRegistry,
    ) -> Result<Self, ReporterError> {
        if let Err(err) = reporter.start() {
            reporter.stop();
            return Err(err);
        }
        Ok(Self { reporter, registry })
    }

    /// Returns the registry this session reports.
    #[must_use]
    pub const fn registry(&self) -> &MetricRegistry {
        self.registry
    }

    /// Reports the registry. Failures are logged, never propagated.
    pub fn report(&self) {
        if let Err(err) = self.reporter.report(self.registry) {
            warn!(error = %err, "metrics report failed");
        }
    }
}

impl Drop for MetricsSession<'_> {
    fn drop(&mut self) {
        self.reporter.stop();
    }
}

/// Runs `body` inside a session, reporting after it returns.
///
/// If the session cannot start, `body` is skipped and `None` is returned.
pub fn with_session<T>(
    reporter: &dyn MetricsReporter,
    registry: &MetricRegistry,
    body: impl FnOnce(&MetricsSession<'_>) -> T,
) -> Option<T> {
    match MetricsSession::start(reporter, registry) {
        Ok(session) => {
            let result = body(&session);
            session.report();
            Some(result)
        }
        Err(err) => {
            error!(error = %err, "metrics session did not start");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingReporter {
        fail_start: bool,
        starts: AtomicUsize,
        reports: AtomicUsize,
        stops: AtomicUsize,
    }

    impl MetricsReporter for CountingReporter {
        fn start(&self) -> Result<(), ReporterError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                return Err(ReporterError::Start {
                    message: "backend down".to_string(),
                });
            }
            Ok(())
        }

        fn report(&self, _registry: &MetricRegistry) -> Result<(), ReporterError> {
            self.reports.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_session_reports_and_stops() {
        let reporter = CountingReporter::default();
        let registry = MetricRegistry::new();

        let result = with_session(&reporter, &registry, |_| 7);

        assert_eq!(result, Some(7));
        assert_eq!(reporter.starts.load(Ordering::SeqCst), 1);
        assert_eq!(reporter.reports.load(Ordering::SeqCst), 1);
        assert_eq!(reporter.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_start_still_stops() {
        let reporter = CountingReporter {
            fail_start: true,
            ..CountingReporter::default()
        };
        let registry = MetricRegistry::new();

        let result = with_session(&reporter, &registry, |_| 7);

        assert_eq!(result, None);
        assert_eq!(reporter.reports.load(Ordering::SeqCst), 0);
        assert_eq!(reporter.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_body_still_stops() {
        let reporter = CountingReporter::default();
        let registry = MetricRegistry::new();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            with_session(&reporter, &registry, |_| -> u32 { panic!("round blew up") })
        }));

        assert!(outcome.is_err());
        assert_eq!(reporter.stops.load(Ordering::SeqCst), 1);
    }
}
