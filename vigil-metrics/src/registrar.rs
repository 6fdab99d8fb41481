//! Flag-guarded, idempotent metric registration for one worker role.

use std::sync::Arc;

use tracing::warn;
use vigil_core::Role;

use crate::histogram::SlidingWindowHistogram;
use crate::key::{MetricKey, MetricKind};
use crate::registry::{Gauge, MetricRegistry};

/// Which metric categories are published to the registry.
///
/// A disabled category is still aggregated, into a detached window that no
/// reporter ever sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ReportFlags {
    /// Publish role-wide latency.
    pub latency: bool,
    /// Publish per-topic latency.
    pub topic_latency: bool,
    /// Publish per-partition latency.
    pub partition_latency: bool,
    /// Publish the availability gauge.
    pub availability: bool,
}

impl ReportFlags {
    /// Every category enabled.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            latency: true,
            topic_latency: true,
            partition_latency: true,
            availability: true,
        }
    }

    /// Every category disabled.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            latency: false,
            topic_latency: false,
            partition_latency: false,
            availability: false,
        }
    }

    /// Returns true if `kind` is published.
    #[must_use]
    pub const fn enabled(&self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::Latency => self.latency,
            MetricKind::TopicLatency => self.topic_latency,
            MetricKind::PartitionLatency => self.partition_latency,
            MetricKind::Availability => self.availability,
        }
    }
}

impl Default for ReportFlags {
    fn default() -> Self {
        Self::all()
    }
}

/// Hands out instruments for one role, registering each key at most once.
#[derive(Debug, Clone)]
pub struct MetricRegistrar {
    registry: Arc<MetricRegistry>,
    role: Role,
    flags: ReportFlags,
}

impl MetricRegistrar {
    /// Creates a registrar for `role` over a shared registry.
    #[must_use]
    pub const fn new(registry: Arc<MetricRegistry>, role: Role, flags: ReportFlags) -> Self {
        Self {
            registry,
            role,
            flags,
        }
    }

    /// Returns the role metrics are registered for.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Returns the publish flags.
    #[must_use]
    pub const fn flags(&self) -> ReportFlags {
        self.flags
    }

    /// Returns the shared registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Returns a histogram for `key` with a window of `capacity` samples.
    ///
    /// If the category is published, the registered histogram is returned
    /// (registering it on first use) and its window resized to `capacity`.
    /// Otherwise a fresh detached histogram is returned.
    #[must_use]
    pub fn histogram(&self, key: &MetricKey, capacity: u32) -> Arc<SlidingWindowHistogram> {
        if !self.flags.enabled(key.kind()) {
            return Arc::new(SlidingWindowHistogram::new(capacity));
        }

        match self.registry.histogram(&key.encode(), capacity) {
            Ok(histogram) => {
                histogram.resize(capacity);
                histogram
            }
            Err(err) => {
                warn!(metric = %key, error = %err, "recording into detached histogram");
                Arc::new(SlidingWindowHistogram::new(capacity))
            }
        }
    }

    /// Publishes the role's availability ratio.
    ///
    /// Skipped when the category is disabled or no probe was attempted.
    pub fn publish_availability(&self, availability: Option<f64>) -> Option<Arc<Gauge>> {
        if !self.flags.availability {
            return None;
        }
        let ratio = availability?;
        let key = MetricKey::availability(self.role);
        match self.registry.gauge(&key.encode()) {
            Ok(gauge) => {
                gauge.set(ratio);
                Some(gauge)
            }
            Err(err) => {
                warn!(metric = %key, error = %err, "availability not published");
                None
            }
        }
    }
}
