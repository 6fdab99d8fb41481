//! Multi-level latency aggregation for one round.
//!
//! Window sizing caps memory and makes each distribution represent one full
//! sweep rather than unbounded history:
//!
//! | Level     | Window capacity                         |
//! |-----------|-----------------------------------------|
//! | global    | partitions assigned to this instance    |
//! | topic     | partitions of that topic                |
//! | partition | 1 (most recent probe only)              |

use std::collections::HashMap;
use std::sync::Arc;

use vigil_core::{ProbeOutcome, TopicMetadata, TopicPartition, PARTITION_WINDOW_CAPACITY};

use crate::histogram::{HistogramSnapshot, SlidingWindowHistogram};
use crate::key::MetricKey;
use crate::registrar::MetricRegistrar;

/// Returns `(tries - fails) / tries`, or `None` if nothing was tried.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn availability_ratio(try_count: u64, fail_count: u64) -> Option<f64> {
    if try_count == 0 {
        return None;
    }
    Some(try_count.saturating_sub(fail_count) as f64 / try_count as f64)
}

fn window_capacity(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Counters and global latency at the end of a round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateSummary {
    /// Probes attempted.
    pub try_count: u64,
    /// Probes that failed.
    pub fail_count: u64,
    /// Fraction of successful probes, if any were attempted.
    pub availability: Option<f64>,
    /// Global latency window.
    pub global: HistogramSnapshot,
}

/// Aggregates probe latencies at global, topic and partition granularity.
#[derive(Debug)]
pub struct LatencyAggregator {
    registrar: MetricRegistrar,
    global: Arc<SlidingWindowHistogram>,
    topics: HashMap<String, Arc<SlidingWindowHistogram>>,
    partitions: HashMap<TopicPartition, Arc<SlidingWindowHistogram>>,
    try_count: u64,
    fail_count: u64,
}

impl LatencyAggregator {
    /// Creates an aggregator sized for `topics`, acquiring every window up front.
    #[must_use]
    pub fn new(registrar: &MetricRegistrar, topics: &[TopicMetadata]) -> Self {
        let role = registrar.role();
        let total: usize = topics.iter().map(TopicMetadata::partition_count).sum();
        let global = registrar.histogram(&MetricKey::latency(role), window_capacity(total));

        let mut topic_windows = HashMap::with_capacity(topics.len());
        let mut partition_windows = HashMap::with_capacity(total);
        for topic in topics {
            let window = registrar.histogram(
                &MetricKey::topic_latency(role, topic.name()),
                window_capacity(topic.partition_count()),
            );
            topic_windows.insert(topic.name().to_string(), window);

            for tp in topic.topic_partitions() {
                let window = registrar.histogram(
                    &MetricKey::partition_latency(role, &tp),
                    PARTITION_WINDOW_CAPACITY,
                );
                partition_windows.insert(tp, window);
            }
        }

        Self {
            registrar: registrar.clone(),
            global,
            topics: topic_windows,
            partitions: partition_windows,
            try_count: 0,
            fail_count: 0,
        }
    }

    /// Records a latency in the global window.
    pub fn record_global(&self, elapsed_ms: u64) {
        self.global.update(elapsed_ms);
    }

    /// Records a latency in the topic's window.
    pub fn record_topic(&mut self, topic: &str, elapsed_ms: u64) {
        let registrar = &self.registrar;
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| registrar.histogram(&MetricKey::topic_latency(registrar.role(), topic), 1))
            .update(elapsed_ms);
    }

    /// Records a latency in the partition's window.
    pub fn record_partition(&mut self, topic: &str, partition: i32, elapsed_ms: u64) {
        let registrar = &self.registrar;
        self.partitions
            .entry(TopicPartition::new(topic, partition))
            .or_insert_with_key(|tp| {
                registrar.histogram(
                    &MetricKey::partition_latency(registrar.role(), tp),
                    PARTITION_WINDOW_CAPACITY,
                )
            })
            .update(elapsed_ms);
    }

    /// Counts a probe and records its latency at every level.
    ///
    /// Failures count once and record the penalized latency.
    pub fn record_outcome(&mut self, outcome: &ProbeOutcome) {
        self.try_count += 1;
        if outcome.is_failure() {
            self.fail_count += 1;
        }

        let elapsed_ms = outcome.recorded_elapsed_ms();
        let tp = outcome.partition();
        self.record_global(elapsed_ms);
        self.record_topic(tp.topic(), elapsed_ms);
        self.record_partition(tp.topic(), tp.partition(), elapsed_ms);
    }

    /// Returns the number of probes attempted.
    #[must_use]
    pub const fn try_count(&self) -> u64 {
        self.try_count
    }

    /// Returns the number of probes that failed.
    #[must_use]
    pub const fn fail_count(&self) -> u64 {
        self.fail_count
    }

    /// Returns the availability ratio, or `None` before any probe.
    #[must_use]
    pub fn availability(&self) -> Option<f64> {
        availability_ratio(self.try_count, self.fail_count)
    }

    /// Returns the global window.
    #[must_use]
    pub const fn global(&self) -> &Arc<SlidingWindowHistogram> {
        &self.global
    }

    /// Returns the window of `topic`, if one exists.
    #[must_use]
    pub fn topic(&self, topic: &str) -> Option<&Arc<SlidingWindowHistogram>> {
        self.topics.get(topic)
    }

    /// Returns the window of `partition`, if one exists.
    #[must_use]
    pub fn partition(&self, partition: &TopicPartition) -> Option<&Arc<SlidingWindowHistogram>> {
        self.partitions.get(partition)
    }

    /// Summarizes the counters and the global window.
    #[must_use]
    pub fn summary(&self) -> AggregateSummary {
        AggregateSummary {
            try_count: self.try_count,
            fail_count: self.fail_count,
            availability: self.availability(),
            global: self.global.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use vigil_core::{ClientError, ProbeError, Role};

    use super::*;
    use crate::registrar::ReportFlags;
    use crate::registry::MetricRegistry;

    fn registrar() -> MetricRegistrar {
        MetricRegistrar::new(Arc::new(MetricRegistry::new()), Role::Consumer, ReportFlags::all())
    }

    fn ok(topic: &str, partition: i32, ms: u64) -> ProbeOutcome {
        ProbeOutcome::Succeeded {
            partition: TopicPartition::new(topic, partition),
            elapsed_ms: ms,
        }
    }

    fn failed(topic: &str, partition: i32, ms: u64) -> ProbeOutcome {
        ProbeOutcome::Failed(ProbeError {
            partition: TopicPartition::new(topic, partition),
            elapsed_ms: ms,
            cause: ClientError::unavailable("down"),
        })
    }

    #[test]
    fn test_availability_ratio() {
        assert_eq!(availability_ratio(10, 2), Some(0.8));
        assert_eq!(availability_ratio(4, 1), Some(0.75));
        assert_eq!(availability_ratio(0, 0), None);
        assert_eq!(availability_ratio(2, 5), Some(0.0));
    }

    #[test]
    fn test_window_sizes() {
        let topics = vec![
            TopicMetadata::with_partition_count("a", 2),
            TopicMetadata::with_partition_count("b", 3),
        ];
        let aggregator = LatencyAggregator::new(&registrar(), &topics);

        assert_eq!(aggregator.global().capacity(), 5);
        assert_eq!(aggregator.topic("a").unwrap().capacity(), 2);
        assert_eq!(aggregator.topic("b").unwrap().capacity(), 3);
        assert_eq!(
            aggregator.partition(&TopicPartition::new("b", 2)).unwrap().capacity(),
            1
        );
    }

    #[test]
    fn test_record_outcomes() {
        let topics = vec![TopicMetadata::with_partition_count("a", 2)];
        let mut aggregator = LatencyAggregator::new(&registrar(), &topics);

        aggregator.record_outcome(&ok("a", 0, 12));
        aggregator.record_outcome(&failed("a", 1, 3));

        assert_eq!(aggregator.try_count(), 2);
        assert_eq!(aggregator.fail_count(), 1);
        assert_eq!(aggregator.availability(), Some(0.5));
        assert_eq!(aggregator.global().values(), vec![12, 60_003]);
        assert_eq!(aggregator.topic("a").unwrap().values(), vec![12, 60_003]);
        assert_eq!(
            aggregator.partition(&TopicPartition::new("a", 1)).unwrap().values(),
            vec![60_003]
        );
    }

    #[test]
    fn test_unplanned_topic_gets_window() {
        let mut aggregator = LatencyAggregator::new(&registrar(), &[]);
        aggregator.record_topic("late", 7);
        aggregator.record_partition("late", 0, 7);

        assert_eq!(aggregator.topic("late").unwrap().values(), vec![7]);
        assert_eq!(
            aggregator.partition(&TopicPartition::new("late", 0)).unwrap().values(),
            vec![7]
        );
    }

    #[test]
    fn test_windows_persist_across_rounds() {
        let registrar = registrar();
        let topics = vec![TopicMetadata::with_partition_count("a", 2)];

        let mut first = LatencyAggregator::new(&registrar, &topics);
        first.record_outcome(&ok("a", 0, 1));
        first.record_outcome(&ok("a", 1, 2));

        let mut second = LatencyAggregator::new(&registrar, &topics);
        second.record_outcome(&ok("a", 0, 3));

        assert_eq!(second.global().values(), vec![2, 3]);
        assert_eq!(second.try_count(), 1);
    }

    #[test]
    fn test_summary() {
        let topics = vec![TopicMetadata::with_partition_count("a", 1)];
        let mut aggregator = LatencyAggregator::new(&registrar(), &topics);
        aggregator.record_outcome(&ok("a", 0, 9));

        let summary = aggregator.summary();
        assert_eq!(summary.try_count, 1);
        assert_eq!(summary.fail_count, 0);
        assert_eq!(summary.availability, Some(1.0));
        assert_eq!(summary.global.max, 9);
    }
}
