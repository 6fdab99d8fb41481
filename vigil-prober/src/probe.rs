//! Single-partition probes.
//!
//! A probe is one bounded read against one partition, timed in whole
//! milliseconds. The read itself is delegated to a [`PartitionReader`] so the
//! same probe logic runs against a real broker or a simulated one.

use std::time::Instant;

use tracing::{debug, warn};
use vigil_core::{ClientError, ProbeError, ProbeOutcome, TopicPartition};

/// Broker client collaborator: reads one message from a partition.
///
/// Implementations bound the read with their own client timeouts; the probe
/// enforces none of its own.
pub trait PartitionReader: Send + Sync {
    /// Performs one read used purely to measure liveness and latency.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition cannot be read.
    fn read_one(&self, partition: &TopicPartition) -> Result<(), ClientError>;
}

impl<R: PartitionReader + ?Sized> PartitionReader for Box<R> {
    fn read_one(&self, partition: &TopicPartition) -> Result<(), ClientError> {
        (**self).read_one(partition)
    }
}

impl<R: PartitionReader + ?Sized> PartitionReader for std::sync::Arc<R> {
    fn read_one(&self, partition: &TopicPartition) -> Result<(), ClientError> {
        (**self).read_one(partition)
    }
}

/// Times reads against partitions.
#[derive(Debug)]
pub struct ProbeExecutor<R> {
    reader: R,
}

impl<R: PartitionReader> ProbeExecutor<R> {
    /// Creates an executor over `reader`.
    #[must_use]
    pub const fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Returns the underlying reader.
    #[must_use]
    pub const fn reader(&self) -> &R {
        &self.reader
    }

    /// Probes one partition, returning the elapsed milliseconds.
    ///
    /// # Errors
    ///
    /// Returns a [`ProbeError`] carrying the raw elapsed time if the read fails.
    #[allow(clippy::cast_possible_truncation)] // A probe won't run for 584 million years.
    pub fn probe(&self, partition: &TopicPartition) -> Result<u64, ProbeError> {
        debug!(%partition, "reading from partition");
        let start = Instant::now();
        let result = self.reader.read_one(partition);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        result.map(|()| elapsed_ms).map_err(|cause| ProbeError {
            partition: partition.clone(),
            elapsed_ms,
            cause,
        })
    }

    /// Probes one partition and turns the result into an outcome value.
    pub fn probe_outcome(&self, partition: &TopicPartition) -> ProbeOutcome {
        let outcome = ProbeOutcome::from_result(partition, self.probe(partition));
        if let ProbeOutcome::Failed(err) = &outcome {
            warn!(%partition, error = %err, "error reading from partition");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct FlakyReader {
        calls: AtomicUsize,
    }

    impl PartitionReader for FlakyReader {
        fn read_one(&self, partition: &TopicPartition) -> Result<(), ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if partition.partition() % 2 == 0 {
                Ok(())
            } else {
                Err(ClientError::unavailable("odd partition"))
            }
        }
    }

    fn executor() -> ProbeExecutor<FlakyReader> {
        ProbeExecutor::new(FlakyReader {
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_probe_success() {
        let executor = executor();
        assert!(executor.probe(&TopicPartition::new("t", 0)).is_ok());
        assert_eq!(executor.reader().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_probe_failure_carries_partition() {
        let executor = executor();
        let err = executor.probe(&TopicPartition::new("t", 1)).unwrap_err();

        assert_eq!(err.partition, TopicPartition::new("t", 1));
        assert!(matches!(err.cause, ClientError::Unavailable { .. }));
    }

    #[test]
    fn test_failed_outcome_is_penalized() {
        let executor = executor();
        let outcome = executor.probe_outcome(&TopicPartition::new("t", 3));

        assert!(outcome.is_failure());
        assert!(outcome.recorded_elapsed_ms() >= 60_000);
    }

    #[test]
    fn test_exactly_one_read_per_probe() {
        let executor = executor();
        for p in 0..4 {
            let _ = executor.probe_outcome(&TopicPartition::new("t", p));
        }
        assert_eq!(executor.reader().calls.load(Ordering::SeqCst), 4);
    }
}
