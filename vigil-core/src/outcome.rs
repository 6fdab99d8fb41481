//! Explicit probe outcomes.
//!
//! A failed probe is a value, not an unwinding error: the round records it
//! and moves on to the next partition.

use crate::error::ProbeError;
use crate::limits::elapsed_with_penalty;
use crate::types::TopicPartition;

/// Result of probing one partition.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// The read succeeded.
    Succeeded {
        /// The partition that was probed.
        partition: TopicPartition,
        /// Wall-clock time of the read, in milliseconds.
        elapsed_ms: u64,
    },
    /// The read failed.
    Failed(ProbeError),
}

impl ProbeOutcome {
    /// Converts a probe result into an outcome.
    #[must_use]
    pub fn from_result(partition: &TopicPartition, result: Result<u64, ProbeError>) -> Self {
        match result {
            Ok(elapsed_ms) => Self::Succeeded {
                partition: partition.clone(),
                elapsed_ms,
            },
            Err(err) => Self::Failed(err),
        }
    }

    /// Returns the probed partition.
    #[must_use]
    pub const fn partition(&self) -> &TopicPartition {
        match self {
            Self::Succeeded { partition, .. } => partition,
            Self::Failed(err) => &err.partition,
        }
    }

    /// Returns true if the probe failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns the measured wall-clock delta without any penalty.
    #[must_use]
    pub const fn raw_elapsed_ms(&self) -> u64 {
        match self {
            Self::Succeeded { elapsed_ms, .. } => *elapsed_ms,
            Self::Failed(err) => err.elapsed_ms,
        }
    }

    /// Returns the latency to record, penalized for failures.
    #[must_use]
    pub const fn recorded_elapsed_ms(&self) -> u64 {
        elapsed_with_penalty(self.raw_elapsed_ms(), self.is_failure())
    }
}
