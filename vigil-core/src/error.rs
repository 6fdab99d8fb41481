//! Error taxonomy for Vigil probing rounds.
//!
//! Three classes with three propagation rules:
//!
//! - [`ProbeError`]: one partition read failed. Recovered at partition scope,
//!   counted, and recorded as a penalized latency. The round continues.
//! - [`SetupError`]: the round could not start probing. Surfaces to the worker
//!   loop, which logs it and still arrives at the barrier.
//! - [`BarrierError`]: a participant broke the barrier protocol. Fatal to that
//!   participant's loop.

use thiserror::Error;

use crate::types::TopicPartition;

/// Error reported by an external collaborator (broker client or topology).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The broker client library returned an error.
    #[error("broker client error: {0}")]
    Broker(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The collaborator did not answer in time.
    #[error("timed out after {waited_ms}ms waiting for {operation}")]
    Timeout {
        /// What was being waited for.
        operation: &'static str,
        /// How long we waited, in milliseconds.
        waited_ms: u64,
    },

    /// The collaborator is not reachable.
    #[error("unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

impl ClientError {
    /// Wraps a broker client library error.
    pub fn broker(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Broker(Box::new(err))
    }

    /// Creates an `Unavailable` error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// A single partition probe failed.
#[derive(Debug, Error)]
#[error("probe of {partition} failed after {elapsed_ms}ms: {cause}")]
pub struct ProbeError {
    /// The partition that was probed.
    pub partition: TopicPartition,
    /// Raw wall-clock time spent before the failure, without penalty.
    pub elapsed_ms: u64,
    /// Why the read failed.
    #[source]
    pub cause: ClientError,
}

/// A round could not get to the probing stage.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The topology could not be fetched.
    #[error("failed to fetch topology: {0}")]
    Topology(#[source] ClientError),

    /// The local address is missing from the peer list, so no shard index exists.
    #[error("service address '{address}' is not in the peer list of {peer_count} peers")]
    NotInPeerList {
        /// The local service address.
        address: String,
        /// Number of configured peers.
        peer_count: usize,
    },
}

impl SetupError {
    /// Returns a stable numeric code for log correlation.
    #[must_use]
    pub const fn error_code(&self) -> i16 {
        match self {
            Self::Topology(_) => -1,
            Self::NotInPeerList { .. } => -2,
        }
    }
}

/// A barrier participant violated the arrival protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BarrierError {
    /// The participant id is not registered with the barrier.
    #[error("participant {participant} is not registered")]
    NotRegistered {
        /// Raw participant id.
        participant: u64,
    },

    /// The participant already arrived in the running phase.
    #[error("participant {participant} already arrived in phase {phase}")]
    AlreadyArrived {
        /// Raw participant id.
        participant: u64,
        /// The running phase.
        phase: u64,
    },

    /// The barrier has terminated and accepts no new participants.
    #[error("barrier terminated at phase {phase}")]
    Terminated {
        /// The final phase.
        phase: u64,
    },
}

impl BarrierError {
    /// Returns a stable numeric code for log correlation.
    #[must_use]
    pub const fn error_code(&self) -> i16 {
        match self {
            Self::NotRegistered { .. } => -10,
            Self::AlreadyArrived { .. } => -11,
            Self::Terminated { .. } => -12,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_error_display() {
        let err = ProbeError {
            partition: TopicPartition::new("orders", 2),
            elapsed_ms: 12,
            cause: ClientError::unavailable("broker down"),
        };
        assert_eq!(
            err.to_string(),
            "probe of orders-2 failed after 12ms: unavailable: broker down"
        );
    }

    #[test]
    fn test_setup_error_codes() {
        let err = SetupError::NotInPeerList {
            address: "x".to_string(),
            peer_count: 2,
        };
        assert_eq!(err.error_code(), -2);
        assert!(err.to_string().contains("'x'"));

        let err = SetupError::Topology(ClientError::Timeout {
            operation: "metadata",
            waited_ms: 5000,
        });
        assert_eq!(err.error_code(), -1);
        assert!(err.to_string().contains("5000ms"));
    }

    #[test]
    fn test_barrier_error_display() {
        let err = BarrierError::AlreadyArrived {
            participant: 3,
            phase: 7,
        };
        assert_eq!(err.to_string(), "participant 3 already arrived in phase 7");
        assert_eq!(err.error_code(), -11);
    }
}
