//! Vigil Core - Shared types, errors and limits for the Vigil availability prober.
//!
//! This crate holds the vocabulary every other Vigil crate speaks: topic
//! partitions, topology snapshots, the ordered peer list, worker roles, and
//! the error taxonomy that separates recoverable probe failures from
//! round-setup failures and barrier protocol violations.
//!
//! # Design Principles
//!
//! - **Explicit types**: a `TopicPartition` is never a bare `(String, i32)`
//! - **Explicit limits**: penalties and window bounds are named constants
//! - **No unsafe code**

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod limits;
mod outcome;
mod types;

pub use error::{BarrierError, ClientError, ProbeError, SetupError};
pub use limits::{
    elapsed_with_penalty, FAILURE_PENALTY_MS, PARTITION_WINDOW_CAPACITY, SCOPE_ALL,
    WINDOW_CAPACITY_MAX,
};
pub use outcome::ProbeOutcome;
pub use types::{PeerList, Role, RoleParseError, TopicMetadata, TopicPartition, TopologySnapshot};
