//! Vigil Routing - Deterministic shard planning across service instances.
//!
//! Every Vigil instance in a fleet sees the same topology and the same ordered
//! peer list, and each computes its own slice of the topics without talking to
//! the others.
//!
//! # Design
//!
//! - **Per-topic granularity**: all partitions of a topic land on one instance
//! - **Pure planning**: same topology, peers and address give the same shard
//! - **Explicit failure**: an address missing from the peer list is an error

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod planner;

pub use planner::{shard_of, ShardAssignment, ShardPlanner};
