//! Vigil Prober - Barrier-synchronized availability probing.
//!
//! A fleet of identical prober instances shares a Kafka cluster's topics by
//! deterministic sharding. Within one instance every role runs on its own
//! thread, and all roles move through rounds in lock step:
//!
//! ```text
//!   consumer ──round──┐            ┌──round──┐
//!                     ├─ barrier ──┤         ├─ barrier ── ...
//!   metadata ──round──┘            └──round──┘
//! ```
//!
//! Each consumer round fetches the topology, keeps the topics owned by this
//! instance, reads one message per partition and publishes latency and
//! availability metrics. Probe failures lower availability; they never stop
//! the round or the loop.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! use vigil_metrics::LogReporter;
//! use vigil_prober::{Fleet, ProberConfig};
//!
//! let config = ProberConfig::new("main", "localhost:9092", "vigil-0:8080")
//!     .with_max_rounds(Some(10));
//! config.validate().unwrap();
//!
//! let fleet = Fleet::start(
//!     &config,
//!     &config.kafka_settings(),
//!     Arc::new(LogReporter::new(config.report_label())),
//!     Arc::new(AtomicBool::new(false)),
//! )
//! .unwrap();
//! for summary in fleet.join() {
//!     println!("{summary:?}");
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod barrier;
pub mod config;
pub mod fleet;
pub mod kafka;
pub mod probe;
pub mod round;
pub mod simulated;
pub mod topology;
pub mod worker;

pub use barrier::{BarrierState, ParticipantId, PhaseBarrier};
pub use config::{AppProperties, ConfigError, ProberConfig};
pub use fleet::{ClientFactory, Fleet, FleetError};
pub use kafka::{KafkaPartitionReader, KafkaSettings, KafkaTopologySource};
pub use probe::{PartitionReader, ProbeExecutor};
pub use round::{MetadataRound, Round, RoundCoordinator, RoundOutcome, RoundPhase};
pub use topology::{PeerDirectory, TopologyLease, TopologySource};
pub use worker::{WorkerLoop, WorkerOptions, WorkerSummary};
