//! Measurement rounds.
//!
//! A consumer round runs a fixed, linear sequence:
//!
//! ```text
//! Idle ──▶ Planning ──▶ Probing ──▶ Reporting ──▶ Done
//!            │
//!            └── topology or peer-list failure: availability 0.0, SetupError
//! ```
//!
//! Probe failures are absorbed inside `Probing`; they lower availability and
//! raise latency, but never change how the round ends.

use std::time::Instant;

use tracing::{debug, info, warn};
use vigil_core::{elapsed_with_penalty, Role, SetupError, PARTITION_WINDOW_CAPACITY};
use vigil_metrics::{
    availability_ratio, HistogramSnapshot, LatencyAggregator, MetricKey, MetricRegistrar,
};
use vigil_routing::ShardPlanner;

use crate::probe::{PartitionReader, ProbeExecutor};
use crate::topology::{PeerDirectory, TopologyLease, TopologySource};

/// Stage of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Not started.
    Idle,
    /// Fetching topology and computing the shard.
    Planning,
    /// Probing assigned partitions.
    Probing,
    /// Publishing availability.
    Reporting,
    /// Finished.
    Done,
}

/// Result of one completed round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    /// Role that ran the round.
    pub role: Role,
    /// Topics in the full topology.
    pub total_topics: usize,
    /// Topics assigned to this instance.
    pub assigned_topics: usize,
    /// Partitions assigned to this instance.
    pub assigned_partitions: usize,
    /// Probes attempted.
    pub try_count: u64,
    /// Probes that failed.
    pub fail_count: u64,
    /// Fraction of successful probes, if any were attempted.
    pub availability: Option<f64>,
    /// Role-wide latency window after the round.
    pub latency: HistogramSnapshot,
}

/// One role's unit of repeated work.
pub trait Round: Send {
    /// Returns the role this round measures.
    fn role(&self) -> Role;

    /// Runs one round.
    ///
    /// # Errors
    ///
    /// Returns a [`SetupError`] if the round could not start probing.
    fn run_round(&mut self) -> Result<RoundOutcome, SetupError>;
}

impl<R: Round + ?Sized> Round for Box<R> {
    fn role(&self) -> Role {
        (**self).role()
    }

    fn run_round(&mut self) -> Result<RoundOutcome, SetupError> {
        (**self).run_round()
    }
}

fn enter(phase: &mut RoundPhase, next: RoundPhase, role: Role) {
    debug!(%role, from = ?*phase, to = ?next, "round transition");
    *phase = next;
}

/// Consumer round: reads from every partition of the local shard.
pub struct RoundCoordinator<T, R, P> {
    topology: T,
    peers: P,
    self_address: String,
    planner: ShardPlanner,
    executor: ProbeExecutor<R>,
    registrar: MetricRegistrar,
    phase: RoundPhase,
}

impl<T, R, P> RoundCoordinator<T, R, P>
where
    T: TopologySource,
    R: PartitionReader,
    P: PeerDirectory,
{
    /// Creates a coordinator probing as `self_address`.
    #[must_use]
    pub fn new(
        topology: T,
        peers: P,
        self_address: impl Into<String>,
        reader: R,
        registrar: MetricRegistrar,
    ) -> Self {
        Self {
            topology,
            peers,
            self_address: self_address.into(),
            planner: ShardPlanner::new(),
            executor: ProbeExecutor::new(reader),
            registrar,
            phase: RoundPhase::Idle,
        }
    }

    /// Returns the stage the last round reached.
    #[must_use]
    pub const fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Returns the registrar metrics are published through.
    #[must_use]
    pub const fn registrar(&self) -> &MetricRegistrar {
        &self.registrar
    }
}

impl<T, R, P> Round for RoundCoordinator<T, R, P>
where
    T: TopologySource,
    R: PartitionReader,
    P: PeerDirectory,
{
    fn role(&self) -> Role {
        self.registrar.role()
    }

    fn run_round(&mut self) -> Result<RoundOutcome, SetupError> {
        let role = self.registrar.role();
        self.phase = RoundPhase::Idle;
        enter(&mut self.phase, RoundPhase::Planning, role);
        info!(%role, "starting latency round");

        let lease = TopologyLease::new(&self.topology);
        let planned = lease
            .list_all_topic_partitions()
            .map_err(SetupError::Topology)
            .and_then(|snapshot| {
                let peers = self.peers.peers().map_err(SetupError::Topology)?;
                let assignment = self.planner.plan(&snapshot, &peers, &self.self_address)?;
                Ok((snapshot, assignment))
            });
        let (snapshot, assignment) = match planned {
            Ok(planned) => planned,
            Err(err) => {
                drop(lease);
                // A round that cannot probe reports the role as unavailable.
                if self.registrar.publish_availability(Some(0.0)).is_none() {
                    debug!(%role, "availability not published");
                }
                return Err(err);
            }
        };
        info!(
            %role,
            total_topics = snapshot.topic_count(),
            assigned_topics = assignment.topic_count(),
            assigned_partitions = assignment.partition_count(),
            "planned round"
        );

        enter(&mut self.phase, RoundPhase::Probing, role);
        let mut aggregator = LatencyAggregator::new(&self.registrar, assignment.topics());
        for topic in assignment.topics() {
            info!(%role, topic = topic.name(), "reading from topic");
            for partition in topic.topic_partitions() {
                let outcome = self.executor.probe_outcome(&partition);
                aggregator.record_outcome(&outcome);
            }
        }

        enter(&mut self.phase, RoundPhase::Reporting, role);
        let summary = aggregator.summary();
        if self.registrar.publish_availability(summary.availability).is_none() {
            debug!(%role, try_count = summary.try_count, "availability not published");
        }
        drop(lease);

        enter(&mut self.phase, RoundPhase::Done, role);
        info!(
            %role,
            try_count = summary.try_count,
            fail_count = summary.fail_count,
            availability = ?summary.availability,
            "finished latency round"
        );

        Ok(RoundOutcome {
            role,
            total_topics: snapshot.topic_count(),
            assigned_topics: assignment.topic_count(),
            assigned_partitions: assignment.partition_count(),
            try_count: summary.try_count,
            fail_count: summary.fail_count,
            availability: summary.availability,
            latency: summary.global,
        })
    }
}

/// Metadata round: times one topology fetch.
///
/// A failed fetch is the measurement, not a setup failure: it is recorded as
/// a penalized latency and zero availability.
pub struct MetadataRound<T> {
    topology: T,
    registrar: MetricRegistrar,
}

impl<T: TopologySource> MetadataRound<T> {
    /// Creates a metadata round over `topology`.
    #[must_use]
    pub const fn new(topology: T, registrar: MetricRegistrar) -> Self {
        Self {
            topology,
            registrar,
        }
    }
}

impl<T: TopologySource> Round for MetadataRound<T> {
    fn role(&self) -> Role {
        self.registrar.role()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn run_round(&mut self) -> Result<RoundOutcome, SetupError> {
        let role = self.registrar.role();
        let lease = TopologyLease::new(&self.topology);

        let start = Instant::now();
        let result = lease.list_all_topic_partitions();
        let elapsed_ms = start.elapsed().as_millis() as u64;
        drop(lease);

        let failed = result.is_err();
        let total_topics = match result {
            Ok(snapshot) => snapshot.topic_count(),
            Err(err) => {
                warn!(%role, error = %err, "error fetching metadata");
                0
            }
        };

        let histogram = self
            .registrar
            .histogram(&MetricKey::latency(role), PARTITION_WINDOW_CAPACITY);
        histogram.update(elapsed_with_penalty(elapsed_ms, failed));

        let fail_count = u64::from(failed);
        let availability = availability_ratio(1, fail_count);
        if self.registrar.publish_availability(availability).is_none() {
            debug!(%role, failed, "availability not published");
        }
        info!(%role, elapsed_ms, failed, total_topics, "finished metadata round");

        Ok(RoundOutcome {
            role,
            total_topics,
            assigned_topics: 0,
            assigned_partitions: 0,
            try_count: 1,
            fail_count,
            availability,
            latency: histogram.snapshot(),
        })
    }
}
