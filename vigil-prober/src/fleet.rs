//! Role workers for one prober instance.
//!
//! Every configured role gets its own round, its own worker loop and its own
//! OS thread. All workers are registered with one shared barrier before any
//! thread starts, so the first phase waits for every role.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use thiserror::Error;
use tracing::{error, info};
use vigil_core::{BarrierError, ClientError, PeerList, Role};
use vigil_metrics::{MetricRegistrar, MetricRegistry, MetricsReporter};

use crate::barrier::PhaseBarrier;
use crate::config::ProberConfig;
use crate::probe::PartitionReader;
use crate::round::{MetadataRound, Round, RoundCoordinator};
use crate::topology::{PeerDirectory, TopologySource};
use crate::worker::{WorkerLoop, WorkerSummary};

/// Errors starting or joining workers.
#[derive(Debug, Error)]
pub enum FleetError {
    /// A client could not be created.
    #[error("client setup failed: {0}")]
    Client(#[from] ClientError),

    /// The barrier rejected a worker.
    #[error(transparent)]
    Barrier(#[from] BarrierError),

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The role has no round implementation.
    #[error("role {role} is not supported")]
    UnsupportedRole {
        /// The rejected role.
        role: Role,
    },

    /// A worker thread panicked.
    #[error("{role} worker panicked")]
    Panicked {
        /// Role of the worker.
        role: Role,
    },
}

/// Creates the collaborators each role needs.
pub trait ClientFactory {
    /// Creates a topology source.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created.
    fn topology(&self) -> Result<Box<dyn TopologySource>, ClientError>;

    /// Creates a partition reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created.
    fn reader(&self) -> Result<Box<dyn PartitionReader>, ClientError>;

    /// Returns the peer directory, given the configured peer list.
    fn peers(&self, configured: &PeerList) -> Box<dyn PeerDirectory> {
        Box::new(configured.clone())
    }
}

/// Running role workers.
pub struct Fleet {
    barrier: Arc<PhaseBarrier>,
    registry: Arc<MetricRegistry>,
    shutdown: Arc<AtomicBool>,
    workers: Vec<(Role, JoinHandle<Result<WorkerSummary, BarrierError>>)>,
}

impl Fleet {
    /// Builds one worker per configured role and starts them.
    ///
    /// # Errors
    ///
    /// Returns an error if a client, a barrier seat or a thread cannot be
    /// obtained. Workers built before the failure release their seats.
    pub fn start(
        config: &ProberConfig,
        clients: &dyn ClientFactory,
        reporter: Arc<dyn MetricsReporter>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self, FleetError> {
        let barrier = Arc::new(PhaseBarrier::new());
        let registry = Arc::new(MetricRegistry::new());

        let mut pending = Vec::with_capacity(config.roles.len());
        for &role in &config.roles {
            let registrar = MetricRegistrar::new(
                Arc::clone(&registry),
                role,
                config.properties.report_flags(role),
            );
            let round: Box<dyn Round> = match role {
                Role::Consumer => Box::new(RoundCoordinator::new(
                    clients.topology()?,
                    clients.peers(&config.peers),
                    config.service_address.clone(),
                    clients.reader()?,
                    registrar,
                )),
                Role::Metadata => Box::new(MetadataRound::new(clients.topology()?, registrar)),
                Role::Producer => return Err(FleetError::UnsupportedRole { role }),
            };
            let worker = WorkerLoop::new(
                round,
                Arc::clone(&barrier),
                Arc::clone(&registry),
                Arc::clone(&reporter),
                Arc::clone(&shutdown),
            )?
            .with_options(config.worker_options());
            pending.push((role, worker));
        }

        let mut workers = Vec::with_capacity(pending.len());
        for (role, worker) in pending {
            let spawned = std::thread::Builder::new()
                .name(format!("vigil-{role}"))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => workers.push((role, handle)),
                Err(err) => {
                    error!(%role, error = %err, "failed to spawn worker");
                    shutdown.store(true, Ordering::SeqCst);
                    return Err(FleetError::Spawn(err));
                }
            }
        }

        info!(
            roles = ?config.roles,
            registered = barrier.registered_parties(),
            "started workers"
        );
        Ok(Self {
            barrier,
            registry,
            shutdown,
            workers,
        })
    }

    /// Returns the shared barrier.
    #[must_use]
    pub const fn barrier(&self) -> &Arc<PhaseBarrier> {
        &self.barrier
    }

    /// Returns the shared metric registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Asks every worker to stop after its current round.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for every worker to finish.
    pub fn join(self) -> Vec<Result<WorkerSummary, FleetError>> {
        self.workers
            .into_iter()
            .map(|(role, handle)| match handle.join() {
                Ok(result) => result.map_err(FleetError::from),
                Err(_) => Err(FleetError::Panicked { role }),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use vigil_core::TopicMetadata;
    use vigil_metrics::LogReporter;

    use super::*;
    use crate::simulated::SimulatedCluster;

    fn config(roles: Vec<Role>) -> ProberConfig {
        ProberConfig::new("main", "unused:9092", "solo")
            .with_roles(roles)
            .with_round_interval(Duration::ZERO)
            .with_max_rounds(Some(2))
    }

    #[test]
    fn test_fleet_runs_every_role() {
        let cluster = SimulatedCluster::new(
            vec![TopicMetadata::with_partition_count("orders", 3)]
                .into_iter()
                .collect(),
        );
        let fleet = Fleet::start(
            &config(vec![Role::Consumer, Role::Metadata]),
            &cluster,
            Arc::new(LogReporter::new("main")),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();
        let barrier = Arc::clone(fleet.barrier());

        let summaries: Vec<WorkerSummary> =
            fleet.join().into_iter().map(Result::unwrap).collect();

        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.rounds == 2 && s.final_phase == 1));
        assert!(barrier.is_terminated());
        assert_eq!(cluster.simulated_reader().read_count(), 6);
    }

    #[test]
    fn test_producer_role_rejected() {
        let cluster = SimulatedCluster::new(vigil_core::TopologySnapshot::default());
        let result = Fleet::start(
            &config(vec![Role::Producer]),
            &cluster,
            Arc::new(LogReporter::new("main")),
            Arc::new(AtomicBool::new(false)),
        );
        assert!(matches!(result, Err(FleetError::UnsupportedRole { .. })));
    }
}
