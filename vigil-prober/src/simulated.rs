//! Simulated collaborators for deterministic testing.
//!
//! In-memory topology, peer directory and partition reader with
//! configurable fault injection. No broker is contacted.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use vigil_core::{ClientError, PeerList, TopicPartition, TopologySnapshot};

use crate::fleet::ClientFactory;
use crate::probe::PartitionReader;
use crate::topology::{PeerDirectory, TopologySource};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory topology source.
#[derive(Debug, Default)]
pub struct SimulatedTopology {
    snapshot: Mutex<TopologySnapshot>,
    unavailable: AtomicBool,
    fetches: AtomicU64,
    closes: AtomicU64,
}

impl SimulatedTopology {
    /// Creates a source serving `snapshot`.
    #[must_use]
    pub fn new(snapshot: TopologySnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            ..Self::default()
        }
    }

    /// Replaces the served topology.
    pub fn set_topology(&self, snapshot: TopologySnapshot) {
        *lock(&self.snapshot) = snapshot;
    }

    /// Makes every fetch fail until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the number of fetches attempted.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Returns the number of times the source was released.
    #[must_use]
    pub fn close_count(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }
}

impl TopologySource for SimulatedTopology {
    fn list_all_topic_partitions(&self) -> Result<TopologySnapshot, ClientError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::unavailable("simulated topology outage"));
        }
        Ok(lock(&self.snapshot).clone())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Peer directory whose membership can change between rounds.
#[derive(Debug, Default)]
pub struct SimulatedPeers {
    peers: Mutex<PeerList>,
    unavailable: AtomicBool,
}

impl SimulatedPeers {
    /// Creates a directory serving `peers`.
    #[must_use]
    pub fn new(peers: PeerList) -> Self {
        Self {
            peers: Mutex::new(peers),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Replaces the peer list.
    pub fn set_peers(&self, peers: PeerList) {
        *lock(&self.peers) = peers;
    }

    /// Makes every lookup fail until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl PeerDirectory for SimulatedPeers {
    fn peers(&self) -> Result<PeerList, ClientError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::unavailable("simulated discovery outage"));
        }
        Ok(lock(&self.peers).clone())
    }
}

/// Fault injection for [`SimulatedReader`].
#[derive(Debug, Clone, Default)]
pub struct ReadFaults {
    /// Partitions whose reads always fail.
    pub failing: BTreeSet<TopicPartition>,
    /// If true, every read fails.
    pub fail_all: bool,
    /// Delay added to every read.
    pub latency: Option<Duration>,
}

impl ReadFaults {
    /// Creates a fault config with no faults.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Fails every read of `partition`.
    #[must_use]
    pub fn with_failing(mut self, partition: TopicPartition) -> Self {
        self.failing.insert(partition);
        self
    }

    /// Fails every read.
    #[must_use]
    pub fn with_fail_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Delays every read by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

/// In-memory partition reader that records every read.
#[derive(Debug, Default)]
pub struct SimulatedReader {
    faults: Mutex<ReadFaults>,
    reads: Mutex<Vec<TopicPartition>>,
    failures: AtomicU64,
}

impl SimulatedReader {
    /// Creates a reader with no faults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reader with `faults`.
    #[must_use]
    pub fn with_faults(faults: ReadFaults) -> Self {
        Self {
            faults: Mutex::new(faults),
            ..Self::default()
        }
    }

    /// Fails every later read of `partition`.
    pub fn fail_partition(&self, partition: TopicPartition) {
        lock(&self.faults).failing.insert(partition);
    }

    /// Replaces the fault config.
    pub fn set_faults(&self, faults: ReadFaults) {
        *lock(&self.faults) = faults;
    }

    /// Returns every partition read so far, in order.
    #[must_use]
    pub fn reads(&self) -> Vec<TopicPartition> {
        lock(&self.reads).clone()
    }

    /// Returns the number of reads attempted.
    #[must_use]
    pub fn read_count(&self) -> usize {
        lock(&self.reads).len()
    }

    /// Returns the number of injected failures.
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }
}

impl PartitionReader for SimulatedReader {
    fn read_one(&self, partition: &TopicPartition) -> Result<(), ClientError> {
        lock(&self.reads).push(partition.clone());
        let faults = lock(&self.faults).clone();

        if let Some(latency) = faults.latency {
            std::thread::sleep(latency);
        }
        if faults.fail_all || faults.failing.contains(partition) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(ClientError::unavailable(format!(
                "simulated read failure on {partition}"
            )));
        }
        Ok(())
    }
}

/// Client factory handing out shared simulated collaborators.
///
/// Every role sees the same topology and reader, so faults injected through
/// the accessors apply to all of them.
#[derive(Debug, Clone)]
pub struct SimulatedCluster {
    topology: Arc<SimulatedTopology>,
    reader: Arc<SimulatedReader>,
    peers: Option<Arc<SimulatedPeers>>,
}

impl SimulatedCluster {
    /// Creates a cluster serving `snapshot`, using the configured peer list.
    #[must_use]
    pub fn new(snapshot: TopologySnapshot) -> Self {
        Self {
            topology: Arc::new(SimulatedTopology::new(snapshot)),
            reader: Arc::new(SimulatedReader::new()),
            peers: None,
        }
    }

    /// Serves peers from `peers` instead of the configured list.
    #[must_use]
    pub fn with_peers(mut self, peers: Arc<SimulatedPeers>) -> Self {
        self.peers = Some(peers);
        self
    }

    /// Returns the shared topology.
    #[must_use]
    pub const fn simulated_topology(&self) -> &Arc<SimulatedTopology> {
        &self.topology
    }

    /// Returns the shared reader.
    #[must_use]
    pub const fn simulated_reader(&self) -> &Arc<SimulatedReader> {
        &self.reader
    }
}

impl ClientFactory for SimulatedCluster {
    fn topology(&self) -> Result<Box<dyn TopologySource>, ClientError> {
        Ok(Box::new(Arc::clone(&self.topology)))
    }

    fn reader(&self) -> Result<Box<dyn PartitionReader>, ClientError> {
        Ok(Box::new(Arc::clone(&self.reader)))
    }

    fn peers(&self, configured: &PeerList) -> Box<dyn PeerDirectory> {
        match &self.peers {
            Some(peers) => Box::new(Arc::clone(peers)),
            None => Box::new(configured.clone()),
        }
    }
}
