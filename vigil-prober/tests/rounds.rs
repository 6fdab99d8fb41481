//! End-to-end consumer rounds against simulated collaborators.

use std::collections::BTreeSet;
use std::sync::Arc;

use vigil_core::{PeerList, Role, SetupError, TopicMetadata, TopicPartition, TopologySnapshot};
use vigil_metrics::{InstrumentSnapshot, MetricKey, MetricRegistrar, MetricRegistry, ReportFlags};
use vigil_prober::simulated::{SimulatedPeers, SimulatedReader, SimulatedTopology};
use vigil_prober::{Round, RoundCoordinator};

const SELF: &str = "vigil-0:8080";
const OTHER: &str = "vigil-1:8080";

fn topology(topics: usize, partitions: i32) -> TopologySnapshot {
    (0..topics)
        .map(|i| TopicMetadata::with_partition_count(format!("topic-{i}"), partitions))
        .collect()
}

fn fleet() -> PeerList {
    [SELF, OTHER].into_iter().collect()
}

fn registrar(registry: &Arc<MetricRegistry>) -> MetricRegistrar {
    MetricRegistrar::new(Arc::clone(registry), Role::Consumer, ReportFlags::all())
}

fn gauge_value(registry: &MetricRegistry, key: &MetricKey) -> Option<f64> {
    match registry.get(&key.encode())?.snapshot() {
        InstrumentSnapshot::Gauge(value) => Some(value),
        InstrumentSnapshot::Histogram(_) => None,
    }
}

#[test]
fn test_two_instances_cover_topology_once() {
    let topology = Arc::new(SimulatedTopology::new(topology(5, 3)));
    let reader = Arc::new(SimulatedReader::new());

    for address in [SELF, OTHER] {
        let registry = Arc::new(MetricRegistry::new());
        let mut round = RoundCoordinator::new(
            Arc::clone(&topology),
            fleet(),
            address,
            Arc::clone(&reader),
            registrar(&registry),
        );
        round.run_round().unwrap();
    }

    let reads = reader.reads();
    let unique: BTreeSet<TopicPartition> = reads.iter().cloned().collect();
    assert_eq!(reads.len(), 15);
    assert_eq!(unique.len(), 15);
}

#[test]
fn test_one_failed_partition_of_four() {
    let registry = Arc::new(MetricRegistry::new());
    let reader = SimulatedReader::new();
    reader.fail_partition(TopicPartition::new("topic-0", 1));
    let mut round = RoundCoordinator::new(
        SimulatedTopology::new(topology(4, 2)),
        fleet(),
        SELF,
        reader,
        registrar(&registry),
    );

    let outcome = round.run_round().unwrap();

    assert_eq!(outcome.assigned_topics, 2);
    assert_eq!(outcome.assigned_partitions, 4);
    assert_eq!(outcome.try_count, 4);
    assert_eq!(outcome.fail_count, 1);
    assert_eq!(outcome.availability, Some(0.75));
    assert_eq!(
        gauge_value(&registry, &MetricKey::availability(Role::Consumer)),
        Some(0.75)
    );

    let failed = MetricKey::partition_latency(Role::Consumer, &TopicPartition::new("topic-0", 1));
    match registry.get(&failed.encode()).unwrap().snapshot() {
        InstrumentSnapshot::Histogram(snapshot) => assert!(snapshot.min >= 60_000),
        InstrumentSnapshot::Gauge(_) => panic!("expected a histogram"),
    }
}

#[test]
fn test_availability_gauge_follows_latest_round() {
    let registry = Arc::new(MetricRegistry::new());
    let reader = Arc::new(SimulatedReader::new());
    let mut round = RoundCoordinator::new(
        SimulatedTopology::new(topology(2, 2)),
        PeerList::default(),
        SELF,
        Arc::clone(&reader),
        registrar(&registry),
    );
    let key = MetricKey::availability(Role::Consumer);

    round.run_round().unwrap();
    assert_eq!(gauge_value(&registry, &key), Some(1.0));

    reader.fail_partition(TopicPartition::new("topic-1", 0));
    round.run_round().unwrap();
    assert_eq!(gauge_value(&registry, &key), Some(0.75));
}

#[test]
fn test_topology_growth_registers_new_windows_only() {
    let registry = Arc::new(MetricRegistry::new());
    let topology = Arc::new(SimulatedTopology::new(topology(1, 1)));
    let mut round = RoundCoordinator::new(
        Arc::clone(&topology),
        PeerList::default(),
        SELF,
        SimulatedReader::new(),
        registrar(&registry),
    );

    round.run_round().unwrap();
    // global, topic, partition, availability
    assert_eq!(registry.len(), 4);

    topology.set_topology(topology_with(&[1, 2]));
    round.run_round().unwrap();
    // one more topic window and two more partition windows
    assert_eq!(registry.len(), 7);

    round.run_round().unwrap();
    assert_eq!(registry.len(), 7);
}

fn topology_with(partition_counts: &[i32]) -> TopologySnapshot {
    partition_counts
        .iter()
        .enumerate()
        .map(|(i, &count)| TopicMetadata::with_partition_count(format!("topic-{i}"), count))
        .collect()
}

#[test]
fn test_peer_list_change_reshards_next_round() {
    let registry = Arc::new(MetricRegistry::new());
    let peers = Arc::new(SimulatedPeers::new([SELF].into_iter().collect()));
    let mut round = RoundCoordinator::new(
        SimulatedTopology::new(topology(4, 1)),
        Arc::clone(&peers),
        SELF,
        SimulatedReader::new(),
        registrar(&registry),
    );

    assert_eq!(round.run_round().unwrap().assigned_topics, 4);

    peers.set_peers(fleet());
    assert_eq!(round.run_round().unwrap().assigned_topics, 2);

    peers.set_peers([OTHER].into_iter().collect());
    assert!(matches!(
        round.run_round().unwrap_err(),
        SetupError::NotInPeerList { .. }
    ));
}

#[test]
fn test_setup_failure_skips_probing_and_releases_topology() {
    let registry = Arc::new(MetricRegistry::new());
    let topology = Arc::new(SimulatedTopology::new(topology(2, 2)));
    let reader = Arc::new(SimulatedReader::new());
    topology.set_unavailable(true);
    let mut round = RoundCoordinator::new(
        Arc::clone(&topology),
        fleet(),
        SELF,
        Arc::clone(&reader),
        registrar(&registry),
    );

    let err = round.run_round().unwrap_err();

    assert_eq!(err.error_code(), -1);
    assert_eq!(reader.read_count(), 0);
    assert_eq!(topology.close_count(), 1);
    // Only the availability gauge, reporting the outage.
    assert_eq!(
        registry.names(),
        vec![MetricKey::availability(Role::Consumer).encode()]
    );
    assert_eq!(
        gauge_value(&registry, &MetricKey::availability(Role::Consumer)),
        Some(0.0)
    );
}

#[test]
fn test_setup_failure_after_good_round_drops_availability() {
    let registry = Arc::new(MetricRegistry::new());
    let topology = Arc::new(SimulatedTopology::new(topology(2, 2)));
    let mut round = RoundCoordinator::new(
        Arc::clone(&topology),
        PeerList::default(),
        SELF,
        SimulatedReader::new(),
        registrar(&registry),
    );
    let key = MetricKey::availability(Role::Consumer);

    round.run_round().unwrap();
    assert_eq!(gauge_value(&registry, &key), Some(1.0));

    topology.set_unavailable(true);
    for _ in 0..3 {
        assert!(round.run_round().is_err());
        assert_eq!(gauge_value(&registry, &key), Some(0.0));
    }

    topology.set_unavailable(false);
    round.run_round().unwrap();
    assert_eq!(gauge_value(&registry, &key), Some(1.0));
}

#[test]
fn test_leaving_peer_list_drops_availability() {
    let registry = Arc::new(MetricRegistry::new());
    let peers = Arc::new(SimulatedPeers::new(fleet()));
    let mut round = RoundCoordinator::new(
        SimulatedTopology::new(topology(4, 1)),
        Arc::clone(&peers),
        SELF,
        SimulatedReader::new(),
        registrar(&registry),
    );
    let key = MetricKey::availability(Role::Consumer);

    round.run_round().unwrap();
    assert_eq!(gauge_value(&registry, &key), Some(1.0));

    peers.set_peers([OTHER].into_iter().collect());
    assert!(round.run_round().is_err());
    assert_eq!(gauge_value(&registry, &key), Some(0.0));
}

#[test]
fn test_discovery_failure_is_setup_error() {
    let registry = Arc::new(MetricRegistry::new());
    let peers = Arc::new(SimulatedPeers::new(fleet()));
    peers.set_unavailable(true);
    let mut round = RoundCoordinator::new(
        SimulatedTopology::new(topology(2, 2)),
        peers,
        SELF,
        SimulatedReader::new(),
        registrar(&registry),
    );

    assert!(matches!(
        round.run_round().unwrap_err(),
        SetupError::Topology(_)
    ));
}
