//! Shard planner - assignment of topics to the local service instance.
//!
//! A topic at position `i` of the full topic list belongs to the peer at
//! position `i mod peer_count`. The topic index is taken against the snapshot
//! fetched for the round, never recomputed per partition, so a topic's
//! partitions always stay together.

use tracing::debug;
use vigil_core::{PeerList, SetupError, TopicMetadata, TopicPartition, TopologySnapshot};

/// Returns the shard index owning the topic at `topic_index`.
///
/// An empty peer list degenerates to a single shard (index 0).
#[inline]
#[must_use]
pub const fn shard_of(topic_index: usize, peer_count: usize) -> usize {
    if peer_count == 0 {
        0
    } else {
        topic_index % peer_count
    }
}

/// Topics assigned to the local instance for one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardAssignment {
    /// Shard index of the local instance.
    local_index: usize,
    /// Number of shards the topology was split into.
    shard_count: usize,
    /// Number of topics in the full topology.
    total_topics: usize,
    /// Assigned topics, in topology order.
    topics: Vec<TopicMetadata>,
}

impl ShardAssignment {
    /// Returns the assigned topics in topology order.
    #[must_use]
    pub fn topics(&self) -> &[TopicMetadata] {
        &self.topics
    }

    /// Returns the number of assigned topics.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Returns the total number of assigned partitions.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.topics.iter().map(TopicMetadata::partition_count).sum()
    }

    /// Returns the number of topics in the full topology.
    #[must_use]
    pub const fn total_topics(&self) -> usize {
        self.total_topics
    }

    /// Returns the local shard index.
    #[must_use]
    pub const fn local_index(&self) -> usize {
        self.local_index
    }

    /// Returns the number of shards.
    #[must_use]
    pub const fn shard_count(&self) -> usize {
        self.shard_count
    }

    /// Returns true if nothing was assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Iterates over every assigned partition, topic by topic.
    pub fn partitions(&self) -> impl Iterator<Item = TopicPartition> + '_ {
        self.topics.iter().flat_map(TopicMetadata::topic_partitions)
    }
}

/// Plans which topics the local instance probes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShardPlanner;

impl ShardPlanner {
    /// Creates a new planner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the shard of `topology` owned by `self_address`.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::NotInPeerList`] if `peers` is non-empty and does
    /// not contain `self_address`.
    pub fn plan(
        &self,
        topology: &TopologySnapshot,
        peers: &PeerList,
        self_address: &str,
    ) -> Result<ShardAssignment, SetupError> {
        let peer_count = peers.len();
        let local_index = if peers.is_empty() {
            0
        } else {
            peers
                .index_of(self_address)
                .ok_or_else(|| SetupError::NotInPeerList {
                    address: self_address.to_string(),
                    peer_count,
                })?
        };

        let topics: Vec<TopicMetadata> = topology
            .topics()
            .iter()
            .enumerate()
            .filter(|(index, _)| shard_of(*index, peer_count) == local_index)
            .map(|(_, topic)| topic.clone())
            .collect();

        debug!(
            self_address,
            local_index,
            peer_count,
            total_topics = topology.topic_count(),
            assigned_topics = topics.len(),
            "planned shard"
        );

        Ok(ShardAssignment {
            local_index,
            shard_count: peer_count.max(1),
            total_topics: topology.topic_count(),
            topics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology(topics: usize, partitions: i32) -> TopologySnapshot {
        (0..topics)
            .map(|i| TopicMetadata::with_partition_count(format!("topic-{i}"), partitions))
            .collect()
    }

    fn names(assignment: &ShardAssignment) -> Vec<&str> {
        assignment.topics().iter().map(TopicMetadata::name).collect()
    }

    #[test]
    fn test_shard_of() {
        assert_eq!(shard_of(0, 3), 0);
        assert_eq!(shard_of(4, 3), 1);
        assert_eq!(shard_of(7, 0), 0);
    }

    #[test]
    fn test_two_peers_even_indices() {
        let peers: PeerList = ["a", "b"].into_iter().collect();
        let assignment = ShardPlanner::new().plan(&topology(4, 2), &peers, "a").unwrap();

        assert_eq!(names(&assignment), vec!["topic-0", "topic-2"]);
        assert_eq!(assignment.partition_count(), 4);
        assert_eq!(assignment.total_topics(), 4);
        assert_eq!(assignment.local_index(), 0);
        assert_eq!(assignment.shard_count(), 2);
    }

    #[test]
    fn test_two_peers_odd_indices() {
        let peers: PeerList = ["a", "b"].into_iter().collect();
        let assignment = ShardPlanner::new().plan(&topology(5, 1), &peers, "b").unwrap();

        assert_eq!(names(&assignment), vec!["topic-1", "topic-3"]);
    }

    #[test]
    fn test_partitions_stay_with_topic() {
        let peers: PeerList = ["a", "b", "c"].into_iter().collect();
        let assignment = ShardPlanner::new().plan(&topology(3, 4), &peers, "c").unwrap();

        let partitions: Vec<TopicPartition> = assignment.partitions().collect();
        assert_eq!(partitions.len(), 4);
        assert!(partitions.iter().all(|tp| tp.topic() == "topic-2"));
    }

    #[test]
    fn test_address_not_in_peers() {
        let peers: PeerList = ["a", "b"].into_iter().collect();
        let err = ShardPlanner::new().plan(&topology(4, 1), &peers, "z").unwrap_err();

        assert!(matches!(
            err,
            SetupError::NotInPeerList { ref address, peer_count: 2 } if address == "z"
        ));
    }

    #[test]
    fn test_empty_peers_single_shard() {
        let assignment = ShardPlanner::new()
            .plan(&topology(3, 2), &PeerList::default(), "anything")
            .unwrap();

        assert_eq!(assignment.topic_count(), 3);
        assert_eq!(assignment.shard_count(), 1);
    }

    #[test]
    fn test_more_peers_than_topics() {
        let peers: PeerList = ["a", "b", "c", "d"].into_iter().collect();
        let assignment = ShardPlanner::new().plan(&topology(2, 1), &peers, "d").unwrap();

        assert!(assignment.is_empty());
        assert_eq!(assignment.partition_count(), 0);
    }

    #[test]
    fn test_empty_topology() {
        let peers: PeerList = ["a"].into_iter().collect();
        let assignment = ShardPlanner::new()
            .plan(&TopologySnapshot::default(), &peers, "a")
            .unwrap();

        assert!(assignment.is_empty());
        assert_eq!(assignment.total_topics(), 0);
    }
}
