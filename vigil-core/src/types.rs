//! Strongly-typed topology and identity types.
//!
//! A topology snapshot is an ordered list of topics, each with an ordered list
//! of partitions. Order matters: shard assignment is computed from positions
//! in these lists, so every instance must observe the same order.

use std::fmt;
use std::str::FromStr;


/// A single partition of a topic.
///
/// Identity is value equality on `(topic, partition)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TopicPartition {
    topic: String,
    partition: i32,
}

impl TopicPartition {
    /// Creates a new topic partition.
    #[must_use]
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }

    /// Returns the topic name.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the partition id.
    #[must_use]
    pub const fn partition(&self) -> i32 {
        self.partition
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

/// A topic and its partitions, as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMetadata {
    name: String,
    partitions: Vec<i32>,
}

impl TopicMetadata {
    /// Creates topic metadata from a name and its partition ids.
    #[must_use]
    pub fn new(name: impl Into<String>, partitions: Vec<i32>) -> Self {
        Self {
            name: name.into(),
            partitions,
        }
    }

    /// Creates topic metadata with partitions `0..count`.
    #[must_use]
    pub fn with_partition_count(name: impl Into<String>, count: i32) -> Self {
        Self::new(name, (0..count.max(0)).collect())
    }

    /// Returns the topic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the partition ids in cluster order.
    #[must_use]
    pub fn partitions(&self) -> &[i32] {
        &self.partitions
    }

    /// Returns the number of partitions.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Iterates over this topic's partitions as `TopicPartition`s.
    pub fn topic_partitions(&self) -> impl Iterator<Item = TopicPartition> + '_ {
        self.partitions
            .iter()
            .map(|&partition| TopicPartition::new(self.name.clone(), partition))
    }
}

/// An ordered view of every topic in the cluster at one instant.
///
/// Fetched fresh each round; never cached across rounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologySnapshot {
    topics: Vec<TopicMetadata>,
}

impl TopologySnapshot {
    /// Creates a snapshot from topics in cluster order.
    #[must_use]
    pub const fn new(topics: Vec<TopicMetadata>) -> Self {
        Self { topics }
    }

    /// Returns the topics in cluster order.
    #[must_use]
    pub fn topics(&self) -> &[TopicMetadata] {
        &self.topics
    }

    /// Returns the number of topics.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Returns the total number of partitions across all topics.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.topics.iter().map(TopicMetadata::partition_count).sum()
    }

    /// Returns true if the snapshot has no topics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Returns the position of a topic in the full topic list.
    #[must_use]
    pub fn index_of(&self, topic: &str) -> Option<usize> {
        self.topics.iter().position(|t| t.name == topic)
    }
}

impl FromIterator<TopicMetadata> for TopologySnapshot {
    fn from_iter<I: IntoIterator<Item = TopicMetadata>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Ordered list of peer service instances.
///
/// Every instance in the fleet must be configured with the same list in the
/// same order; the position of an address is its shard index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerList {
    peers: Vec<String>,
}

impl PeerList {
    /// Creates a peer list in the given order.
    #[must_use]
    pub const fn new(peers: Vec<String>) -> Self {
        Self { peers }
    }

    /// Returns the position of `address`, if present.
    #[must_use]
    pub fn index_of(&self, address: &str) -> Option<usize> {
        self.peers.iter().position(|p| p == address)
    }

    /// Returns true if `address` is in the list.
    #[must_use]
    pub fn contains(&self, address: &str) -> bool {
        self.index_of(address).is_some()
    }

    /// Returns the number of peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Returns true if there are no peers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Iterates over peer addresses in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.peers.iter().map(String::as_str)
    }

    /// Returns the first address listed more than once.
    ///
    /// A repeated address makes its later positions unreachable by
    /// [`index_of`](Self::index_of), so their shards have no owner.
    #[must_use]
    pub fn first_duplicate(&self) -> Option<&str> {
        self.peers
            .iter()
            .enumerate()
            .find(|(i, peer)| self.peers[..*i].contains(peer))
            .map(|(_, peer)| peer.as_str())
    }
}

impl<S: Into<String>> FromIterator<S> for PeerList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// A worker role. Each role runs on its own thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Reads from every assigned partition.
    Consumer,
    /// Writes to the cluster.
    Producer,
    /// Fetches cluster metadata.
    Metadata,
}

impl Role {
    /// Returns the metric name prefix for this role.
    #[must_use]
    pub const fn metric_prefix(self) -> &'static str {
        match self {
            Self::Consumer => "Consumer",
            Self::Producer => "Producer",
            Self::Metadata => "Metadata",
        }
    }

    /// Returns the lowercase role name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Consumer => "consumer",
            Self::Producer => "producer",
            Self::Metadata => "metadata",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}', expected one of: consumer, producer, metadata")]
pub struct RoleParseError(pub String);

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "consumer" => Ok(Self::Consumer),
            "producer" => Ok(Self::Producer),
            "metadata" => Ok(Self::Metadata),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_partition_display() {
        let tp = TopicPartition::new("orders", 3);
        assert_eq!(tp.to_string(), "orders-3");
        assert_eq!(tp.topic(), "orders");
        assert_eq!(tp.partition(), 3);
    }

    #[test]
    fn test_topic_partition_value_equality() {
        assert_eq!(TopicPartition::new("a", 1), TopicPartition::new("a", 1));
        assert_ne!(TopicPartition::new("a", 1), TopicPartition::new("a", 2));
    }

    #[test]
    fn test_snapshot_counts() {
        let snapshot: TopologySnapshot = vec![
            TopicMetadata::with_partition_count("a", 2),
            TopicMetadata::with_partition_count("b", 3),
        ]
        .into_iter()
        .collect();

        assert_eq!(snapshot.topic_count(), 2);
        assert_eq!(snapshot.partition_count(), 5);
        assert_eq!(snapshot.index_of("b"), Some(1));
        assert_eq!(snapshot.index_of("c"), None);
    }

    #[test]
    fn test_topic_partitions_keep_order() {
        let topic = TopicMetadata::new("t", vec![2, 0, 1]);
        let ids: Vec<i32> = topic.topic_partitions().map(|tp| tp.partition()).collect();
        assert_eq!(ids, vec![2, 0, 1]);
    }

    #[test]
    fn test_negative_partition_count_is_empty() {
        assert_eq!(TopicMetadata::with_partition_count("t", -1).partition_count(), 0);
    }

    #[test]
    fn test_peer_list_index() {
        let peers: PeerList = ["host-a:8080", "host-b:8080"].into_iter().collect();
        assert_eq!(peers.index_of("host-b:8080"), Some(1));
        assert!(!peers.contains("host-c:8080"));
        assert_eq!(peers.len(), 2);
    }

    #[test]
    fn test_peer_list_first_duplicate() {
        let unique: PeerList = ["a", "b", "c"].into_iter().collect();
        assert_eq!(unique.first_duplicate(), None);

        let repeated: PeerList = ["a", "b", "a", "b"].into_iter().collect();
        assert_eq!(repeated.first_duplicate(), Some("a"));
        assert_eq!(repeated.index_of("a"), Some(0));
        assert!(PeerList::default().first_duplicate().is_none());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Consumer".parse::<Role>().unwrap(), Role::Consumer);
        assert_eq!("metadata".parse::<Role>().unwrap(), Role::Metadata);
        assert!("admin".parse::<Role>().is_err());
        assert_eq!(Role::Consumer.metric_prefix(), "Consumer");
        assert_eq!(Role::Metadata.to_string(), "metadata");
    }
}
