//! Kafka-backed collaborators built on `rdkafka`.
//!
//! Both adapters use a blocking [`BaseConsumer`]; every call is bounded by the
//! configured timeouts.

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::topic_partition_list::{Offset, TopicPartitionList};
use tracing::debug;
use vigil_core::{ClientError, TopicMetadata, TopicPartition, TopologySnapshot};

use crate::fleet::ClientFactory;
use crate::probe::PartitionReader;
use crate::topology::TopologySource;

/// Prefix Kafka uses for its own bookkeeping topics.
const INTERNAL_TOPIC_PREFIX: &str = "__";

/// Connection settings shared by the Kafka adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaSettings {
    /// Comma-separated `host:port` list.
    pub bootstrap_servers: String,
    /// Consumer group id. Offsets are never committed.
    pub group_id: String,
    /// Bound on a cluster metadata fetch.
    pub metadata_timeout: Duration,
    /// Bound on a watermark fetch and on the single poll of a probe.
    pub read_timeout: Duration,
    /// Whether `__`-prefixed topics are probed.
    pub include_internal_topics: bool,
}

impl KafkaSettings {
    /// Default bound on a metadata fetch.
    pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default bound on a probe read.
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates settings for `bootstrap_servers` with default timeouts.
    #[must_use]
    pub fn new(bootstrap_servers: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            group_id: group_id.into(),
            metadata_timeout: Self::DEFAULT_METADATA_TIMEOUT,
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
            include_internal_topics: false,
        }
    }

    fn consumer(&self) -> Result<BaseConsumer, ClientError> {
        ClientConfig::new()
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false")
            .set("auto.offset.reset", "latest")
            .create()
            .map_err(ClientError::broker)
    }
}

/// Each role gets its own consumers.
impl ClientFactory for KafkaSettings {
    fn topology(&self) -> Result<Box<dyn TopologySource>, ClientError> {
        Ok(Box::new(KafkaTopologySource::new(self)?))
    }

    fn reader(&self) -> Result<Box<dyn PartitionReader>, ClientError> {
        Ok(Box::new(KafkaPartitionReader::new(self)?))
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

/// Reads cluster topology from broker metadata.
pub struct KafkaTopologySource {
    consumer: BaseConsumer,
    timeout: Duration,
    include_internal_topics: bool,
}

impl KafkaTopologySource {
    /// Creates a topology source.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created.
    pub fn new(settings: &KafkaSettings) -> Result<Self, ClientError> {
        Ok(Self {
            consumer: settings.consumer()?,
            timeout: settings.metadata_timeout,
            include_internal_topics: settings.include_internal_topics,
        })
    }
}

impl TopologySource for KafkaTopologySource {
    fn list_all_topic_partitions(&self) -> Result<TopologySnapshot, ClientError> {
        let metadata = self
            .consumer
            .fetch_metadata(None, self.timeout)
            .map_err(ClientError::broker)?;

        let mut topics: Vec<TopicMetadata> = metadata
            .topics()
            .iter()
            .filter(|topic| {
                self.include_internal_topics || !topic.name().starts_with(INTERNAL_TOPIC_PREFIX)
            })
            .map(|topic| {
                let mut partitions: Vec<i32> =
                    topic.partitions().iter().map(|p| p.id()).collect();
                partitions.sort_unstable();
                TopicMetadata::new(topic.name(), partitions)
            })
            .collect();
        topics.sort_by(|a, b| a.name().cmp(b.name()));

        debug!(
            brokers = metadata.brokers().len(),
            topics = topics.len(),
            "fetched cluster metadata"
        );
        Ok(TopologySnapshot::new(topics))
    }
}

/// Reads the newest message of a partition.
pub struct KafkaPartitionReader {
    consumer: BaseConsumer,
    timeout: Duration,
}

impl KafkaPartitionReader {
    /// Creates a reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created.
    pub fn new(settings: &KafkaSettings) -> Result<Self, ClientError> {
        Ok(Self {
            consumer: settings.consumer()?,
            timeout: settings.read_timeout,
        })
    }
}

impl PartitionReader for KafkaPartitionReader {
    fn read_one(&self, partition: &TopicPartition) -> Result<(), ClientError> {
        let (low, high) = self
            .consumer
            .fetch_watermarks(partition.topic(), partition.partition(), self.timeout)
            .map_err(ClientError::broker)?;

        // An empty partition answered the watermark request; that is the read.
        if high <= low {
            debug!(%partition, low, high, "partition is empty");
            return Ok(());
        }

        let mut assignment = TopicPartitionList::new();
        assignment
            .add_partition_offset(
                partition.topic(),
                partition.partition(),
                Offset::Offset(high - 1),
            )
            .map_err(ClientError::broker)?;
        self.consumer.assign(&assignment).map_err(ClientError::broker)?;

        match self.consumer.poll(self.timeout) {
            Some(Ok(_)) => Ok(()),
            Some(Err(err)) => Err(ClientError::broker(err)),
            None => Err(ClientError::Timeout {
                operation: "poll",
                waited_ms: millis(self.timeout),
            }),
        }
    }
}
