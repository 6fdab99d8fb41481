//! Prober configuration.
//!
//! Two layers: [`AppProperties`], the JSON switches deciding which metric
//! categories are published, and [`ProberConfig`], the full runtime
//! configuration assembled from the command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vigil_core::{PeerList, Role};
use vigil_metrics::ReportFlags;

use crate::kafka::KafkaSettings;
use crate::worker::WorkerOptions;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The properties file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The properties file is not valid JSON for [`AppProperties`].
    #[error("failed to parse app properties: {0}")]
    Parse(#[from] serde_json::Error),

    /// A setting is out of range or inconsistent.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// Error description.
        message: String,
    },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Metric publication switches, read from `appProperties.json`.
///
/// Every switch defaults to `true`; keys missing from the file keep the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppProperties {
    /// Publish `Consumer.Latency`.
    pub send_consumer_latency: bool,
    /// Publish `Consumer.Topic.Latency` per topic.
    pub send_consumer_topic_latency: bool,
    /// Publish `Consumer.Partition.Latency` per partition.
    pub send_consumer_partition_latency: bool,
    /// Publish `Consumer.Availability`.
    pub send_consumer_availability: bool,
    /// Publish `Metadata.Latency`.
    pub send_metadata_latency: bool,
    /// Publish `Metadata.Availability`.
    pub send_metadata_availability: bool,
    /// Deployment environment, used to tag reports.
    pub environment_name: Option<String>,
}

impl Default for AppProperties {
    fn default() -> Self {
        Self {
            send_consumer_latency: true,
            send_consumer_topic_latency: true,
            send_consumer_partition_latency: true,
            send_consumer_availability: true,
            send_metadata_latency: true,
            send_metadata_availability: true,
            environment_name: None,
        }
    }
}

impl AppProperties {
    /// Loads properties from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parses properties from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid properties object.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Returns which metric categories `role` publishes.
    #[must_use]
    pub const fn report_flags(&self, role: Role) -> ReportFlags {
        match role {
            Role::Consumer => ReportFlags {
                latency: self.send_consumer_latency,
                topic_latency: self.send_consumer_topic_latency,
                partition_latency: self.send_consumer_partition_latency,
                availability: self.send_consumer_availability,
            },
            Role::Metadata => ReportFlags {
                latency: self.send_metadata_latency,
                topic_latency: false,
                partition_latency: false,
                availability: self.send_metadata_availability,
            },
            Role::Producer => ReportFlags::none(),
        }
    }
}

/// Runtime configuration for one prober instance.
#[derive(Debug, Clone)]
pub struct ProberConfig {
    /// Name of the monitored cluster.
    pub cluster_name: String,
    /// Kafka bootstrap servers.
    pub bootstrap_servers: String,
    /// Ordered list of every prober instance. Empty means run alone.
    pub peers: PeerList,
    /// This instance's address as it appears in `peers`.
    pub service_address: String,
    /// Roles to run, one worker each.
    pub roles: Vec<Role>,
    /// Metric publication switches.
    pub properties: AppProperties,
    /// Bound on a metadata fetch.
    pub metadata_timeout: Duration,
    /// Bound on a probe read.
    pub read_timeout: Duration,
    /// Pause between synchronized rounds.
    pub round_interval: Duration,
    /// Stop after this many rounds.
    pub max_rounds: Option<u64>,
    /// Whether `__`-prefixed topics are probed.
    pub include_internal_topics: bool,
}

impl ProberConfig {
    /// Creates a configuration running the consumer role with defaults.
    #[must_use]
    pub fn new(
        cluster_name: impl Into<String>,
        bootstrap_servers: impl Into<String>,
        service_address: impl Into<String>,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            bootstrap_servers: bootstrap_servers.into(),
            peers: PeerList::default(),
            service_address: service_address.into(),
            roles: vec![Role::Consumer],
            properties: AppProperties::default(),
            metadata_timeout: KafkaSettings::DEFAULT_METADATA_TIMEOUT,
            read_timeout: KafkaSettings::DEFAULT_READ_TIMEOUT,
            round_interval: WorkerOptions::DEFAULT_ROUND_INTERVAL,
            max_rounds: None,
            include_internal_topics: false,
        }
    }

    /// Sets the peer list.
    #[must_use]
    pub fn with_peers(mut self, peers: PeerList) -> Self {
        self.peers = peers;
        self
    }

    /// Sets the roles to run.
    #[must_use]
    pub fn with_roles(mut self, roles: Vec<Role>) -> Self {
        self.roles = roles;
        self
    }

    /// Sets the publication switches.
    #[must_use]
    pub fn with_properties(mut self, properties: AppProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Sets the client timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, metadata: Duration, read: Duration) -> Self {
        self.metadata_timeout = metadata;
        self.read_timeout = read;
        self
    }

    /// Sets the pause between rounds.
    #[must_use]
    pub fn with_round_interval(mut self, interval: Duration) -> Self {
        self.round_interval = interval;
        self
    }

    /// Sets the round limit.
    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: Option<u64>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Sets whether internal topics are probed.
    #[must_use]
    pub fn with_internal_topics(mut self, include: bool) -> Self {
        self.include_internal_topics = include;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a required setting is empty, a role is not
    /// supported, a limit is zero, or the peer list does not contain this
    /// instance.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster_name.trim().is_empty() {
            return Err(ConfigError::invalid("cluster name must not be empty"));
        }
        if self.bootstrap_servers.trim().is_empty() {
            return Err(ConfigError::invalid("bootstrap servers must not be empty"));
        }
        if self.roles.is_empty() {
            return Err(ConfigError::invalid("at least one role is required"));
        }
        if self.roles.contains(&Role::Producer) {
            return Err(ConfigError::invalid("the producer role is not supported"));
        }
        let mut roles = self.roles.clone();
        roles.sort_by_key(|role| role.as_str());
        roles.dedup();
        if roles.len() != self.roles.len() {
            return Err(ConfigError::invalid("each role may be given once"));
        }
        if self.metadata_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(ConfigError::invalid("client timeouts must be non-zero"));
        }
        if self.max_rounds == Some(0) {
            return Err(ConfigError::invalid("max rounds must be at least 1"));
        }
        if let Some(peer) = self.peers.first_duplicate() {
            return Err(ConfigError::invalid(format!(
                "peer {peer} is listed more than once"
            )));
        }
        if !self.peers.is_empty() && !self.peers.contains(&self.service_address) {
            return Err(ConfigError::invalid(format!(
                "service address {} is not in the peer list of {} instances",
                self.service_address,
                self.peers.len()
            )));
        }
        Ok(())
    }

    /// Returns the Kafka client settings.
    #[must_use]
    pub fn kafka_settings(&self) -> KafkaSettings {
        KafkaSettings {
            metadata_timeout: self.metadata_timeout,
            read_timeout: self.read_timeout,
            include_internal_topics: self.include_internal_topics,
            ..KafkaSettings::new(
                self.bootstrap_servers.clone(),
                format!("vigil-{}", self.cluster_name),
            )
        }
    }

    /// Returns the worker loop controls.
    #[must_use]
    pub const fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            round_interval: self.round_interval,
            max_rounds: self.max_rounds,
        }
    }

    /// Returns the label reports are tagged with.
    #[must_use]
    pub fn report_label(&self) -> String {
        match &self.properties.environment_name {
            Some(env) => format!("{env}.{}", self.cluster_name),
            None => self.cluster_name.clone(),
        }
    }
}
