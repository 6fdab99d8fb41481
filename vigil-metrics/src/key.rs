//! Metric keys and their registry encoding.
//!
//! A key encodes to a JSON object `{"name":"Consumer.Topic.Latency","tag":"orders"}`.
//! The encoding is the registry lookup key, so it must stay byte-stable.

use std::fmt;

use serde_json::json;
use vigil_core::{Role, TopicPartition, SCOPE_ALL};

/// Category of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Latency across every probed partition.
    Latency,
    /// Latency across the partitions of one topic.
    TopicLatency,
    /// Latency of one partition.
    PartitionLatency,
    /// Fraction of successful probes.
    Availability,
}

impl MetricKind {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Latency => "Latency",
            Self::TopicLatency => "Topic.Latency",
            Self::PartitionLatency => "Partition.Latency",
            Self::Availability => "Availability",
        }
    }
}

/// Identity of one metric instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricKey {
    role: Role,
    kind: MetricKind,
    scope: String,
}

impl MetricKey {
    /// Creates a key.
    #[must_use]
    pub fn new(role: Role, kind: MetricKind, scope: impl Into<String>) -> Self {
        Self {
            role,
            kind,
            scope: scope.into(),
        }
    }

    /// Role-wide latency key.
    #[must_use]
    pub fn latency(role: Role) -> Self {
        Self::new(role, MetricKind::Latency, SCOPE_ALL)
    }

    /// Per-topic latency key.
    #[must_use]
    pub fn topic_latency(role: Role, topic: &str) -> Self {
        Self::new(role, MetricKind::TopicLatency, topic)
    }

    /// Per-partition latency key, scoped `topic-partition`.
    #[must_use]
    pub fn partition_latency(role: Role, partition: &TopicPartition) -> Self {
        Self::new(role, MetricKind::PartitionLatency, partition.to_string())
    }

    /// Role-wide availability key.
    #[must_use]
    pub fn availability(role: Role) -> Self {
        Self::new(role, MetricKind::Availability, SCOPE_ALL)
    }

    /// Returns the role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Returns the metric kind.
    #[must_use]
    pub const fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Returns the scope tag.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Returns the dotted metric name, e.g. `Consumer.Topic.Latency`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}.{}", self.role.metric_prefix(), self.kind.suffix())
    }

    /// Returns the registry key.
    #[must_use]
    pub fn encode(&self) -> String {
        json!({ "name": self.name(), "tag": self.scope }).to_string()
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_is_stable() {
        assert_eq!(
            MetricKey::latency(Role::Consumer).encode(),
            r#"{"name":"Consumer.Latency","tag":"all"}"#
        );
        assert_eq!(
            MetricKey::topic_latency(Role::Consumer, "orders").encode(),
            r#"{"name":"Consumer.Topic.Latency","tag":"orders"}"#
        );
        assert_eq!(
            MetricKey::partition_latency(Role::Consumer, &TopicPartition::new("orders", 4)).encode(),
            r#"{"name":"Consumer.Partition.Latency","tag":"orders-4"}"#
        );
        assert_eq!(
            MetricKey::availability(Role::Metadata).encode(),
            r#"{"name":"Metadata.Availability","tag":"all"}"#
        );
    }

    #[test]
    fn test_scope_is_escaped() {
        let key = MetricKey::topic_latency(Role::Consumer, "we\"ird");
        assert_eq!(
            key.encode(),
            r#"{"name":"Consumer.Topic.Latency","tag":"we\"ird"}"#
        );
    }

    #[test]
    fn test_equal_keys_encode_equal() {
        let a = MetricKey::topic_latency(Role::Consumer, "t");
        let b = MetricKey::new(Role::Consumer, MetricKind::TopicLatency, "t");
        assert_eq!(a, b);
        assert_eq!(a.encode(), b.encode());
        assert_eq!(a.to_string(), a.encode());
    }
}
