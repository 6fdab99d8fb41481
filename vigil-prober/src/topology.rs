//! Topology and peer-list collaborators.

use std::sync::Arc;

use tracing::debug;
use vigil_core::{ClientError, PeerList, TopologySnapshot};

/// Source of cluster topology.
///
/// Topics and partitions must come back in an order every instance agrees on.
pub trait TopologySource: Send + Sync {
    /// Lists every topic with its partitions.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster cannot be reached.
    fn list_all_topic_partitions(&self) -> Result<TopologySnapshot, ClientError>;

    /// Releases resources held for the current round.
    fn close(&self) {}
}

impl<T: TopologySource + ?Sized> TopologySource for Box<T> {
    fn list_all_topic_partitions(&self) -> Result<TopologySnapshot, ClientError> {
        (**self).list_all_topic_partitions()
    }

    fn close(&self) {
        (**self).close();
    }
}

impl<T: TopologySource + ?Sized> TopologySource for Arc<T> {
    fn list_all_topic_partitions(&self) -> Result<TopologySnapshot, ClientError> {
        (**self).list_all_topic_partitions()
    }

    fn close(&self) {
        (**self).close();
    }
}

/// Source of the ordered peer list, re-read every round.
pub trait PeerDirectory: Send + Sync {
    /// Returns the current ordered peer list.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be reached.
    fn peers(&self) -> Result<PeerList, ClientError>;
}

/// A fixed peer list from configuration.
impl PeerDirectory for PeerList {
    fn peers(&self) -> Result<PeerList, ClientError> {
        Ok(self.clone())
    }
}

impl<P: PeerDirectory + ?Sized> PeerDirectory for Box<P> {
    fn peers(&self) -> Result<PeerList, ClientError> {
        (**self).peers()
    }
}

impl<P: PeerDirectory + ?Sized> PeerDirectory for Arc<P> {
    fn peers(&self) -> Result<PeerList, ClientError> {
        (**self).peers()
    }
}

/// Scoped use of a topology source for one round. Closes the source on drop.
pub struct TopologyLease<'a, T: TopologySource + ?Sized> {
    source: &'a T,
}

impl<'a, T: TopologySource + ?Sized> TopologyLease<'a, T> {
    /// Opens a lease over `source`.
    pub const fn new(source: &'a T) -> Self {
        Self { source }
    }

    /// Fetches the topology through the leased source.
    ///
    /// # Errors
    ///
    /// Returns the source's error.
    pub fn list_all_topic_partitions(&self) -> Result<TopologySnapshot, ClientError> {
        self.source.list_all_topic_partitions()
    }
}

impl<T: TopologySource + ?Sized> Drop for TopologyLease<'_, T> {
    fn drop(&mut self) {
        debug!("releasing topology source");
        self.source.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use vigil_core::TopicMetadata;

    use super::*;

    #[derive(Default)]
    struct CountingSource {
        closes: AtomicUsize,
        fail: bool,
    }

    impl TopologySource for CountingSource {
        fn list_all_topic_partitions(&self) -> Result<TopologySnapshot, ClientError> {
            if self.fail {
                return Err(ClientError::unavailable("zookeeper down"));
            }
            Ok(vec![TopicMetadata::with_partition_count("t", 1)].into_iter().collect())
        }

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_lease_closes_on_success() {
        let source = CountingSource::default();
        {
            let lease = TopologyLease::new(&source);
            assert_eq!(lease.list_all_topic_partitions().unwrap().topic_count(), 1);
        }
        assert_eq!(source.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lease_closes_on_failure() {
        let source = CountingSource {
            fail: true,
            ..CountingSource::default()
        };
        let result = TopologyLease::new(&source).list_all_topic_partitions();
        assert!(result.is_err());
        assert_eq!(source.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_static_peer_directory() {
        let peers: PeerList = ["a", "b"].into_iter().collect();
        assert_eq!(peers.peers().unwrap(), peers);
    }
}
