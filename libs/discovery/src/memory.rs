//! Embedded in-memory coordination backend.
//!
//! One [`MemoryCluster`] plays the role of the coordination service; every
//! [`MemoryClient`] created from it is an independent session against the
//! same shared namespace. Ephemeral nodes record their owning session and
//! are swept when that session closes, which is all the discovery layer
//! needs from real ephemeral-node semantics.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::client::{ClientFactory, ConnectionConfig, CoordinationClient, CoordinationError};

#[derive(Debug, Clone)]
struct NodeRecord {
    data: Vec<u8>,
    /// Session id of the owner for ephemeral nodes.
    owner: Option<u64>,
}

#[derive(Debug, Default)]
struct ClusterState {
    nodes: DashMap<String, NodeRecord>,
    next_session: AtomicU64,
}

/// Shared namespace backing any number of [`MemoryClient`] sessions.
///
/// Cheap to clone; all clones observe the same namespace.
#[derive(Debug, Clone, Default)]
pub struct MemoryCluster {
    state: Arc<ClusterState>,
}

impl MemoryCluster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new (not yet started) session against this cluster.
    #[must_use]
    pub fn client(&self) -> MemoryClient {
        MemoryClient {
            cluster: self.clone(),
            session_id: self.state.next_session.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(ClientState::Idle),
        }
    }

    /// Number of live nodes, for tests and diagnostics.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.state.nodes.len()
    }

    fn drop_session(&self, session_id: u64) {
        self.state
            .nodes
            .retain(|_, record| record.owner != Some(session_id));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientState {
    Idle,
    Started,
    Closed,
}

/// One session against a [`MemoryCluster`].
#[derive(Debug)]
pub struct MemoryClient {
    cluster: MemoryCluster,
    session_id: u64,
    state: Mutex<ClientState>,
}

impl MemoryClient {
    fn ensure_started(&self) -> Result<(), CoordinationError> {
        match *self.state.lock() {
            ClientState::Started => Ok(()),
            ClientState::Closed => Err(CoordinationError::Closed),
            ClientState::Idle => Err(CoordinationError::connection("client was never started")),
        }
    }
}

#[async_trait]
impl CoordinationClient for MemoryClient {
    async fn start(&self) -> Result<(), CoordinationError> {
        let mut state = self.state.lock();
        match *state {
            ClientState::Idle => {
                *state = ClientState::Started;
                Ok(())
            }
            ClientState::Started => Err(CoordinationError::connection("client already started")),
            ClientState::Closed => Err(CoordinationError::Closed),
        }
    }

    async fn close(&self) -> Result<(), CoordinationError> {
        {
            let mut state = self.state.lock();
            if *state == ClientState::Closed {
                return Err(CoordinationError::Closed);
            }
            *state = ClientState::Closed;
        }
        self.cluster.drop_session(self.session_id);
        Ok(())
    }

    async fn put_ephemeral(&self, path: &str, data: Vec<u8>) -> Result<(), CoordinationError> {
        self.ensure_started()?;
        self.cluster.state.nodes.insert(
            path.to_owned(),
            NodeRecord {
                data,
                owner: Some(self.session_id),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), CoordinationError> {
        self.ensure_started()?;
        self.cluster.state.nodes.remove(path);
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, CoordinationError> {
        self.ensure_started()?;
        Ok(self.cluster.state.nodes.get(path).map(|r| r.data.clone()))
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>, CoordinationError> {
        self.ensure_started()?;
        let prefix = if path.ends_with('/') {
            path.to_owned()
        } else {
            format!("{path}/")
        };
        let mut children: Vec<String> = self
            .cluster
            .state
            .nodes
            .iter()
            .filter_map(|entry| {
                let rest = entry.key().strip_prefix(&prefix)?;
                // Only direct children.
                if rest.is_empty() || rest.contains('/') {
                    None
                } else {
                    Some(rest.to_owned())
                }
            })
            .collect();
        children.sort_unstable();
        children.dedup();
        Ok(children)
    }
}

/// [`ClientFactory`] handing out sessions against one shared cluster.
#[derive(Debug)]
pub struct MemoryClusterFactory {
    cluster: MemoryCluster,
}

impl MemoryClusterFactory {
    #[must_use]
    pub fn new(cluster: MemoryCluster) -> Self {
        Self { cluster }
    }
}

#[async_trait]
impl ClientFactory for MemoryClusterFactory {
    async fn connect(
        &self,
        _config: &ConnectionConfig,
    ) -> Result<Arc<dyn CoordinationClient>, CoordinationError> {
        Ok(Arc::new(self.cluster.client()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn operations_require_started_client() {
        let cluster = MemoryCluster::new();
        let client = cluster.client();

        let err = client.read("/a").await.unwrap_err();
        assert!(matches!(err, CoordinationError::Connection(_)));

        client.start().await.unwrap();
        assert!(client.read("/a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_is_not_idempotent_and_blocks_further_use() {
        let cluster = MemoryCluster::new();
        let client = cluster.client();
        client.start().await.unwrap();
        client.close().await.unwrap();

        assert!(matches!(
            client.close().await.unwrap_err(),
            CoordinationError::Closed
        ));
        assert!(matches!(
            client.read("/a").await.unwrap_err(),
            CoordinationError::Closed
        ));
    }

    #[tokio::test]
    async fn ephemeral_nodes_vanish_with_their_session() {
        let cluster = MemoryCluster::new();
        let a = cluster.client();
        let b = cluster.client();
        a.start().await.unwrap();
        b.start().await.unwrap();

        a.put_ephemeral("/svc/foo/i1", b"x".to_vec()).await.unwrap();
        b.put_ephemeral("/svc/foo/i2", b"y".to_vec()).await.unwrap();
        assert_eq!(cluster.node_count(), 2);

        a.close().await.unwrap();
        assert_eq!(cluster.node_count(), 1);
        assert_eq!(
            b.list_children("/svc/foo").await.unwrap(),
            vec!["i2".to_owned()],
            "only the surviving session's node should remain"
        );
    }

    #[tokio::test]
    async fn list_children_returns_direct_children_only() {
        let cluster = MemoryCluster::new();
        let client = cluster.client();
        client.start().await.unwrap();

        client.put_ephemeral("/base/foo/i1", vec![]).await.unwrap();
        client.put_ephemeral("/base/foo/i2", vec![]).await.unwrap();
        client.put_ephemeral("/base/bar/i3", vec![]).await.unwrap();

        let children = client.list_children("/base/foo").await.unwrap();
        assert_eq!(children, vec!["i1".to_owned(), "i2".to_owned()]);

        let top = client.list_children("/base").await.unwrap();
        assert!(top.is_empty(), "grandchildren must not leak into listings");
    }

    #[tokio::test]
    async fn delete_missing_node_is_a_noop() {
        let cluster = MemoryCluster::new();
        let client = cluster.client();
        client.start().await.unwrap();
        client.delete("/nope").await.unwrap();
    }
}
