//! Multi-node pool: round-robin selection for reads, a sticky primary with
//! failover for writes, and liveness fed back from call outcomes.
//!
//! All pool state sits behind one `Mutex`. Critical sections only do index
//! bookkeeping; dialing, calls and closing happen with the lock released.

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy_primitives::{Address, Bytes, B256};
use serde::Serialize;

use crate::error::{PoolError, TransportError};
use crate::eth;
use crate::transport::{Dialer, HealthStatus, RpcTransport};
use crate::types::TransactionReceipt;

/// A selected node: its endpoint plus a shared handle to its connection.
#[derive(Clone)]
pub struct NodeHandle {
    pub endpoint: String,
    pub connection: Arc<dyn RpcTransport>,
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle").field("endpoint", &self.endpoint).finish()
    }
}

/// Point-in-time view of one node, for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub endpoint: String,
    pub alive: bool,
    pub primary: bool,
    /// What the connection reports about itself; `unhealthy` without one.
    pub health: HealthStatus,
}

/// `alive` implies `connection.is_some()`. A failed dial still owns a slot.
struct NodeRecord {
    endpoint: String,
    connection: Option<Arc<dyn RpcTransport>>,
    alive: bool,
}

impl NodeRecord {
    fn live_handle(&self) -> Option<NodeHandle> {
        if !self.alive {
            return None;
        }
        self.connection.as_ref().map(|connection| NodeHandle {
            endpoint: self.endpoint.clone(),
            connection: Arc::clone(connection),
        })
    }
}

struct PoolState {
    nodes: Vec<NodeRecord>,
    read_cursor: usize,
    primary_index: usize,
    closed: bool,
}

/// Ordered set of node connections with read/write selection policies.
pub struct NodePool {
    state: Mutex<PoolState>,
}

impl NodePool {
    /// Dial every endpoint in order and build the pool.
    ///
    /// Blank entries are skipped and duplicates collapsed. Nodes that fail
    /// to dial keep their slot, marked dead. Fails with `NoNodesAvailable`
    /// only if no endpoint could be dialed.
    pub async fn connect<S: AsRef<str>>(dialer: &dyn Dialer, endpoints: &[S]) -> Result<Self, PoolError> {
        let mut nodes: Vec<NodeRecord> = Vec::with_capacity(endpoints.len());
        for raw in endpoints {
            let endpoint = raw.as_ref().trim();
            if endpoint.is_empty() || nodes.iter().any(|n| n.endpoint == endpoint) {
                continue;
            }
            match dialer.dial(endpoint).await {
                Ok(connection) => {
                    tracing::info!(endpoint, "connected rpc node");
                    nodes.push(NodeRecord {
                        endpoint: endpoint.to_string(),
                        connection: Some(connection),
                        alive: true,
                    });
                }
                Err(e) => {
                    tracing::warn!(endpoint, error = %e, "connect rpc node failed");
                    nodes.push(NodeRecord {
                        endpoint: endpoint.to_string(),
                        connection: None,
                        alive: false,
                    });
                }
            }
        }

        if !nodes.iter().any(|n| n.alive) {
            return Err(PoolError::NoNodesAvailable);
        }

        Ok(Self {
            state: Mutex::new(PoolState {
                nodes,
                read_cursor: 0,
                primary_index: 0,
                closed: false,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of node slots, live or dead.
    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn live_count(&self) -> usize {
        self.lock().nodes.iter().filter(|n| n.alive).count()
    }

    /// Round-robin read selection.
    ///
    /// Scans from the read cursor, wrapping once, and leaves the cursor one
    /// past the chosen node so the next call starts at the following slot.
    pub fn pick_read_node(&self) -> Result<NodeHandle, PoolError> {
        let mut state = self.lock();
        let n = state.nodes.len();
        for i in 0..n {
            let idx = (state.read_cursor + i) % n;
            if let Some(handle) = state.nodes[idx].live_handle() {
                state.read_cursor = (idx + 1) % n;
                return Ok(handle);
            }
        }
        Err(PoolError::NoLiveNode)
    }

    /// Sticky primary selection for writes.
    ///
    /// Returns the current primary while it is alive. Otherwise fails over
    /// to the first live node by index. There is no automatic move back to
    /// a lower-index node once it recovers.
    pub fn pick_primary_node(&self) -> Result<NodeHandle, PoolError> {
        let mut state = self.lock();
        let primary = state.primary_index;
        if let Some(handle) = state.nodes.get(primary).and_then(NodeRecord::live_handle) {
            return Ok(handle);
        }

        let found = state
            .nodes
            .iter()
            .enumerate()
            .find_map(|(idx, node)| node.live_handle().map(|h| (idx, h)));
        match found {
            Some((idx, handle)) => {
                tracing::warn!(endpoint = %handle.endpoint, "switch primary node");
                state.primary_index = idx;
                Ok(handle)
            }
            None => Err(PoolError::NoLiveNode),
        }
    }

    /// Record a transport-level failure against `endpoint`.
    ///
    /// This is the only way a node goes from alive to dead. Repeated calls
    /// are no-ops; unknown endpoints are ignored.
    pub fn mark_dead(&self, endpoint: &str, cause: &dyn Display) {
        let mut state = self.lock();
        if let Some(node) = state.nodes.iter_mut().find(|n| n.endpoint == endpoint) {
            if node.alive {
                tracing::error!(endpoint, error = %cause, "mark node dead");
            }
            node.alive = false;
        }
    }

    /// Explicitly dial a dead node again and bring it back on success.
    ///
    /// Never called by the pool itself. A node that is already alive is
    /// left untouched. Fails with `Closed` once [`close`](Self::close) has
    /// run, including when the close lands while the dial is in flight.
    pub async fn redial(&self, dialer: &dyn Dialer, endpoint: &str) -> Result<(), PoolError> {
        {
            let state = self.lock();
            if state.closed {
                return Err(PoolError::Closed);
            }
            let node = state
                .nodes
                .iter()
                .find(|n| n.endpoint == endpoint)
                .ok_or_else(|| PoolError::UnknownEndpoint(endpoint.to_string()))?;
            if node.alive {
                return Ok(());
            }
        }

        let fresh = dialer.dial(endpoint).await?;

        let (stale, unused, closed) = {
            let mut state = self.lock();
            let closed = state.closed;
            match state.nodes.iter_mut().find(|n| n.endpoint == endpoint) {
                Some(node) if !closed && !node.alive => {
                    let stale = node.connection.replace(Arc::clone(&fresh));
                    node.alive = true;
                    (stale, None, false)
                }
                _ => (None, Some(fresh), closed),
            }
        };
        if let Some(conn) = stale {
            conn.close().await;
        }
        if let Some(conn) = unused {
            conn.close().await;
        }
        if closed {
            tracing::debug!(endpoint, "pool closed during redial; dropped fresh connection");
            return Err(PoolError::Closed);
        }
        tracing::info!(endpoint, "node redialed");
        Ok(())
    }

    /// Endpoint a subscription driver should dial next.
    ///
    /// Scans from `rotation` without disturbing the read cursor, preferring
    /// live nodes outside `skip`, then any node outside `skip`. When every
    /// node is skipped it still hands out the endpoint at `rotation`.
    pub fn stream_endpoint(&self, rotation: usize, skip: &HashSet<String>) -> Option<String> {
        let state = self.lock();
        let n = state.nodes.len();
        if n == 0 {
            return None;
        }
        let nodes = &state.nodes;
        let start = rotation % n;
        let ring = move || (0..n).map(move |i| &nodes[(start + i) % n]);
        ring()
            .find(|node| node.alive && !skip.contains(&node.endpoint))
            .or_else(|| ring().find(|node| !skip.contains(&node.endpoint)))
            .or_else(|| nodes.get(start))
            .map(|node| node.endpoint.clone())
    }

    /// Snapshot of every node in pool order.
    pub fn statuses(&self) -> Vec<NodeStatus> {
        let state = self.lock();
        state
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| NodeStatus {
                endpoint: node.endpoint.clone(),
                alive: node.alive,
                primary: idx == state.primary_index,
                health: node
                    .connection
                    .as_ref()
                    .map_or(HealthStatus::Unhealthy, |conn| conn.health()),
            })
            .collect()
    }

    /// Close every node connection. Later calls find nothing left to close.
    pub async fn close(&self) {
        let connections: Vec<_> = {
            let mut state = self.lock();
            state.closed = true;
            state
                .nodes
                .iter_mut()
                .filter_map(|node| {
                    node.alive = false;
                    node.connection.take()
                })
                .collect()
        };
        for conn in connections {
            tracing::debug!(endpoint = conn.url(), "closing node connection");
            conn.close().await;
        }
    }

    /// Run a read against the next round-robin node.
    pub async fn with_read_node<T, F, Fut>(&self, op: F) -> Result<T, PoolError>
    where
        F: FnOnce(Arc<dyn RpcTransport>) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let node = self.pick_read_node()?;
        self.run_on(node, op).await
    }

    /// Run a write against the primary node.
    pub async fn with_primary_node<T, F, Fut>(&self, op: F) -> Result<T, PoolError>
    where
        F: FnOnce(Arc<dyn RpcTransport>) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let node = self.pick_primary_node()?;
        tracing::debug!(endpoint = %node.endpoint, "write via primary node");
        self.run_on(node, op).await
    }

    async fn run_on<T, F, Fut>(&self, node: NodeHandle, op: F) -> Result<T, PoolError>
    where
        F: FnOnce(Arc<dyn RpcTransport>) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        match op(Arc::clone(&node.connection)).await {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_transport_failure() {
                    self.mark_dead(&node.endpoint, &e);
                }
                Err(PoolError::Transport(e))
            }
        }
    }

    /// Latest block number from a read node.
    pub async fn block_number(&self) -> Result<u64, PoolError> {
        self.with_read_node(|conn| async move { eth::block_number(conn.as_ref()).await })
            .await
    }

    /// Read-only contract call on a read node.
    pub async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, PoolError> {
        self.with_read_node(|conn| async move { eth::call(conn.as_ref(), to, &input).await })
            .await
    }

    /// Receipt lookup on a read node.
    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>, PoolError> {
        self.with_read_node(|conn| async move { eth::transaction_receipt(conn.as_ref(), hash).await })
            .await
    }

    /// Broadcast a signed transaction through the primary node.
    pub async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, PoolError> {
        self.with_primary_node(|conn| async move { eth::send_raw_transaction(conn.as_ref(), &raw).await })
            .await
    }
}

impl std::fmt::Debug for NodePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodePool").field("nodes", &self.statuses()).finish()
    }
}
