//! Shared node context
//!
//! One explicit object holding the node's identity handle, lifecycle state,
//! learned reachable address, and active connection set. Passed to every
//! component instead of being captured in closures. Written only by the setup
//! path and the transport event consumer; read concurrently by everything.

use libp2p::{Multiaddr, PeerId};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Connection lifecycle of the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeState {
    Uninitialized,
    Initializing,
    Listening,
    RelayConnecting,
    RelayConnected,
    /// Relay connected and the externally dialable address is known
    AddressLearned,
}

/// Process-wide node context
pub struct NodeContext {
    peer_id: PeerId,
    name: String,
    state: RwLock<NodeState>,
    reachable_address: RwLock<Option<Multiaddr>>,
    connections: RwLock<HashMap<PeerId, Multiaddr>>,
}

impl NodeContext {
    pub fn new(peer_id: PeerId, name: impl Into<String>) -> Self {
        Self {
            peer_id,
            name: name.into(),
            state: RwLock::new(NodeState::Uninitialized),
            reachable_address: RwLock::new(None),
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn state(&self) -> NodeState {
        *self.state.read().await
    }

    pub async fn set_state(&self, state: NodeState) {
        let mut current = self.state.write().await;
        debug!(from = ?*current, to = ?state, "Node state transition");
        *current = state;
    }

    /// The address this node can be dialed at, once learned
    pub async fn reachable_address(&self) -> Option<Multiaddr> {
        self.reachable_address.read().await.clone()
    }

    pub async fn set_reachable_address(&self, address: Multiaddr) {
        *self.reachable_address.write().await = Some(address);
    }

    pub async fn connection_opened(&self, peer: PeerId, address: Multiaddr) {
        self.connections.write().await.insert(peer, address);
    }

    pub async fn connection_closed(&self, peer: PeerId) {
        self.connections.write().await.remove(&peer);
    }

    /// Snapshot of the active connection set
    pub async fn connections(&self) -> Vec<(PeerId, Multiaddr)> {
        self.connections
            .read()
            .await
            .iter()
            .map(|(peer, addr)| (*peer, addr.clone()))
            .collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_transitions() {
        let context = NodeContext::new(PeerId::random(), "n");
        assert_eq!(context.state().await, NodeState::Uninitialized);

        context.set_state(NodeState::Listening).await;
        assert_eq!(context.state().await, NodeState::Listening);
    }

    #[tokio::test]
    async fn test_reachable_address_starts_unset() {
        let context = NodeContext::new(PeerId::random(), "n");
        assert!(context.reachable_address().await.is_none());

        let addr: Multiaddr = "/ip4/127.0.0.1/tcp/1".parse().unwrap();
        context.set_reachable_address(addr.clone()).await;
        assert_eq!(context.reachable_address().await, Some(addr));
    }

    #[tokio::test]
    async fn test_connection_tracking() {
        let context = NodeContext::new(PeerId::random(), "n");
        let peer = PeerId::random();
        let addr: Multiaddr = "/ip4/127.0.0.1/tcp/1".parse().unwrap();

        context.connection_opened(peer, addr).await;
        assert_eq!(context.connection_count().await, 1);

        context.connection_closed(peer).await;
        assert_eq!(context.connection_count().await, 0);
    }
}
