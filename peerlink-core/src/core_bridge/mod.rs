//! The peer-to-peer RPC bridge
//!
//! Outward-facing API over the protocol engine: `call_peer` runs one
//! client-role exchange against an explicit overlay address, `query_peer`
//! reaches a peer through the bootstrap relay circuit. Each call opens a
//! fresh stream; N concurrent calls are N independent streams.

mod agent;
mod error;

pub use agent::{query_handler, LocalAgent};
pub use error::{AgentError, BridgeError};

use crate::core_node::{peer_id_from_addr, NodeHandle};
use crate::core_router::{self, QueryBody, QUERY_PATH};
use crate::metrics::{CALLS_TOTAL, CALL_DURATION_SECONDS};
use libp2p::{Multiaddr, PeerId};
use metrics::{counter, histogram};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::info;

/// The outward-facing RPC API of a running node
#[derive(Clone)]
pub struct RpcBridge {
    node: NodeHandle,
    call_timeout: Duration,
}

impl RpcBridge {
    pub fn new(node: NodeHandle, call_timeout: Duration) -> Self {
        Self { node, call_timeout }
    }

    pub fn node(&self) -> &NodeHandle {
        &self.node
    }

    /// Invoke the `/query` operation on the peer at `address` and return the
    /// decoded response. The whole exchange runs under the call deadline.
    pub async fn call_peer(&self, address: &Multiaddr, body: Value) -> Result<Value, BridgeError> {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.call_timeout, self.exchange(address, body))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Timeout(self.call_timeout)),
        };

        histogram!(CALL_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        let outcome = if result.is_ok() { "ok" } else { "error" };
        counter!(CALLS_TOTAL, "outcome" => outcome).increment(1);
        result
    }

    /// Reach `peer` through the bootstrap relay circuit and send it `query`,
    /// wrapped with this node's own name and peer id.
    pub async fn query_peer(&self, peer: PeerId, query: Value) -> Result<Value, BridgeError> {
        let address = self.node.circuit_address_for(peer);
        info!(%peer, %address, "Querying peer");

        let body = serde_json::to_value(QueryBody {
            name: self.node.context().name().to_string(),
            query,
            peerid: self.node.peer_id().to_string(),
        })?;
        self.call_peer(&address, body).await
    }

    async fn exchange(&self, address: &Multiaddr, body: Value) -> Result<Value, BridgeError> {
        let peer =
            peer_id_from_addr(address).ok_or(crate::core_node::NodeError::MissingPeerId(
                address.clone(),
            ))?;

        self.node.connect(address).await?;
        let stream = self.node.open_stream(peer).await?;
        Ok(core_router::call(stream, QUERY_PATH, body).await?)
    }
}
