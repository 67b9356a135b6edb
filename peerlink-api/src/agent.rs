//! gRPC client for the colocated agent service
//!
//! The agent exposes the same `P2pNodeService` shape on loopback; inbound
//! `/query` requests are forwarded into its `CallPeer` method.

use async_trait::async_trait;
use peerlink_core::core_bridge::{AgentError, LocalAgent};
use std::net::IpAddr;
use std::time::Duration;
use tonic::transport::Endpoint;
use tracing::debug;

use crate::proto::p2p_node_service_client::P2pNodeServiceClient;
use crate::proto::CallPeerRequest;

pub struct GrpcAgent {
    endpoint: String,
    timeout: Duration,
}

impl GrpcAgent {
    pub fn new(address: IpAddr, port: u16, timeout: Duration) -> Self {
        Self {
            endpoint: format!("http://{address}:{port}"),
            timeout,
        }
    }
}

#[async_trait]
impl LocalAgent for GrpcAgent {
    async fn call_peer(
        &self,
        sender_node_id: String,
        receiver_p2p_address: String,
        message: String,
    ) -> Result<String, AgentError> {
        debug!(endpoint = %self.endpoint, %sender_node_id, "Forwarding query to agent");

        let endpoint = Endpoint::from_shared(self.endpoint.clone())
            .map_err(|e| AgentError::new(format!("invalid agent endpoint: {e}")))?
            .connect_timeout(self.timeout)
            .timeout(self.timeout);
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| AgentError::new(format!("agent unreachable: {e}")))?;
        let mut client = P2pNodeServiceClient::new(channel);

        let response = client
            .call_peer(CallPeerRequest {
                sender_node_id,
                receiver_p2p_address,
                message,
            })
            .await
            .map_err(|status| AgentError::new(status.message().to_string()))?;

        Ok(response.into_inner().reply)
    }
}
