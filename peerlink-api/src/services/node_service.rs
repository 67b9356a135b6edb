use libp2p::Multiaddr;
use peerlink_core::core_router::QueryBody;
use peerlink_core::RpcBridge;
use tonic::{Request, Response, Status};
use tracing::info;

use crate::error::ApiError;
use crate::proto::*;

pub struct P2pNodeServiceImpl {
    bridge: RpcBridge,
}

impl P2pNodeServiceImpl {
    pub fn new(bridge: RpcBridge) -> Self {
        Self { bridge }
    }
}

#[tonic::async_trait]
impl p2p_node_service_server::P2pNodeService for P2pNodeServiceImpl {
    async fn p2p_context(
        &self,
        _request: Request<P2pContextRequest>,
    ) -> Result<Response<P2pContextResponse>, Status> {
        let node = self.bridge.node();
        let peer_id = node.peer_id().to_string();
        // Empty until the relay reservation is accepted and the circuit
        // address is learned.
        let p2p_address = node
            .context()
            .reachable_address()
            .await
            .map(|a| a.to_string())
            .unwrap_or_default();

        info!(%peer_id, %p2p_address, "Reporting node context");

        Ok(Response::new(P2pContextResponse {
            peer_id,
            p2p_address,
        }))
    }

    async fn call_peer(
        &self,
        request: Request<CallPeerRequest>,
    ) -> Result<Response<CallPeerResponse>, Status> {
        let req = request.into_inner();
        info!(
            sender = %req.sender_node_id,
            receiver = %req.receiver_p2p_address,
            message = %req.message,
            "Received callPeer request"
        );

        let address: Multiaddr = req
            .receiver_p2p_address
            .parse()
            .map_err(|e: libp2p::multiaddr::Error| {
                Status::from(ApiError::InvalidAddress(format!(
                    "{}: {e}",
                    req.receiver_p2p_address
                )))
            })?;

        // Wire shape of an outbound query, with the caller's declared sender
        // id in the name slot.
        let body = serde_json::to_value(QueryBody {
            name: req.sender_node_id,
            query: serde_json::Value::String(req.message),
            peerid: self.bridge.node().peer_id().to_string(),
        })
        .map_err(|e| Status::from(ApiError::Json(e)))?;

        let reply = self
            .bridge
            .call_peer(&address, body)
            .await
            .map_err(|e| Status::from(ApiError::Bridge(e)))?;

        Ok(Response::new(CallPeerResponse {
            reply: reply.to_string(),
        }))
    }
}
