//! The local-service seam and the default `/query` handler
//!
//! Inbound `/query` requests are forwarded into the colocated agent service
//! through the [`LocalAgent`] trait; the gRPC client implementation lives in
//! the daemon crate. Agent failures become a structured error payload for the
//! remote caller, never a dropped stream.

use super::AgentError;
use crate::core_node::NodeContext;
use crate::core_router::{Handler, InboundRequest};
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// The local synchronous service this node bridges into
#[async_trait]
pub trait LocalAgent: Send + Sync {
    /// Deliver a message to the local agent and return its reply
    async fn call_peer(
        &self,
        sender_node_id: String,
        receiver_p2p_address: String,
        message: String,
    ) -> Result<String, AgentError>;
}

/// Build the default `/query` handler.
///
/// The forwarded identifiers are real: the sender is the requester's declared
/// name (falling back to the stream's remote peer id), the receiver is this
/// node's learned reachable address (falling back to its peer id).
pub fn query_handler(agent: Arc<dyn LocalAgent>, context: Arc<NodeContext>) -> Handler {
    Arc::new(move |request: InboundRequest| {
        let agent = agent.clone();
        let context = context.clone();
        async move {
            let sender = request
                .body
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .or_else(|| request.remote_peer.map(|peer| peer.to_string()))
                .unwrap_or_else(|| "unknown".to_string());

            let receiver = match context.reachable_address().await {
                Some(address) => address.to_string(),
                None => context.peer_id().to_string(),
            };

            let message = render_message(&request.body);

            match agent.call_peer(sender, receiver, message).await {
                Ok(reply) => Ok(parse_reply(reply)),
                Err(e) => {
                    debug!("Agent call failed: {}", e);
                    Ok(json!({
                        "received": null,
                        "status": "error",
                        "message": e.to_string(),
                    }))
                }
            }
        }
        .boxed()
    })
}

/// The query payload as text: a raw string stays raw, anything else is
/// rendered as canonical JSON; a body without a `query` field is forwarded
/// whole.
fn render_message(body: &Value) -> String {
    match body.get("query") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => body.to_string(),
    }
}

/// Agent replies are JSON text on the service wire; fall back to a plain
/// string value when they are not valid JSON.
fn parse_reply(reply: String) -> Value {
    serde_json::from_str(&reply).unwrap_or(Value::String(reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use libp2p::PeerId;

    struct RecordingAgent {
        calls: std::sync::Mutex<Vec<(String, String, String)>>,
        reply: Result<String, String>,
    }

    #[async_trait]
    impl LocalAgent for RecordingAgent {
        async fn call_peer(
            &self,
            sender_node_id: String,
            receiver_p2p_address: String,
            message: String,
        ) -> Result<String, AgentError> {
            self.calls.lock().unwrap().push((
                sender_node_id,
                receiver_p2p_address,
                message.clone(),
            ));
            self.reply.clone().map_err(AgentError::new)
        }
    }

    fn request(body: Value, remote_peer: Option<PeerId>) -> InboundRequest {
        InboundRequest { body, remote_peer }
    }

    #[tokio::test]
    async fn test_forwards_real_identifiers() {
        let agent = Arc::new(RecordingAgent {
            calls: Default::default(),
            reply: Ok("\"ack\"".to_string()),
        });
        let context = Arc::new(NodeContext::new(PeerId::random(), "local"));
        let handler = query_handler(agent.clone(), context.clone());

        let body = json!({ "name": "alpha", "query": "hello", "peerid": "12D3" });
        let result = handler(request(body, None)).await.unwrap();
        assert_eq!(result, json!("ack"));

        let calls = agent.calls.lock().unwrap();
        let (sender, receiver, message) = &calls[0];
        assert_eq!(sender, "alpha");
        assert_eq!(receiver, &context.peer_id().to_string());
        assert_eq!(message, "hello");
    }

    #[tokio::test]
    async fn test_sender_falls_back_to_remote_peer() {
        let agent = Arc::new(RecordingAgent {
            calls: Default::default(),
            reply: Ok("{}".to_string()),
        });
        let context = Arc::new(NodeContext::new(PeerId::random(), "local"));
        let handler = query_handler(agent.clone(), context);

        let caller = PeerId::random();
        handler(request(json!({ "query": { "n": 1 } }), Some(caller)))
            .await
            .unwrap();

        let calls = agent.calls.lock().unwrap();
        let (sender, _, message) = &calls[0];
        assert_eq!(sender, &caller.to_string());
        assert_eq!(message, "{\"n\":1}");
    }

    #[tokio::test]
    async fn test_receiver_uses_learned_address_when_available() {
        let agent = Arc::new(RecordingAgent {
            calls: Default::default(),
            reply: Ok("{}".to_string()),
        });
        let context = Arc::new(NodeContext::new(PeerId::random(), "local"));
        let addr: libp2p::Multiaddr = "/ip4/127.0.0.1/tcp/9090".parse().unwrap();
        context.set_reachable_address(addr.clone()).await;

        let handler = query_handler(agent.clone(), context);
        handler(request(json!({ "query": "q" }), None)).await.unwrap();

        let calls = agent.calls.lock().unwrap();
        assert_eq!(calls[0].1, addr.to_string());
    }

    #[tokio::test]
    async fn test_agent_failure_becomes_structured_payload() {
        let agent = Arc::new(RecordingAgent {
            calls: Default::default(),
            reply: Err("connection refused".to_string()),
        });
        let context = Arc::new(NodeContext::new(PeerId::random(), "local"));
        let handler = query_handler(agent, context);

        let result = handler(request(json!({ "query": "q" }), None))
            .await
            .unwrap();
        assert_eq!(
            result,
            json!({
                "received": null,
                "status": "error",
                "message": "connection refused",
            })
        );
    }

    #[tokio::test]
    async fn test_non_json_reply_becomes_string_value() {
        let agent = Arc::new(RecordingAgent {
            calls: Default::default(),
            reply: Ok("plain text".to_string()),
        });
        let context = Arc::new(NodeContext::new(PeerId::random(), "local"));
        let handler = query_handler(agent, context);

        let result = handler(request(json!({ "query": "q" }), None))
            .await
            .unwrap();
        assert_eq!(result, json!("plain text"));
    }
}
