//! Bridge error types

use crate::core_node::NodeError;
use crate::core_router::ProtocolError;
use std::time::Duration;
use thiserror::Error;

/// Failures of an outbound bridge call
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure reported by the local agent service
#[derive(Debug, Error)]
#[error("{0}")]
pub struct AgentError(pub String);

impl AgentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
