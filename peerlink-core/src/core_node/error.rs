//! Node error types

use libp2p::Multiaddr;
use std::time::Duration;
use thiserror::Error;

/// Connection-layer errors
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Invalid overlay address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Address has no terminal peer id: {0}")]
    MissingPeerId(Multiaddr),

    #[error("Dial failed: {0}")]
    Dial(String),

    #[error("Dial timed out after {0:?}")]
    DialTimeout(Duration),

    #[error("Reachability probe failed: {0}")]
    Probe(String),

    #[error("Listen failed: {0}")]
    Listen(String),

    #[error("Failed to open stream: {0}")]
    OpenStream(String),

    #[error("Protocol registration failed: {0}")]
    Protocol(String),

    #[error("Transport setup failed: {0}")]
    Transport(String),

    #[error("Node task is not running")]
    ChannelClosed,
}
