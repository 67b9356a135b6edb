//! Protocol and handler error types

use std::time::Duration;
use thiserror::Error;

/// Errors raised while framing or decoding a protocol exchange
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("Invalid frame length prefix: {0}")]
    InvalidLengthPrefix(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame is not a valid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Exchange deadline of {0:?} exceeded")]
    Deadline(Duration),
}

/// Failure reported by a registered handler.
///
/// Converted into a structured `{error, status: 500}` response; never
/// propagated as a fault into the server loop.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
