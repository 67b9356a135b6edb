use peerlink_core::core_bridge::BridgeError;
use peerlink_core::core_node::NodeError;
use thiserror::Error;
use tonic::{Code, Status};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid peer address: {0}")]
    InvalidAddress(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ApiError> for Status {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::InvalidAddress(msg) => Status::new(Code::InvalidArgument, msg),
            ApiError::Bridge(BridgeError::Timeout(d)) => Status::new(
                Code::DeadlineExceeded,
                format!("Call timed out after {d:?}"),
            ),
            ApiError::Bridge(e) => Status::new(Code::Unavailable, e.to_string()),
            ApiError::Node(e) => Status::new(Code::Unavailable, e.to_string()),
            ApiError::Json(e) => Status::new(Code::Internal, e.to_string()),
            ApiError::Internal(e) => Status::new(Code::Internal, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_invalid_address_maps_to_invalid_argument() {
        let status = Status::from(ApiError::InvalidAddress("not a multiaddr".into()));
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[test]
    fn test_call_timeout_maps_to_deadline_exceeded() {
        let status = Status::from(ApiError::Bridge(BridgeError::Timeout(
            Duration::from_secs(30),
        )));
        assert_eq!(status.code(), Code::DeadlineExceeded);
    }
}
