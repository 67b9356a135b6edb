//! Identity error types

use thiserror::Error;

/// Identity errors
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid key encoding: {0}")]
    InvalidEncoding(String),

    #[error("Other error: {0}")]
    Other(String),
}
