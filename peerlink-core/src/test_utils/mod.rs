//! Test utilities and helpers for Peerlink
//!
//! Common testing utilities used by unit and integration tests: async channel
//! helpers, an in-memory duplex stream, and an in-process relay server.

pub mod async_helpers;
pub mod duplex;
pub mod relay;

pub use async_helpers::*;
pub use duplex::*;
pub use relay::*;
