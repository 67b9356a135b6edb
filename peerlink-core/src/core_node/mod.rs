//! Overlay node lifecycle and connection management
//!
//! Construction of the swarm (TCP and WebSocket transports with noise
//! encryption and yamux multiplexing, relay client, identify, ping, and the
//! application stream behaviour), the command/event plumbing around it, and
//! the shared [`NodeContext`].

mod behaviour;
mod context;
mod error;
mod events;
mod manager;

pub use behaviour::{NodeBehaviour, IDENTIFY_PROTOCOL};
pub use context::{NodeContext, NodeState};
pub use error::NodeError;
pub use events::{circuit_address, is_webrtc, peer_id_from_addr, TransportEvent};
pub use manager::{NodeHandle, NodeManager};
