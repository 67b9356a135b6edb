//! Request routing and the one-shot framed protocol
//!
//! The server role decodes one request envelope per inbound stream, dispatches
//! it by path through the frozen [`HandlerRegistry`], and writes one response
//! frame back. The client role is the mirror image, used by the RPC bridge.

mod envelope;
mod error;
pub mod framing;
mod protocol;
mod registry;

pub use envelope::{bad_request, handler_failure, not_found, QueryBody, RequestEnvelope, QUERY_PATH};
pub use error::{HandlerError, ProtocolError};
pub use framing::{read_frame, write_frame, MAX_FRAME_SIZE};
pub use protocol::{call, serve_stream, spawn_server};
pub use registry::{Handler, HandlerRegistry, InboundRequest};
