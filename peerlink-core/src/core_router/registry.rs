//! Path-keyed handler registry
//!
//! Built once at setup and frozen into an `Arc` before serving begins, so
//! request-time lookups are lock-free reads of an immutable map.

use super::HandlerError;
use futures::future::BoxFuture;
use futures::FutureExt;
use libp2p::PeerId;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// An inbound request as seen by a handler
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// The request body
    pub body: Value,
    /// Peer id of the remote caller, when the transport knows it
    pub remote_peer: Option<PeerId>,
}

/// A registered async handler
pub type Handler =
    Arc<dyn Fn(InboundRequest) -> BoxFuture<'static, Result<Value, HandlerError>> + Send + Sync>;

/// Mapping from path to handler. Last registration for a path wins.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a boxed handler at a path
    pub fn register(&mut self, path: impl Into<String>, handler: Handler) {
        self.handlers.insert(path.into(), handler);
    }

    /// Register an async closure at a path
    pub fn register_fn<F, Fut>(&mut self, path: impl Into<String>, f: F)
    where
        F: Fn(InboundRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        self.register(path, Arc::new(move |request| f(request).boxed()));
    }

    /// Look up the handler for a path
    pub fn get(&self, path: &str) -> Option<&Handler> {
        self.handlers.get(path)
    }

    /// Freeze the registry for the serving path
    pub fn freeze(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
