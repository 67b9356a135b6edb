//! Request/response envelope shapes
//!
//! Requests carry `{path, body}`; responses are either the handler's raw JSON
//! return value or a structured `{error, status}` document.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Path of the default service-bridge handler.
pub const QUERY_PATH: &str = "/query";

/// A decoded request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub path: String,
    pub body: Value,
}

impl RequestEnvelope {
    pub fn new(path: impl Into<String>, body: Value) -> Self {
        Self {
            path: path.into(),
            body,
        }
    }
}

/// Body shape of a relayed `/query` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryBody {
    /// Requester's node name
    pub name: String,
    /// The query payload itself
    pub query: Value,
    /// Requester's peer id
    pub peerid: String,
}

/// Response for a request whose path has no registered handler
pub fn not_found() -> Value {
    json!({ "error": "Not Found", "status": 404 })
}

/// Response for a frame that could not be decoded into a request
pub fn bad_request() -> Value {
    json!({ "error": "Bad Request", "status": 400 })
}

/// Response for a handler that failed
pub fn handler_failure(message: &str) -> Value {
    json!({ "error": message, "status": 500 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope_wire_shape() {
        let envelope = RequestEnvelope::new("/echo", json!({ "n": 1 }));
        let encoded = serde_json::to_value(&envelope).unwrap();
        assert_eq!(encoded, json!({ "path": "/echo", "body": { "n": 1 } }));

        let decoded: RequestEnvelope = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_error_payload_shapes() {
        assert_eq!(not_found(), json!({ "error": "Not Found", "status": 404 }));
        assert_eq!(
            bad_request(),
            json!({ "error": "Bad Request", "status": 400 })
        );
        assert_eq!(
            handler_failure("boom"),
            json!({ "error": "boom", "status": 500 })
        );
    }

    #[test]
    fn test_query_body_field_names() {
        let body = QueryBody {
            name: "alpha".to_string(),
            query: json!("hello"),
            peerid: "12D3KooW...".to_string(),
        };
        let encoded = serde_json::to_value(&body).unwrap();
        // Wire field names are fixed by existing deployments.
        assert!(encoded.get("name").is_some());
        assert!(encoded.get("query").is_some());
        assert!(encoded.get("peerid").is_some());
    }
}
