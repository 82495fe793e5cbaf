//! JSON-RPC 2.0 envelope shapes and the permissive classification rule that
//! turns a raw `Value` into a request, notification, or response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC id. The spec allows numbers or strings on the wire; servers
/// frequently round-trip integers as floats, so this coerces all three shapes
/// to a canonical form for stdio correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl RequestId {
    /// Coerces a raw JSON id value to an `i64` for pending-map lookup.
    /// Returns `None` for ids that cannot be represented as an integer
    /// (e.g. a non-numeric string), in which case the caller should
    /// log-and-drop per the wire codec's policy.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RequestId::Number(n) => Some(*n),
            RequestId::String(s) => s.parse().ok(),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        RequestId::Number(value)
    }
}

impl From<&Value> for RequestId {
    fn from(value: &Value) -> Self {
        if let Some(n) = value.as_i64() {
            RequestId::Number(n)
        } else if let Some(f) = value.as_f64() {
            RequestId::Number(f as i64)
        } else if let Some(s) = value.as_str() {
            RequestId::String(s.to_string())
        } else {
            RequestId::String(value.to_string())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// The raw shape every incoming envelope is first deserialized into, before
/// classification. All fields are optional because JSON-RPC requests,
/// notifications, responses, and errors share one wire shape distinguished
/// only by which fields are present.
#[derive(Debug, Clone, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// A classified inbound message. Classification rule: `method` + `id` is a
/// request; `method` with no `id` is a notification; no `method` with `id`
/// is a response (success or error).
#[derive(Clone)]
pub enum Message {
    Request { id: RequestId, method: String, params: Option<Value> },
    Notification { method: String, params: Option<Value> },
    Response { id: RequestId, result: Option<Value>, error: Option<JsonRpcError> },
}

/// Parses and classifies a raw JSON-RPC envelope. Returns `None` for a
/// malformed envelope that has neither a `method` nor an `id` (no method, no
/// id, nothing to route on) — callers should log-and-drop in that case.
pub fn classify(raw: &Value) -> Option<Message> {
    let envelope: RawEnvelope = serde_json::from_value(raw.clone()).ok()?;
    match (envelope.method, envelope.id) {
        (Some(method), Some(id)) => {
            Some(Message::Request { id: RequestId::from(&id), method, params: envelope.params })
        }
        (Some(method), None) => Some(Message::Notification { method, params: envelope.params }),
        (None, Some(id)) => Some(Message::Response {
            id: RequestId::from(&id),
            result: envelope.result,
            error: envelope.error,
        }),
        (None, None) => None,
    }
}

/// Builds an outbound JSON-RPC request envelope.
pub fn build_request(id: &RequestId, method: &str, params: Option<Value>) -> Value {
    serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "method": method,
        "params": params,
    })
}

/// Builds an outbound JSON-RPC notification envelope (no id).
pub fn build_notification(method: &str, params: Option<Value>) -> Value {
    serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": method,
        "params": params,
    })
}

/// Builds an outbound JSON-RPC success response.
pub fn build_response(id: &RequestId, result: Value) -> Value {
    serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

/// Builds an outbound JSON-RPC error response.
pub fn build_error_response(id: &RequestId, code: i64, message: &str) -> Value {
    serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": { "code": code, "message": message },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_request() {
        let raw = json!({"jsonrpc":"2.0","id":1,"method":"tools/call","params":{}});
        match classify(&raw).unwrap() {
            Message::Request { id, method, .. } => {
                assert_eq!(id, RequestId::Number(1));
                assert_eq!(method, "tools/call");
            }
            other => panic!("expected Request, got {other:?}"),
        }
    }

    #[test]
    fn classifies_notification() {
        let raw = json!({"jsonrpc":"2.0","method":"notifications/initialized"});
        match classify(&raw).unwrap() {
            Message::Notification { method, .. } => assert_eq!(method, "notifications/initialized"),
            other => panic!("expected Notification, got {other:?}"),
        }
    }

    #[test]
    fn classifies_success_response() {
        let raw = json!({"jsonrpc":"2.0","id":7,"result":{"ok":true}});
        match classify(&raw).unwrap() {
            Message::Response { id, result, error } => {
                assert_eq!(id, RequestId::Number(7));
                assert!(result.is_some());
                assert!(error.is_none());
            }
            other => panic!("expected Response, got {other:?}"),
        }
    }

    #[test]
    fn classifies_error_response() {
        let raw = json!({"jsonrpc":"2.0","id":7,"error":{"code":-32601,"message":"not found"}});
        match classify(&raw).unwrap() {
            Message::Response { error: Some(err), .. } => assert_eq!(err.code, -32601),
            other => panic!("expected error Response, got {other:?}"),
        }
    }

    #[test]
    fn rejects_envelope_with_neither_method_nor_id() {
        let raw = json!({"jsonrpc":"2.0"});
        assert!(classify(&raw).is_none());
    }

    #[test]
    fn coerces_float_id_to_i64() {
        let raw = json!({"jsonrpc":"2.0","id":7.0,"result":{}});
        match classify(&raw).unwrap() {
            Message::Response { id, .. } => assert_eq!(id.as_i64(), Some(7)),
            other => panic!("expected Response, got {other:?}"),
        }
    }

    #[test]
    fn coerces_numeric_string_id_to_i64() {
        let id = RequestId::String("42".to_string());
        assert_eq!(id.as_i64(), Some(42));
    }

    #[test]
    fn non_numeric_string_id_has_no_i64_form() {
        let id = RequestId::String("abc".to_string());
        assert_eq!(id.as_i64(), None);
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Request { id, method, .. } => {
                write!(f, "Request{{id: {id:?}, method: {method}}}")
            }
            Message::Notification { method, .. } => write!(f, "Notification{{method: {method}}}"),
            Message::Response { id, .. } => write!(f, "Response{{id: {id:?}}}"),
        }
    }
}
