//! Request/reply envelope shapes.
//!
//! Every exchange on the wire is a single JSON object. Requests carry a
//! `req` field naming the operation plus whatever arguments that operation
//! needs; replies carry a `status` field of `"ok"` or `"error"` plus either
//! a `data` payload or an `error` string (§2, §7). Operation arguments stay
//! as an untyped `serde_json::Value` map rather than a generic, compile-time
//! `Message` type: handlers are registered per operation name and each one
//! knows its own argument shape, the way `actor.py`'s `_opsHandler` dict
//! dispatches on the `req` string.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ErrorKind;

/// Field name carrying the operation name in a request envelope.
pub const REQ_FIELD: &str = "req";

/// A decoded request envelope: an operation name plus its argument map.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub op: String,
    pub args: Map<String, Value>,
}

/// Error produced when a raw wire value cannot be read as a request.
#[derive(Debug, thiserror::Error)]
pub enum RequestDecodeError {
    #[error("request body is not a JSON object")]
    NotAnObject,
    #[error("request is missing the '{REQ_FIELD}' field")]
    MissingOp,
    #[error("'{REQ_FIELD}' field is not a string")]
    OpNotAString,
}

impl Request {
    /// Decode a raw JSON value into a `Request`, per the `invalid_request`
    /// error kind's trigger condition.
    pub fn decode(value: Value) -> Result<Self, RequestDecodeError> {
        let mut obj = match value {
            Value::Object(obj) => obj,
            _ => return Err(RequestDecodeError::NotAnObject),
        };
        let op = match obj.remove(REQ_FIELD) {
            Some(Value::String(s)) => s,
            Some(_) => return Err(RequestDecodeError::OpNotAString),
            None => return Err(RequestDecodeError::MissingOp),
        };
        Ok(Self { op, args: obj })
    }

    /// Fetch a required string argument, or `None` if absent/wrong type.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }
}

/// The reply envelope, serialized as `{"status": "ok", "data": ...}` or
/// `{"status": "error", "error": "...", "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    Ok {
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    Error {
        error: ErrorKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
}

/// Build a successful reply, with optional payload data.
pub fn success_message(data: Option<Value>) -> Reply {
    Reply::Ok { data }
}

/// Build an error reply carrying a wire error kind and optional extra data.
pub fn error_message(error: ErrorKind, data: Option<Value>) -> Reply {
    Reply::Error { error, data }
}

/// True if the reply's `status` field is `"ok"`.
pub fn is_message_success(reply: &Reply) -> bool {
    matches!(reply, Reply::Ok { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_a_well_formed_request() {
        let v = json!({"req": "start_actor", "category": "worker", "uid": "abc"});
        let req = Request::decode(v).unwrap();
        assert_eq!(req.op, "start_actor");
        assert_eq!(req.get_str("category"), Some("worker"));
    }

    #[test]
    fn rejects_request_missing_req_field() {
        let v = json!({"category": "worker"});
        assert!(matches!(
            Request::decode(v),
            Err(RequestDecodeError::MissingOp)
        ));
    }

    #[test]
    fn rejects_non_object_request() {
        let v = json!("just a string");
        assert!(matches!(
            Request::decode(v),
            Err(RequestDecodeError::NotAnObject)
        ));
    }

    #[test]
    fn success_message_serializes_with_ok_status() {
        let reply = success_message(Some(json!({"uid": "x"})));
        assert!(is_message_success(&reply));
        let v = serde_json::to_value(&reply).unwrap();
        assert_eq!(v["status"], "ok");
    }

    #[test]
    fn error_message_serializes_with_error_status_and_kind() {
        let reply = error_message(ErrorKind::ActorNotFound, None);
        assert!(!is_message_success(&reply));
        let v = serde_json::to_value(&reply).unwrap();
        assert_eq!(v["status"], "error");
        assert_eq!(v["error"], "actor_not_found");
    }
}
