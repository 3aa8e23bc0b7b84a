// CmsVault — JSON-RPC 2.0 Protocol Types
//
// Newline-delimited JSON-RPC 2.0 between the dispatcher and a remote agent.
// Both sides use these types: the agent parses requests and writes
// responses, the SSH executor does the reverse.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC 2.0 request.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: Value,
}

/// A JSON-RPC 2.0 success/error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC 2.0 error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Server-defined: the operation ran and failed. The message is the error text.
pub const OPERATION_FAILED: i32 = -32000;

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Value, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }

    /// Envelope checks only; params are checked by the method handler.
    pub fn validate(&self) -> Result<(), JsonRpcError> {
        if self.jsonrpc != JSONRPC_VERSION {
            Err(JsonRpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""))
        } else if self.method.is_empty() {
            Err(JsonRpcError::new(INVALID_REQUEST, "method must not be empty"))
        } else {
            Ok(())
        }
    }
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self::failure(id, JsonRpcError::new(code, message))
    }

    /// The request could not be read, so there is no id to echo.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(Value::Null, PARSE_ERROR, message)
    }

    /// The result, or the error object. A response with neither is treated
    /// as a null result.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_request() {
        let json = r#"{"jsonrpc":"2.0","method":"execute","params":{"version":1},"id":1}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.method, "execute");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_parse_request_without_params() {
        let json = r#"{"jsonrpc":"2.0","method":"ping","id":1}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.params, Value::Null);
    }

    #[test]
    fn test_invalid_jsonrpc_version() {
        let req = JsonRpcRequest {
            jsonrpc: "1.0".into(),
            ..JsonRpcRequest::new("ping", Value::Null, Value::from(1))
        };
        assert_eq!(req.validate().unwrap_err().code, INVALID_REQUEST);
        let empty = JsonRpcRequest::new("", Value::Null, Value::from(1));
        assert_eq!(empty.validate().unwrap_err().message, "method must not be empty");
    }

    #[test]
    fn test_request_round_trips_as_one_line() {
        let req = JsonRpcRequest::new("ping", serde_json::json!({}), Value::from(7));
        let line = serde_json::to_string(&req).unwrap();
        assert!(!line.contains('\n'));
        let back: JsonRpcRequest = serde_json::from_str(&line).unwrap();
        assert_eq!(back.method, "ping");
        assert_eq!(back.id, Value::from(7));
    }

    #[test]
    fn test_success_response_serialization() {
        let resp = JsonRpcResponse::success(Value::from(1), serde_json::json!({"kind": "removed"}));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"result\""));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_error_response_into_result() {
        let resp = JsonRpcResponse::error(Value::from(1), OPERATION_FAILED, "Not found: x");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("\"result\""));
        assert!(json.contains("-32000"));

        let parsed: JsonRpcResponse = serde_json::from_str(&json).unwrap();
        let err = parsed.into_result().unwrap_err();
        assert_eq!(err.code, OPERATION_FAILED);
        assert_eq!(err.message, "Not found: x");
        assert_eq!(err.to_string(), "Not found: x (-32000)");
    }

    #[test]
    fn test_parse_error_has_null_id() {
        let resp = JsonRpcResponse::parse_error("bad json");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"id\":null"));
        assert!(json.contains("-32700"));
    }
}
