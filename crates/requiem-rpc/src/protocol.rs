// crates/requiem-rpc/src/protocol.rs
// ============================================================================
// Module: JSON-RPC 2.0 Wire Types
// Description: Request/response envelopes and the error-code mapping table.
// Purpose: Implement spec §4.11's framing and its exact error-code table.
// Dependencies: serde, serde_json, requiem_core::error
// ============================================================================

//! ## Overview
//! One JSON object per line, per spec §4.11. [`JsonRpcRequest`] and
//! [`JsonRpcResponse`] are the wire shapes; [`error_code_for`] is the single
//! source of truth for translating an [`ErrorKind`] into a JSON-RPC error
//! code, so the mapping can never drift between call sites.

use requiem_core::error::ErrorEnvelope;
use requiem_core::error::ErrorKind;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// A single incoming JSON-RPC 2.0 request line.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version; always `"2.0"`, not otherwise validated.
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Request id, echoed back verbatim; `None` for a notification.
    #[serde(default)]
    pub id: Option<Value>,
    /// The method name, e.g. `"tools/list"`.
    pub method: String,
    /// Method parameters, if any.
    #[serde(default)]
    pub params: Option<Value>,
}

/// One JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    /// Numeric error code, per [`error_code_for`] or [`UNKNOWN_METHOD_CODE`].
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A single outgoing JSON-RPC 2.0 response line.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Echoes the request's id.
    pub id: Value,
    /// Present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Builds a success response.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    /// Builds an error response from an [`ErrorEnvelope`].
    #[must_use]
    pub fn from_envelope(id: Value, envelope: &ErrorEnvelope) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code: error_code_for(envelope.code),
                message: envelope.message.clone(),
                data: None,
            }),
        }
    }

    /// Builds the error response for an unrecognized method.
    #[must_use]
    pub fn method_not_found(id: Value, method: &str) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code: UNKNOWN_METHOD_CODE,
                message: format!("unknown method: {method}"),
                data: None,
            }),
        }
    }
}

/// Code for a method the server does not recognize.
pub const UNKNOWN_METHOD_CODE: i64 = -32601;

/// Fallback code for any [`ErrorKind`] not explicitly listed below.
const OTHER_ERROR_CODE: i64 = -32000;

/// Maps an [`ErrorKind`] to its JSON-RPC error code (spec §4.11).
#[must_use]
pub const fn error_code_for(kind: ErrorKind) -> i64 {
    match kind {
        ErrorKind::Unauthorized => -32001,
        ErrorKind::Forbidden => -32003,
        ErrorKind::ValidationFailed => -32602,
        ErrorKind::InternalError => -32603,
        _ => OTHER_ERROR_CODE,
    }
}

#[cfg(test)]
mod tests {
    use requiem_core::error::ErrorEnvelope;
    use requiem_core::error::ErrorKind;
    use requiem_core::error::Severity;
    use serde_json::json;

    use super::JsonRpcResponse;
    use super::error_code_for;

    #[test]
    fn error_code_table_matches_spec() {
        assert_eq!(error_code_for(ErrorKind::Unauthorized), -32001);
        assert_eq!(error_code_for(ErrorKind::Forbidden), -32003);
        assert_eq!(error_code_for(ErrorKind::ValidationFailed), -32602);
        assert_eq!(error_code_for(ErrorKind::InternalError), -32603);
        assert_eq!(error_code_for(ErrorKind::BudgetExceeded), -32000);
        assert_eq!(error_code_for(ErrorKind::SchemaMismatch), -32000);
    }

    #[test]
    fn success_response_omits_error_field() {
        let response = JsonRpcResponse::success(json!(1), json!({"ok": true}));
        let serialized = serde_json::to_value(&response).expect("serialize");
        assert!(serialized.get("error").is_none());
        assert_eq!(serialized["result"], json!({"ok": true}));
    }

    #[test]
    fn error_response_omits_result_field() {
        let envelope =
            ErrorEnvelope::new(ErrorKind::Forbidden, "nope", Severity::Error, false, 0);
        let response = JsonRpcResponse::from_envelope(json!(1), &envelope);
        let serialized = serde_json::to_value(&response).expect("serialize");
        assert!(serialized.get("result").is_none());
        assert_eq!(serialized["error"]["code"], json!(-32003));
    }

    #[test]
    fn method_not_found_uses_the_reserved_code() {
        let response = JsonRpcResponse::method_not_found(json!(1), "bogus/method");
        let serialized = serde_json::to_value(&response).expect("serialize");
        assert_eq!(serialized["error"]["code"], json!(-32601));
    }
}
