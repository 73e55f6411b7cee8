//! Wire format of the control socket: JSON-RPC 2.0, one message per line.
//!
//! Besides the standard codes the daemon answers with three of its own:
//! [`ALREADY_RUNNING`] when the guard for the requested job is held,
//! [`FEATURE_DISABLED`] for import methods while `import.enabled` is off, and
//! [`ACTION_FAILED`] for everything else an orchestrator operation refuses.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::CoordinatorError;

const VERSION: &str = "2.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    /// Absent for notifications, which get no reply.
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    /// `{"kind": "sync"}` on [`ALREADY_RUNNING`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

pub const ALREADY_RUNNING: i32 = -32001;
pub const FEATURE_DISABLED: i32 = -32002;
pub const ACTION_FAILED: i32 = -32003;

impl Request {
    /// A call expecting a reply. The client opens one connection per call, so
    /// the id is constant.
    pub fn call(method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: VERSION.to_string(),
            method: method.to_string(),
            params,
            id: Some(Value::from(1)),
        }
    }

    /// Decode one line read from a client.
    ///
    /// Malformed input comes back as the error reply to send instead.
    pub fn decode(line: &str) -> Result<Self, Response> {
        let request: Self =
            serde_json::from_str(line).map_err(|e| Response::parse_error(e.to_string()))?;
        if request.jsonrpc != VERSION || request.method.is_empty() {
            let id = request.id.unwrap_or(Value::Null);
            return Err(Response::invalid_request(id));
        }
        Ok(request)
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

impl Response {
    pub fn success(id: Value, result: impl Serialize) -> Self {
        Self {
            jsonrpc: VERSION.to_string(),
            result: Some(serde_json::to_value(result).unwrap_or(Value::Null)),
            error: None,
            id,
        }
    }

    fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Reply for an orchestrator operation that was refused or failed.
    pub fn refused(id: Value, err: &CoordinatorError) -> Self {
        Self::failure(id, RpcError::from(err))
    }

    // The id of an unparseable line is unknown, so it is always null.
    fn parse_error(details: String) -> Self {
        Self::failure(Value::Null, RpcError::new(PARSE_ERROR, details))
    }

    fn invalid_request(id: Value) -> Self {
        Self::failure(
            id,
            RpcError::new(INVALID_REQUEST, "expected a JSON-RPC 2.0 request with a method"),
        )
    }

    pub fn method_not_found(id: Value, method: &str) -> Self {
        Self::failure(
            id,
            RpcError::new(METHOD_NOT_FOUND, format!("Method not found: {}", method)),
        )
    }

    pub fn invalid_params(id: Value, details: impl Into<String>) -> Self {
        Self::failure(id, RpcError::new(INVALID_PARAMS, details))
    }

    /// Split into the caller's view: a result value or the daemon's error.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

impl RpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<&CoordinatorError> for RpcError {
    fn from(err: &CoordinatorError) -> Self {
        let message = err.to_string();
        match err {
            CoordinatorError::AlreadyRunning(kind) => Self {
                code: ALREADY_RUNNING,
                message,
                data: Some(json!({ "kind": kind })),
            },
            CoordinatorError::ImportDisabled => Self::new(FEATURE_DISABLED, message),
            _ => Self::new(ACTION_FAILED, message),
        }
    }
}

/// Serialize `message` as one newline-terminated frame.
pub fn encode_line(message: &impl Serialize) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}
