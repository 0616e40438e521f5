//! JSON-RPC 2.0 message types for the MCP protocol.
//!
//! Incoming lines are decoded to a [`Value`] first and then classified with
//! [`classify`], so that a malformed element inside a batch yields its own
//! error instead of failing the whole line.
//!
//! # Message Types
//!
//! - **Request**: has a `method` string and an `id` key; exactly one reply
//! - **Notification**: has a `method` string and no `id` key; never a reply
//! - **Client response**: has an `id` and a `result` or `error`; dropped
//!
//! # ID Constraints
//!
//! Request IDs must be strings or numbers; numbers are echoed back exactly as
//! received, fractional and out-of-`i64` values included. A request whose `id`
//! is `null`, a boolean, an array or an object is rejected with an
//! invalid-request error carrying a `null` id.

use serde::Serialize;
use serde_json::{Map, Number, Value};

/// The JSON-RPC version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol version returned when the client does not name one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-06-18";

/// Server name for capability negotiation.
pub const SERVER_NAME: &str = "kalshi-mcp-server";

/// A JSON-RPC 2.0 request ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request ID.
    Number(Number),
    /// String request ID.
    String(String),
}

impl RequestId {
    /// Reads an ID from a raw JSON value.
    ///
    /// Returns `None` for `null`, booleans, arrays and objects.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// A JSON-RPC 2.0 request message.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcRequest {
    /// Request identifier.
    pub id: RequestId,
    /// The method to invoke.
    pub method: String,
    /// Parameters for the method, if any were sent.
    pub params: Option<Value>,
}

/// A JSON-RPC 2.0 notification message (incoming).
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcNotification {
    /// The notification method.
    pub method: String,
    /// Parameters for the notification, if any were sent.
    pub params: Option<Value>,
}

/// A successful JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// The request ID this response corresponds to.
    pub id: RequestId,

    /// The result of the method call.
    pub result: Value,
}

impl JsonRpcResponse {
    /// Creates a new success response.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Value is not const-compatible
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        }
    }
}

/// Standard JSON-RPC 2.0 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received by the server.
    ParseError,
    /// The JSON sent is not a valid Request object.
    InvalidRequest,
    /// The method does not exist or is not available.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal JSON-RPC error.
    InternalError,
}

impl ErrorCode {
    /// Returns the numeric code for this error.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
        }
    }

    /// Returns the default message for this error code.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorData {
    /// The error code.
    pub code: i32,

    /// A short description of the error.
    pub message: String,

    /// Additional information about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorData {
    /// Creates a new error from an error code.
    #[must_use]
    pub fn from_code(code: ErrorCode) -> Self {
        Self::with_message(code, code.default_message())
    }

    /// Creates a new error with a custom message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Adds additional data to the error.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A JSON-RPC 2.0 error response.
///
/// The `id` is always serialised; it is `null` when the request ID could not
/// be determined.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// The request ID this error corresponds to (if known).
    pub id: Option<RequestId>,

    /// The error details.
    pub error: JsonRpcErrorData,
}

impl JsonRpcError {
    /// Creates a new error response.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // JsonRpcErrorData contains String
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorData) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            error,
        }
    }

    /// Creates a parse error response (ID cannot be determined).
    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(None, JsonRpcErrorData::from_code(ErrorCode::ParseError))
    }

    /// Creates an invalid request error response.
    #[must_use]
    pub fn invalid_request(id: Option<RequestId>) -> Self {
        Self::new(id, JsonRpcErrorData::from_code(ErrorCode::InvalidRequest))
    }

    /// Creates a method not found error response.
    #[must_use]
    pub fn method_not_found(id: RequestId) -> Self {
        Self::new(Some(id), JsonRpcErrorData::from_code(ErrorCode::MethodNotFound))
    }

    /// Creates an invalid params error response.
    #[must_use]
    pub fn invalid_params(id: RequestId, message: impl Into<String>) -> Self {
        Self::new(
            Some(id),
            JsonRpcErrorData::with_message(ErrorCode::InvalidParams, message),
        )
    }

    /// Creates an internal error response with a custom message.
    #[must_use]
    pub fn internal_error(id: RequestId, message: impl Into<String>) -> Self {
        Self::new(
            Some(id),
            JsonRpcErrorData::with_message(ErrorCode::InternalError, message),
        )
    }

    /// Creates a generic internal error carrying `data.detail`.
    #[must_use]
    pub fn internal_detail(id: RequestId, detail: impl Into<String>) -> Self {
        Self::new(
            Some(id),
            JsonRpcErrorData::from_code(ErrorCode::InternalError)
                .with_data(serde_json::json!({ "detail": detail.into() })),
        )
    }
}

/// A reply to one incoming message.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JsonRpcReply {
    /// Success.
    Response(JsonRpcResponse),
    /// Failure.
    Error(JsonRpcError),
}

impl From<JsonRpcResponse> for JsonRpcReply {
    fn from(response: JsonRpcResponse) -> Self {
        Self::Response(response)
    }
}

impl From<JsonRpcError> for JsonRpcReply {
    fn from(error: JsonRpcError) -> Self {
        Self::Error(error)
    }
}

/// What gets written for one input line.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    /// Reply to a single message.
    Single(JsonRpcReply),
    /// Replies to a batch, in input order.
    Batch(Vec<JsonRpcReply>),
}

/// A classified incoming message.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    /// A request expecting a response.
    Request(JsonRpcRequest),
    /// A notification (no response expected).
    Notification(JsonRpcNotification),
    /// A response sent by the client; this server never issues requests.
    ClientResponse,
}

/// Decodes one input line.
///
/// # Errors
///
/// Returns a parse error (id `null`) if the line is not valid JSON.
pub fn parse_line(line: &str) -> Result<Value, JsonRpcError> {
    serde_json::from_str(line).map_err(|_| JsonRpcError::parse_error())
}

/// Classifies one decoded message (a single object or one batch element).
///
/// # Errors
///
/// Returns an invalid-request error if the value is not a JSON-RPC 2.0
/// request, notification or client response.
pub fn classify(value: Value) -> Result<IncomingMessage, JsonRpcError> {
    let Value::Object(mut obj) = value else {
        return Err(JsonRpcError::invalid_request(None));
    };

    if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(JsonRpcError::invalid_request(id_of(&obj)));
    }

    let params = obj.remove("params").filter(|p| !p.is_null());
    if let Some(Value::String(method)) = obj.remove("method") {
        if !obj.contains_key("id") {
            return Ok(IncomingMessage::Notification(JsonRpcNotification {
                method,
                params,
            }));
        }
        return id_of(&obj)
            .map(|id| IncomingMessage::Request(JsonRpcRequest { id, method, params }))
            .ok_or_else(|| JsonRpcError::invalid_request(None));
    }

    if obj.contains_key("id") && (obj.contains_key("result") || obj.contains_key("error")) {
        return Ok(IncomingMessage::ClientResponse);
    }

    Err(JsonRpcError::invalid_request(id_of(&obj)))
}

fn id_of(obj: &Map<String, Value>) -> Option<RequestId> {
    obj.get("id").and_then(RequestId::from_value)
}
