//! # MCP Protocol Types
//!
//! Core types for the Model Context Protocol wire format: the JSON-RPC 2.0
//! request, response, and notification objects, the error object with its
//! standard code constructors, and the [`Method`] table mapping internal
//! discriminants to wire method names.
//!
//! Messages travel as newline-delimited JSON. A line is classified purely by
//! structure: an `id` together with `result` or `error` (and no `method`) is
//! a response, an `id` with a `method` is a request, a `method` without an
//! `id` is a notification. Anything else is a decode failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::utils::error::{McpError, McpResult};

/// The JSON-RPC protocol version tag carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// The MCP protocol revision this engine speaks by default.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Wire methods understood by the engine.
///
/// The wire name is looked up through [`Method::as_str`]; parsing an inbound
/// name goes through [`Method::from_wire`]. Unknown inbound names simply fail
/// the lookup and are answered with a method-not-found error (requests) or
/// dropped (notifications).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `initialize` handshake request
    Initialize,
    /// `ping` liveness request
    Ping,
    /// `tools/list` catalog page request
    ToolsList,
    /// `tools/call` invocation request
    ToolsCall,
    /// `prompts/list` catalog page request
    PromptsList,
    /// `prompts/get` rendering request
    PromptsGet,
    /// `resources/list` catalog page request
    ResourcesList,
    /// `resources/read` content request
    ResourcesRead,
    /// `resources/templates/list` catalog page request
    ResourcesTemplatesList,
    /// `resources/subscribe` request
    ResourcesSubscribe,
    /// `resources/unsubscribe` request
    ResourcesUnsubscribe,
    /// `notifications/initialized` handshake completion
    Initialized,
    /// `notifications/cancelled` request cancellation
    Cancelled,
    /// `notifications/resources/updated` per-URI change
    ResourceUpdated,
    /// `notifications/resources/list_changed` catalog change
    ResourceListChanged,
    /// `notifications/tools/list_changed` catalog change
    ToolListChanged,
    /// `notifications/prompts/list_changed` catalog change
    PromptListChanged,
}

impl Method {
    /// Returns the wire name for this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Initialize => "initialize",
            Method::Ping => "ping",
            Method::ToolsList => "tools/list",
            Method::ToolsCall => "tools/call",
            Method::PromptsList => "prompts/list",
            Method::PromptsGet => "prompts/get",
            Method::ResourcesList => "resources/list",
            Method::ResourcesRead => "resources/read",
            Method::ResourcesTemplatesList => "resources/templates/list",
            Method::ResourcesSubscribe => "resources/subscribe",
            Method::ResourcesUnsubscribe => "resources/unsubscribe",
            Method::Initialized => "notifications/initialized",
            Method::Cancelled => "notifications/cancelled",
            Method::ResourceUpdated => "notifications/resources/updated",
            Method::ResourceListChanged => "notifications/resources/list_changed",
            Method::ToolListChanged => "notifications/tools/list_changed",
            Method::PromptListChanged => "notifications/prompts/list_changed",
        }
    }

    /// Looks up a wire name, returning `None` for unknown methods.
    pub fn from_wire(name: &str) -> Option<Method> {
        match name {
            "initialize" => Some(Method::Initialize),
            "ping" => Some(Method::Ping),
            "tools/list" => Some(Method::ToolsList),
            "tools/call" => Some(Method::ToolsCall),
            "prompts/list" => Some(Method::PromptsList),
            "prompts/get" => Some(Method::PromptsGet),
            "resources/list" => Some(Method::ResourcesList),
            "resources/read" => Some(Method::ResourcesRead),
            "resources/templates/list" => Some(Method::ResourcesTemplatesList),
            "resources/subscribe" => Some(Method::ResourcesSubscribe),
            "resources/unsubscribe" => Some(Method::ResourcesUnsubscribe),
            "notifications/initialized" => Some(Method::Initialized),
            "notifications/cancelled" => Some(Method::Cancelled),
            "notifications/resources/updated" => Some(Method::ResourceUpdated),
            "notifications/resources/list_changed" => Some(Method::ResourceListChanged),
            "notifications/tools/list_changed" => Some(Method::ToolListChanged),
            "notifications/prompts/list_changed" => Some(Method::PromptListChanged),
            _ => None,
        }
    }

    /// Whether this method travels as a notification rather than a request.
    pub fn is_notification(&self) -> bool {
        matches!(
            self,
            Method::Initialized
                | Method::Cancelled
                | Method::ResourceUpdated
                | Method::ResourceListChanged
                | Method::ToolListChanged
                | Method::PromptListChanged
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders a request id as the canonical table key.
///
/// String ids key by their content, numeric ids by their decimal rendering,
/// so `"7"` and `7` from a sloppy peer land on the same entry.
pub(crate) fn id_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// JSON-RPC 2.0 request object for MCP protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version, always "2.0"
    pub jsonrpc: String,
    /// Method name to invoke
    pub method: String,
    /// Parameters for the method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Unique identifier for the request
    pub id: Value,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request for a known method
    pub fn new(method: Method, params: Option<Value>, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.as_str().to_string(),
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 response object for MCP protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version, always "2.0"
    pub jsonrpc: String,
    /// Result of the method call, present iff there is no error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error information, present iff there is no result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request identifier that this response corresponds to
    pub id: Value,
}

impl JsonRpcResponse {
    /// Create a new successful JSON-RPC response
    pub fn success(result: Value, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create a new error JSON-RPC response
    pub fn error(error: JsonRpcError, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Unwraps the result payload, converting an error payload into
    /// [`McpError::Rpc`].
    pub fn into_result(self) -> McpResult<Value> {
        if let Some(error) = self.error {
            return Err(McpError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        self.result
            .ok_or_else(|| McpError::InvalidRequest("response carries neither result nor error".to_string()))
    }
}

/// JSON-RPC 2.0 notification object for MCP protocol (has no id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version, always "2.0"
    pub jsonrpc: String,
    /// Method name to invoke
    pub method: String,
    /// Parameters for the method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC notification for a known method
    pub fn new(method: Method, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.as_str().to_string(),
            params,
        }
    }
}

/// JSON-RPC 2.0 error object for MCP protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create a new JSON-RPC error
    pub fn new(code: i32, message: &str, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.to_string(),
            data,
        }
    }

    /// Parse error (-32700)
    pub fn parse_error(message: &str) -> Self {
        Self::new(-32700, message, None)
    }

    /// Invalid request error (-32600)
    pub fn invalid_request(message: &str) -> Self {
        Self::new(-32600, message, None)
    }

    /// Method not found error (-32601)
    pub fn method_not_found(message: &str) -> Self {
        Self::new(-32601, message, None)
    }

    /// Invalid params error (-32602)
    pub fn invalid_params(message: &str) -> Self {
        Self::new(-32602, message, None)
    }

    /// Internal error (-32603)
    pub fn internal_error(message: &str) -> Self {
        Self::new(-32603, message, None)
    }

    /// Resource not found error (-32002, MCP extension)
    pub fn resource_not_found(message: &str) -> Self {
        Self::new(-32002, message, None)
    }
}

impl From<&McpError> for JsonRpcError {
    /// Maps an engine error onto the wire error taxonomy. Only the message
    /// text crosses the boundary.
    fn from(err: &McpError) -> Self {
        match err {
            McpError::Parse(msg) => JsonRpcError::parse_error(msg),
            McpError::InvalidRequest(msg) => JsonRpcError::invalid_request(msg),
            McpError::MethodNotFound(msg) => {
                JsonRpcError::method_not_found(&format!("Method '{}' not found", msg))
            }
            McpError::InvalidParams(msg) => JsonRpcError::invalid_params(msg),
            McpError::ResourceNotFound(uri) => {
                JsonRpcError::resource_not_found(&format!("Resource not found: {}", uri))
            }
            McpError::Rpc { code, message } => JsonRpcError::new(*code, message, None),
            other => JsonRpcError::internal_error(&other.to_string()),
        }
    }
}

/// A decoded JSON-RPC message, tagged by its structural shape.
#[derive(Debug, Clone)]
pub enum JsonRpcMessage {
    /// A request expecting a correlated response
    Request(JsonRpcRequest),
    /// A response to a previously sent request
    Response(JsonRpcResponse),
    /// A one-way notification
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    /// Classifies and decodes one wire line.
    ///
    /// Classification is structural: `id` + (`result` | `error`) and no
    /// `method` is a response, `id` + `method` is a request, `method` without
    /// `id` is a notification. A response carrying both or neither of
    /// `result`/`error` is rejected.
    pub fn from_line(line: &str) -> McpResult<Self> {
        let value: Value =
            serde_json::from_str(line).map_err(|e| McpError::Parse(e.to_string()))?;

        let obj = value
            .as_object()
            .ok_or_else(|| McpError::InvalidRequest("message is not a JSON object".to_string()))?;

        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(McpError::InvalidRequest(
                "missing or unsupported jsonrpc version".to_string(),
            ));
        }

        let has_id = obj.contains_key("id");
        let has_method = obj.contains_key("method");
        let has_result = obj.contains_key("result");
        let has_error = obj.contains_key("error");

        if has_id && !has_method {
            if has_result == has_error {
                return Err(McpError::InvalidRequest(
                    "response must carry exactly one of result or error".to_string(),
                ));
            }
            let response: JsonRpcResponse = serde_json::from_value(value)
                .map_err(|e| McpError::Deserialization(e.to_string()))?;
            return Ok(JsonRpcMessage::Response(response));
        }

        if has_id && has_method {
            let request: JsonRpcRequest = serde_json::from_value(value)
                .map_err(|e| McpError::Deserialization(e.to_string()))?;
            return Ok(JsonRpcMessage::Request(request));
        }

        if has_method {
            let notification: JsonRpcNotification = serde_json::from_value(value)
                .map_err(|e| McpError::Deserialization(e.to_string()))?;
            return Ok(JsonRpcMessage::Notification(notification));
        }

        Err(McpError::InvalidRequest(
            "message matches no JSON-RPC shape".to_string(),
        ))
    }

    /// Encodes the message as a single wire line (without the trailing
    /// newline).
    pub fn to_line(&self) -> McpResult<String> {
        let encoded = match self {
            JsonRpcMessage::Request(r) => serde_json::to_string(r),
            JsonRpcMessage::Response(r) => serde_json::to_string(r),
            JsonRpcMessage::Notification(n) => serde_json::to_string(n),
        };
        encoded.map_err(|e| McpError::Serialization(e.to_string()))
    }
}
