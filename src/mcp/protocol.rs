//! Parameter and result payloads for the MCP methods.
//!
//! These are the typed bodies carried inside `params` and `result`. Field
//! names follow the wire convention (camelCase) via serde renames; optional
//! fields are skipped when absent so encoded lines stay minimal.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mcp::types::PROTOCOL_VERSION;

/// Identity of one side of the connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    /// Component name
    pub name: String,
    /// Component version
    pub version: String,
}

/// `initialize` request parameters sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol revision the client wants to speak
    pub protocol_version: String,
    /// Client capability flags; an empty object when none apply
    #[serde(default)]
    pub capabilities: Value,
    /// Client identity
    pub client_info: Implementation,
}

impl InitializeParams {
    /// Builds initialize parameters for the default protocol revision.
    pub fn new(client_info: Implementation) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: Value::Object(serde_json::Map::new()),
            client_info,
        }
    }
}

/// Capability flag for a catalog that can announce list changes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListChangedCapability {
    /// Whether the server emits the corresponding list_changed notification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Capability flags for the resources catalog.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapability {
    /// Whether per-resource subscriptions are supported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    /// Whether the server emits resources/list_changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Server capability flags advertised during initialization.
///
/// A flag is present iff the corresponding catalog is non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool catalog capability, present when tools are registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ListChangedCapability>,
    /// Prompt catalog capability, present when prompts are registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ListChangedCapability>,
    /// Resource catalog capability, present when providers are registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
}

/// `initialize` result returned by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol revision the server agreed to
    pub protocol_version: String,
    /// Server capability flags
    pub capabilities: ServerCapabilities,
    /// Server identity
    pub server_info: Implementation,
}

/// `notifications/cancelled` parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledParams {
    /// Id of the request being cancelled
    pub request_id: Value,
    /// Optional human-readable reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Shared parameters for the paginated `*/list` methods.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListParams {
    /// Continuation token from a previous page, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// One tool in the `tools/list` catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    /// Registered tool name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool arguments
    pub input_schema: Value,
}

/// `tools/list` result page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    /// Tools on this page
    pub tools: Vec<ToolInfo>,
    /// Continuation token; absent on the final page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `tools/call` parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Tool to invoke
    pub name: String,
    /// Arguments, validated against the declared schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// One argument slot of a prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the argument must be supplied
    #[serde(default)]
    pub required: bool,
}

/// One prompt in the `prompts/list` catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptInfo {
    /// Registered prompt name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
}

/// `prompts/list` result page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPromptsResult {
    /// Prompts on this page
    pub prompts: Vec<PromptInfo>,
    /// Continuation token; absent on the final page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `prompts/get` parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptParams {
    /// Prompt to render
    pub name: String,
    /// Arguments for the prompt template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}
