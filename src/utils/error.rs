use thiserror::Error;

/// A specialized Result type for MCP operations.
pub type McpResult<T> = Result<T, McpError>;

/// Represents errors that can occur during MCP protocol operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// The line could not be parsed as JSON
    #[error("Parse error: {0}")]
    Parse(String),

    /// The message parsed as JSON but matches no JSON-RPC shape
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The requested method, tool, or prompt is not registered
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// The request parameters failed validation
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// A handler failed while processing a request
    #[error("Internal error: {0}")]
    Internal(String),

    /// No provider knows the requested resource URI
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// IO error during read/write operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialization error occurred with a descriptive message
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A deserialization error occurred with a descriptive message
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// The transport failed while sending or receiving
    #[error("Transport error: {0}")]
    Transport(String),

    /// The connection was closed while requests were still in flight
    #[error("Connection closed")]
    ConnectionClosed,

    /// The awaited request was cancelled locally
    #[error("Request cancelled")]
    Cancelled,

    /// The component is not in a state that allows the operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The peer answered with a JSON-RPC error payload
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code returned by the peer
        code: i32,
        /// Error message returned by the peer
        message: String,
    },
}
