//! Configuration values for clients, servers, and transports.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::mcp::types::PROTOCOL_VERSION;

/// Default value for page_size
fn default_page_size() -> usize {
    50
}

/// Default value for connect_timeout_secs
fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_protocol_version() -> String {
    PROTOCOL_VERSION.to_string()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Configuration for an MCP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Client name reported during the handshake
    pub name: String,

    /// Client version reported during the handshake
    #[serde(default = "default_version")]
    pub version: String,

    /// Protocol revision requested in `initialize`
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: "mcp-engine-client".to_string(),
            version: default_version(),
            protocol_version: default_protocol_version(),
        }
    }
}

/// Configuration for an MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server name reported during the handshake
    pub name: String,

    /// Server version reported during the handshake
    #[serde(default = "default_version")]
    pub version: String,

    /// Protocol revision the server speaks by default
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,

    /// Default page size for catalog listings when the client sends no cursor
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "mcp-engine-server".to_string(),
            version: default_version(),
            protocol_version: default_protocol_version(),
            page_size: default_page_size(),
        }
    }
}

/// Configuration for the TCP transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Endpoint to connect to, `host:port`
    pub addr: String,

    /// Timeout for establishing the connection in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl TransportConfig {
    /// Connection timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}
