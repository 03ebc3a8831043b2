#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::invalid_codeblock_attributes)]
#![deny(rustdoc::invalid_html_tags)]
#![deny(rustdoc::bare_urls)]

//! mcp-engine is an asynchronous bidirectional JSON-RPC engine for the Model
//! Context Protocol (MCP). It correlates concurrent outbound requests with
//! their responses, runs every inbound request in its own cancellable task,
//! paginates merged catalogs of tools, prompts, and resources, and tracks
//! per-resource subscriptions — all over a newline-delimited JSON transport.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mcp_engine::config::{ClientConfig, ServerConfig};
//! use mcp_engine::mcp::client::Client;
//! use mcp_engine::mcp::resources::ResourceProviderManager;
//! use mcp_engine::mcp::server::{Catalog, Server};
//! use mcp_engine::mcp::transport::memory;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // In-process wiring; swap in StdioTransport or TcpTransport for real use.
//!     let (client_side, server_side) = memory::pair();
//!
//!     let server = Server::new(
//!         Arc::new(server_side),
//!         ServerConfig::default(),
//!         Catalog::default(),
//!         Catalog::default(),
//!         ResourceProviderManager::new(),
//!     );
//!     server.start()?;
//!
//!     let client = Client::new(Arc::new(client_side), ClientConfig::default());
//!     client.start()?;
//!     let info = client.initialize().await?;
//!     println!("connected to {} {}", info.server_info.name, info.server_info.version);
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

/// Core MCP protocol implementation including message types, correlation,
/// dispatch, and the client/server components.
pub mod mcp;

/// Utility modules for error handling and common functionality.
pub mod utils;

/// Configuration management
pub mod config;
