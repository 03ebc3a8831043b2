//! Transport layer for the MCP protocol.
//!
//! A transport is a duplex channel carrying newline-delimited JSON lines.
//! The engine never touches raw bytes outside this module; everything above
//! it sends and receives whole lines.

pub mod memory;
pub mod stdio;
pub mod tcp;

use async_trait::async_trait;

use crate::utils::error::McpResult;

pub use memory::{pair, MemoryTransport};
pub use stdio::StdioTransport;
pub use tcp::TcpTransport;

/// Duplex line channel used by an MCP component.
///
/// Implementations take `&self` and guard their halves internally: the read
/// loop is the only consumer of `recv_line`, but `send_line` is called
/// concurrently from application tasks, inbound workers, and drop guards.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends one line, appending the newline delimiter.
    async fn send_line(&self, line: &str) -> McpResult<()>;

    /// Receives the next line, without its delimiter.
    ///
    /// `Ok(None)` signals orderly end of stream.
    async fn recv_line(&self) -> McpResult<Option<String>>;

    /// Closes the channel. Further sends fail; pending receives drain.
    async fn close(&self) -> McpResult<()>;

    /// Whether the channel is still open.
    fn is_connected(&self) -> bool;
}
