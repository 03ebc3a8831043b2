//! Stdio transport: lines on stdin/stdout, the default MCP server wiring.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;

use crate::mcp::transport::Transport;
use crate::utils::error::{McpError, McpResult};

/// Line transport over the process's stdin and stdout.
#[derive(Debug)]
pub struct StdioTransport {
    stdin: Mutex<BufReader<Stdin>>,
    stdout: Mutex<Stdout>,
    closed: AtomicBool,
}

impl StdioTransport {
    /// Wraps the current process streams.
    pub fn new() -> Self {
        Self {
            stdin: Mutex::new(BufReader::new(tokio::io::stdin())),
            stdout: Mutex::new(tokio::io::stdout()),
            closed: AtomicBool::new(false),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send_line(&self, line: &str) -> McpResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::ConnectionClosed);
        }
        let mut stdout = self.stdout.lock().await;
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        Ok(())
    }

    async fn recv_line(&self) -> McpResult<Option<String>> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let mut stdin = self.stdin.lock().await;
        let mut line = String::new();
        let read = stdin.read_line(&mut line).await?;
        if read == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    async fn close(&self) -> McpResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}
