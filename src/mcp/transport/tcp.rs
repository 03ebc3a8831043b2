//! TCP transport with manual line framing.

use async_trait::async_trait;
use bytes::BytesMut;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use crate::mcp::transport::Transport;
use crate::utils::error::{McpError, McpResult};

/// Line transport over a TCP stream.
#[derive(Debug)]
pub struct TcpTransport {
    reader: Mutex<LineReader>,
    writer: Mutex<OwnedWriteHalf>,
    closed: AtomicBool,
}

#[derive(Debug)]
struct LineReader {
    half: OwnedReadHalf,
    buffer: BytesMut,
}

impl TcpTransport {
    /// Connects to a remote endpoint, bounded by `connect_timeout`.
    pub async fn connect(addr: &str, connect_timeout: Duration) -> McpResult<Self> {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| McpError::Transport(format!("connect to {} timed out", addr)))??;
        debug!("connected to {}", addr);
        Ok(Self::from_stream(stream))
    }

    /// Wraps an already-established stream, e.g. one taken from a listener.
    pub fn from_stream(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: Mutex::new(LineReader {
                half: read_half,
                buffer: BytesMut::with_capacity(4096),
            }),
            writer: Mutex::new(write_half),
            closed: AtomicBool::new(false),
        }
    }
}

impl LineReader {
    /// Pulls the next complete line out of the buffer, reading more bytes
    /// as needed. A final unterminated line before EOF is still delivered.
    async fn next_line(&mut self) -> McpResult<Option<String>> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
                let mut line = self.buffer.split_to(pos + 1);
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.truncate(line.len() - 1);
                }
                let text = String::from_utf8(line.to_vec())
                    .map_err(|_| McpError::Transport("non-UTF-8 line on the wire".to_string()))?;
                return Ok(Some(text));
            }

            let read = self.half.read_buf(&mut self.buffer).await?;
            if read == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let line = self.buffer.split();
                let text = String::from_utf8(line.to_vec())
                    .map_err(|_| McpError::Transport("non-UTF-8 line on the wire".to_string()))?;
                return Ok(Some(text));
            }
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send_line(&self, line: &str) -> McpResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::ConnectionClosed);
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    async fn recv_line(&self) -> McpResult<Option<String>> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let mut reader = self.reader.lock().await;
        reader.next_line().await
    }

    async fn close(&self) -> McpResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn lines_cross_a_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            TcpTransport::from_stream(stream)
        });

        let client = TcpTransport::connect(&addr, Duration::from_secs(5))
            .await
            .unwrap();
        let server = accept.await.unwrap();

        client.send_line(r#"{"jsonrpc":"2.0","method":"ping","id":"1"}"#).await.unwrap();
        let received = server.recv_line().await.unwrap().unwrap();
        assert!(received.contains("\"ping\""));

        server.send_line("reply").await.unwrap();
        assert_eq!(client.recv_line().await.unwrap(), Some("reply".to_string()));
    }

    #[tokio::test]
    async fn split_writes_still_frame_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            TcpTransport::from_stream(stream)
        });

        let mut raw = TcpStream::connect(&addr).await.unwrap();
        let server = accept.await.unwrap();

        raw.write_all(b"hal").await.unwrap();
        raw.flush().await.unwrap();
        raw.write_all(b"f one\nsecond\n").await.unwrap();
        raw.flush().await.unwrap();

        assert_eq!(server.recv_line().await.unwrap(), Some("half one".to_string()));
        assert_eq!(server.recv_line().await.unwrap(), Some("second".to_string()));

        drop(raw);
        assert_eq!(server.recv_line().await.unwrap(), None);
    }
}
