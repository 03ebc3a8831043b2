//! In-memory transport pair for tests and in-process wiring.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, Mutex};

use crate::mcp::transport::Transport;
use crate::utils::error::{McpError, McpResult};

/// One end of a cross-connected in-memory line channel.
#[derive(Debug)]
pub struct MemoryTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
    closed: AtomicBool,
}

/// Creates two transports wired to each other: lines sent on one side
/// arrive on the other.
pub fn pair() -> (MemoryTransport, MemoryTransport) {
    let (left_tx, right_rx) = mpsc::unbounded_channel();
    let (right_tx, left_rx) = mpsc::unbounded_channel();
    (
        MemoryTransport {
            tx: left_tx,
            rx: Mutex::new(left_rx),
            closed: AtomicBool::new(false),
        },
        MemoryTransport {
            tx: right_tx,
            rx: Mutex::new(right_rx),
            closed: AtomicBool::new(false),
        },
    )
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_line(&self, line: &str) -> McpResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::ConnectionClosed);
        }
        self.tx
            .send(line.to_string())
            .map_err(|_| McpError::ConnectionClosed)
    }

    async fn recv_line(&self) -> McpResult<Option<String>> {
        let mut rx = self.rx.lock().await;
        Ok(rx.recv().await)
    }

    async fn close(&self) -> McpResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.rx.lock().await.close();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lines_cross_the_pair() {
        let (a, b) = pair();
        a.send_line("hello").await.unwrap();
        assert_eq!(b.recv_line().await.unwrap(), Some("hello".to_string()));
        b.send_line("world").await.unwrap();
        assert_eq!(a.recv_line().await.unwrap(), Some("world".to_string()));
    }

    #[tokio::test]
    async fn dropped_peer_ends_the_stream() {
        let (a, b) = pair();
        drop(a);
        assert_eq!(b.recv_line().await.unwrap(), None);
        assert!(matches!(
            b.send_line("x").await,
            Err(McpError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn close_rejects_further_sends() {
        let (a, _b) = pair();
        a.close().await.unwrap();
        assert!(!a.is_connected());
        assert!(matches!(
            a.send_line("x").await,
            Err(McpError::ConnectionClosed)
        ));
    }
}
