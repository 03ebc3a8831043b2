//! Base MCP component: one transport, one read loop, shared engine state.
//!
//! Client and Server are thin specializations over this type. The component
//! owns the transport, the request correlator, the inbound task table, and
//! the dispatcher; `start` launches the read loop in its own task so a
//! failing connection can never unwind into application code. Outbound
//! writes go straight to the transport from the calling task, so writes in
//! one direction keep their invocation order.

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::mcp::correlator::{CancelGuard, RequestCorrelator};
use crate::mcp::dispatcher::{Dispatcher, ProtocolHandler};
use crate::mcp::tasks::IncomingTaskTable;
use crate::mcp::transport::Transport;
use crate::mcp::types::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, Method,
};
use crate::utils::error::{McpError, McpResult};

/// Lifecycle of an MCP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, read loop not yet running
    Created,
    /// Read loop running, handshake not begun
    Started,
    /// `initialize` in flight
    Initializing,
    /// Handshake complete, full surface available
    Ready,
}

/// Engine core shared by [`crate::mcp::client::Client`] and
/// [`crate::mcp::server::Server`].
pub struct McpComponent {
    transport: Arc<dyn Transport>,
    correlator: Arc<RequestCorrelator>,
    tasks: Arc<IncomingTaskTable>,
    handler: Arc<dyn ProtocolHandler>,
    read_loop: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl std::fmt::Debug for McpComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpComponent")
            .field("started", &self.started.load(Ordering::SeqCst))
            .field("correlator", &self.correlator)
            .field("tasks", &self.tasks)
            .finish()
    }
}

impl McpComponent {
    /// Creates a component over a transport and a protocol handler.
    pub fn new(transport: Arc<dyn Transport>, handler: Arc<dyn ProtocolHandler>) -> Self {
        Self {
            transport,
            correlator: Arc::new(RequestCorrelator::new()),
            tasks: Arc::new(IncomingTaskTable::new()),
            handler,
            read_loop: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Launches the read loop. May be called once.
    pub fn start(&self) -> McpResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(McpError::InvalidState(
                "component already started".to_string(),
            ));
        }

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.correlator),
            Arc::clone(&self.tasks),
            Arc::clone(&self.handler),
            Arc::clone(&self.transport),
        );
        let transport = Arc::clone(&self.transport);
        let correlator = Arc::clone(&self.correlator);
        let handler = Arc::clone(&self.handler);

        let handle = tokio::spawn(async move {
            read_loop(transport, correlator, handler, dispatcher).await;
        });

        let mut read_loop_slot = self.read_loop.lock().expect("read loop lock poisoned");
        *read_loop_slot = Some(handle);
        Ok(())
    }

    /// Whether `start` has run.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Sends a request and suspends until its response arrives.
    ///
    /// The returned response may itself carry an `error` payload — that is a
    /// completed round trip, distinct from the `Err` channel, which means
    /// the request never terminally resolved (transport loss) or was
    /// cancelled. Dropping the returned future before it resolves removes
    /// the pending entry and best-effort notifies the peer with
    /// `notifications/cancelled`.
    pub async fn send_request(
        &self,
        method: Method,
        params: Option<Value>,
    ) -> McpResult<JsonRpcResponse> {
        if !self.is_started() {
            return Err(McpError::InvalidState(
                "component not started".to_string(),
            ));
        }

        let id = self.correlator.next_request_id();
        let request = JsonRpcRequest::new(method, params, id.clone());
        let line = JsonRpcMessage::Request(request).to_line()?;

        let rx = self.correlator.register(&id);
        let mut guard = CancelGuard::new(
            Arc::clone(&self.correlator),
            Arc::clone(&self.transport),
            id.clone(),
        );

        if let Err(e) = self.transport.send_line(&line).await {
            guard.disarm();
            self.correlator.remove(&id);
            return Err(e);
        }

        match rx.await {
            Ok(response) => {
                guard.disarm();
                Ok(response)
            }
            Err(_) => {
                // fail_all already cleared the entry; nothing to notify.
                guard.disarm();
                Err(McpError::ConnectionClosed)
            }
        }
    }

    /// Sends a one-way notification.
    pub async fn send_notification(&self, method: Method, params: Option<Value>) -> McpResult<()> {
        let notification = JsonRpcNotification::new(method, params);
        self.send_notification_message(notification).await
    }

    /// Sends an already-built notification.
    pub async fn send_notification_message(
        &self,
        notification: JsonRpcNotification,
    ) -> McpResult<()> {
        let line = JsonRpcMessage::Notification(notification).to_line()?;
        self.transport.send_line(&line).await
    }

    /// Closes the transport, stops the read loop, and fails any requests
    /// still in flight.
    pub async fn close(&self) -> McpResult<()> {
        let _ = self.transport.close().await;
        let handle = {
            let mut read_loop = self.read_loop.lock().expect("read loop lock poisoned");
            read_loop.take()
        };
        if let Some(handle) = handle {
            handle.abort();
        }
        self.correlator.fail_all();
        Ok(())
    }

    /// Number of outbound requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Number of inbound requests currently being served.
    pub fn running_tasks(&self) -> usize {
        self.tasks.running_count()
    }
}

/// The isolated read loop: one task per component for the lifetime of the
/// connection. Decode failures are survivable; transport failures broadcast
/// to all pending requests and end the loop, but do not close the component.
async fn read_loop(
    transport: Arc<dyn Transport>,
    correlator: Arc<RequestCorrelator>,
    handler: Arc<dyn ProtocolHandler>,
    dispatcher: Dispatcher,
) {
    loop {
        match transport.recv_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match JsonRpcMessage::from_line(&line) {
                    Ok(message) => dispatcher.dispatch(message).await,
                    Err(decode_error) => {
                        warn!("dropping undecodable line: {}", decode_error);
                        answer_decode_failure(&transport, &line, &decode_error).await;
                    }
                }
            }
            Ok(None) => {
                info!("peer closed the connection");
                correlator.fail_all();
                handler.on_transport_error(&McpError::ConnectionClosed).await;
                break;
            }
            Err(transport_error) => {
                error!("transport failure: {}", transport_error);
                correlator.fail_all();
                handler.on_transport_error(&transport_error).await;
                break;
            }
        }
    }
    debug!("read loop finished");
}

/// Best-effort error response for a line that failed to decode but still
/// carried a salvageable request id.
async fn answer_decode_failure(transport: &Arc<dyn Transport>, line: &str, error: &McpError) {
    let Some(value) = serde_json::from_str::<Value>(line).ok() else {
        return;
    };
    // Only requests get replies; a broken response or notification has no
    // reply channel.
    let is_request = value.get("method").is_some();
    let Some(id) = value.get("id").filter(|id| !id.is_null()).cloned() else {
        return;
    };
    if !is_request {
        return;
    }
    let response = JsonRpcResponse::error(JsonRpcError::from(error), id);
    if let Ok(encoded) = JsonRpcMessage::Response(response).to_line() {
        if let Err(e) = transport.send_line(&encoded).await {
            debug!("could not answer undecodable request: {}", e);
        }
    }
}
