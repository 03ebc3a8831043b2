//! Inbound message routing.
//!
//! The dispatcher sits between the read loop and everything else. Responses
//! go straight to the correlator. Requests each get their own abortable
//! worker so a slow handler never blocks the connection; the worker's errors
//! are converted to JSON-RPC error payloads at the task boundary and never
//! propagate to the read loop. Notifications are handled inline: a
//! `notifications/cancelled` is resolved against the task table, everything
//! else goes to the protocol handler, whose failures are logged and
//! swallowed.

use async_trait::async_trait;
use futures::future::{AbortHandle, Abortable};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::mcp::correlator::RequestCorrelator;
use crate::mcp::protocol::CancelledParams;
use crate::mcp::tasks::IncomingTaskTable;
use crate::mcp::transport::Transport;
use crate::mcp::types::{
    id_key, JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    Method,
};
use crate::utils::error::{McpError, McpResult};

/// Protocol surface a component specialization implements.
///
/// `handle_request` returns the result payload for a request, or an error
/// the dispatcher turns into a JSON-RPC error response. An unimplemented
/// method must come back as [`McpError::MethodNotFound`].
#[async_trait]
pub trait ProtocolHandler: Send + Sync + 'static {
    /// Handles one inbound request, returning its result payload.
    async fn handle_request(&self, method: &str, params: Option<Value>) -> McpResult<Value>;

    /// Handles one inbound notification.
    async fn handle_notification(&self, method: &str, params: Option<Value>) -> McpResult<()>;

    /// Called after the transport failed or closed and all pending outbound
    /// requests were failed. The component itself stays alive.
    async fn on_transport_error(&self, _error: &McpError) {}
}

/// Routes decoded messages to the correlator, a worker task, or the
/// notification path.
pub struct Dispatcher {
    correlator: Arc<RequestCorrelator>,
    tasks: Arc<IncomingTaskTable>,
    handler: Arc<dyn ProtocolHandler>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("correlator", &self.correlator)
            .field("tasks", &self.tasks)
            .finish()
    }
}

impl Dispatcher {
    /// Creates a dispatcher over the component's shared state.
    pub fn new(
        correlator: Arc<RequestCorrelator>,
        tasks: Arc<IncomingTaskTable>,
        handler: Arc<dyn ProtocolHandler>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            correlator,
            tasks,
            handler,
            transport,
        }
    }

    /// Routes one decoded message.
    pub async fn dispatch(&self, message: JsonRpcMessage) {
        match message {
            JsonRpcMessage::Response(response) => self.correlator.complete(response),
            JsonRpcMessage::Request(request) => self.dispatch_request(request),
            JsonRpcMessage::Notification(notification) => {
                self.dispatch_notification(notification).await
            }
        }
    }

    /// Spawns an abortable worker for an inbound request.
    ///
    /// The abort handle is registered before the spawn so a cancellation
    /// racing the request can always find it. The response is written only
    /// when the handler was not aborted.
    fn dispatch_request(&self, request: JsonRpcRequest) {
        let key = id_key(&request.id);
        let (abort_handle, abort_registration) = AbortHandle::new_pair();
        self.tasks.register(key.clone(), abort_handle);

        let handler = Arc::clone(&self.handler);
        let transport = Arc::clone(&self.transport);
        let tasks = Arc::clone(&self.tasks);

        tokio::spawn(async move {
            let JsonRpcRequest {
                method, params, id, ..
            } = request;

            let work = Abortable::new(
                handler.handle_request(&method, params),
                abort_registration,
            );

            match work.await {
                Ok(Ok(result)) => {
                    write_response(&transport, JsonRpcResponse::success(result, id)).await;
                }
                Ok(Err(error)) => {
                    debug!("request {} ({}) failed: {}", key, method, error);
                    write_response(
                        &transport,
                        JsonRpcResponse::error(JsonRpcError::from(&error), id),
                    )
                    .await;
                }
                Err(_aborted) => {
                    debug!("request {} ({}) cancelled before completion", key, method);
                }
            }

            tasks.deregister(&key);
        });
    }

    /// Handles an inbound notification inline.
    async fn dispatch_notification(&self, notification: JsonRpcNotification) {
        if notification.method == Method::Cancelled.as_str() {
            self.handle_cancelled(notification.params);
            return;
        }

        if let Err(error) = self
            .handler
            .handle_notification(&notification.method, notification.params)
            .await
        {
            // Notifications have no reply channel; failures end here.
            warn!(
                "notification handler for {} failed: {}",
                notification.method, error
            );
        }
    }

    fn handle_cancelled(&self, params: Option<Value>) {
        let Some(params) = params else {
            warn!("cancelled notification without params");
            return;
        };
        match serde_json::from_value::<CancelledParams>(params) {
            Ok(cancelled) => {
                let key = id_key(&cancelled.request_id);
                if self.tasks.cancel(&key) {
                    debug!(
                        "cancelled inbound request {} ({})",
                        key,
                        cancelled.reason.as_deref().unwrap_or("no reason given")
                    );
                }
            }
            Err(e) => warn!("malformed cancelled notification: {}", e),
        }
    }
}

async fn write_response(transport: &Arc<dyn Transport>, response: JsonRpcResponse) {
    match JsonRpcMessage::Response(response).to_line() {
        Ok(line) => {
            if let Err(e) = transport.send_line(&line).await {
                warn!("could not write response: {}", e);
            }
        }
        Err(e) => warn!("could not encode response: {}", e),
    }
}
