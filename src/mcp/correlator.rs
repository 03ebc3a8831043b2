//! Outbound request correlation.
//!
//! The correlator owns the pending-request table: every outbound request id
//! maps to a oneshot completion slot until exactly one terminal event claims
//! it — the matching response, a broadcast transport failure, or local
//! cancellation. Ids are allocated from an atomic counter, 1-based, never
//! reused, and rendered as strings on the wire.
//!
//! The table lock is a plain mutex held only for map operations, never
//! across a suspension point.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::mcp::protocol::CancelledParams;
use crate::mcp::transport::Transport;
use crate::mcp::types::{id_key, JsonRpcMessage, JsonRpcNotification, JsonRpcResponse, Method};

/// Correlates outbound requests with their eventual responses by id.
pub struct RequestCorrelator {
    next_id: AtomicU64,
    pending: Mutex<HashMap<String, oneshot::Sender<JsonRpcResponse>>>,
}

impl fmt::Debug for RequestCorrelator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending = self.pending.lock().map(|p| p.len()).unwrap_or(0);
        f.debug_struct("RequestCorrelator")
            .field("next_id", &self.next_id.load(Ordering::SeqCst))
            .field("pending", &format!("{} requests", pending))
            .finish()
    }
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestCorrelator {
    /// Creates a correlator with an empty table; the first id is `"1"`.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Allocates the next request id. Ids increase monotonically and are
    /// never handed out twice.
    pub fn next_request_id(&self) -> Value {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Value::String(id.to_string())
    }

    /// Registers a completion slot for an id and returns its receiver.
    pub fn register(&self, id: &Value) -> oneshot::Receiver<JsonRpcResponse> {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock().expect("pending table lock poisoned");
        pending.insert(id_key(id), tx);
        rx
    }

    /// Resolves the pending entry matching an arriving response.
    ///
    /// A response whose id is unknown is logged and dropped; late arrivals
    /// after cancellation are expected and not fatal. A response carrying an
    /// `error` payload still resolves its entry — that is a successful round
    /// trip from the correlator's point of view.
    pub fn complete(&self, response: JsonRpcResponse) {
        let key = id_key(&response.id);
        let sender = {
            let mut pending = self.pending.lock().expect("pending table lock poisoned");
            pending.remove(&key)
        };
        match sender {
            Some(sender) => {
                // A dropped receiver means the caller was cancelled while
                // the response was in flight; nothing left to deliver.
                if sender.send(response).is_err() {
                    debug!("response for request {} arrived after cancellation", key);
                }
            }
            None => warn!("dropping response for unknown request id {}", key),
        }
    }

    /// Removes a pending entry, returning whether it was still present.
    pub fn remove(&self, id: &Value) -> bool {
        let mut pending = self.pending.lock().expect("pending table lock poisoned");
        pending.remove(&id_key(id)).is_some()
    }

    /// Fails every pending request by dropping its completion slot.
    ///
    /// Called when the transport dies; every suspended caller observes a
    /// closed-connection error.
    pub fn fail_all(&self) {
        let drained: Vec<String> = {
            let mut pending = self.pending.lock().expect("pending table lock poisoned");
            let keys = pending.keys().cloned().collect();
            pending.clear();
            keys
        };
        if !drained.is_empty() {
            warn!("failing {} in-flight requests on transport loss", drained.len());
        }
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}

/// Drop guard implementing notify-then-unwind cancellation.
///
/// Armed while a `send_request` caller is suspended. If the caller's future
/// is dropped before a terminal event, the guard removes the pending entry
/// and then best-effort notifies the peer with `notifications/cancelled`.
/// Disarmed on every other exit path so exactly one terminal event fires.
pub(crate) struct CancelGuard {
    correlator: Arc<RequestCorrelator>,
    transport: Arc<dyn Transport>,
    id: Value,
    armed: bool,
}

impl CancelGuard {
    pub(crate) fn new(
        correlator: Arc<RequestCorrelator>,
        transport: Arc<dyn Transport>,
        id: Value,
    ) -> Self {
        Self {
            correlator,
            transport,
            id,
            armed: true,
        }
    }

    /// Marks the request as terminally handled; drop becomes a no-op.
    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // Entry first, notification second: once the entry is gone a late
        // response is dropped instead of waking a vanished caller.
        if !self.correlator.remove(&self.id) {
            return;
        }
        let params = CancelledParams {
            request_id: self.id.clone(),
            reason: Some("request cancelled by caller".to_string()),
        };
        let notification = JsonRpcNotification::new(
            Method::Cancelled,
            serde_json::to_value(params).ok(),
        );
        let Ok(line) = JsonRpcMessage::Notification(notification).to_line() else {
            return;
        };
        let transport = Arc::clone(&self.transport);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = transport.send_line(&line).await {
                    debug!("could not notify peer of cancellation: {}", e);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::transport::memory;
    use serde_json::json;

    #[test]
    fn ids_are_monotonic_and_unique() {
        let correlator = RequestCorrelator::new();
        assert_eq!(correlator.next_request_id(), json!("1"));
        assert_eq!(correlator.next_request_id(), json!("2"));
        assert_eq!(correlator.next_request_id(), json!("3"));
    }

    #[tokio::test]
    async fn response_resolves_registered_slot() {
        let correlator = RequestCorrelator::new();
        let id = correlator.next_request_id();
        let rx = correlator.register(&id);

        correlator.complete(JsonRpcResponse::success(json!({"ok": true}), id));
        let response = rx.await.unwrap();
        assert_eq!(response.result, Some(json!({"ok": true})));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn error_payload_still_resolves() {
        let correlator = RequestCorrelator::new();
        let id = correlator.next_request_id();
        let rx = correlator.register(&id);

        correlator.complete(JsonRpcResponse::error(
            crate::mcp::types::JsonRpcError::method_not_found("nope"),
            id,
        ));
        let response = rx.await.unwrap();
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn unknown_id_is_dropped_not_fatal() {
        let correlator = RequestCorrelator::new();
        correlator.complete(JsonRpcResponse::success(json!(null), json!("999")));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn fail_all_errors_every_waiter() {
        let correlator = RequestCorrelator::new();
        let a = correlator.register(&correlator.next_request_id());
        let b = correlator.register(&correlator.next_request_id());

        correlator.fail_all();
        assert!(a.await.is_err());
        assert!(b.await.is_err());
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn at_most_one_resolution() {
        let correlator = RequestCorrelator::new();
        let id = correlator.next_request_id();
        let rx = correlator.register(&id);

        assert!(correlator.remove(&id));
        // The entry is gone; a late response must not resurrect it.
        correlator.complete(JsonRpcResponse::success(json!(1), id.clone()));
        assert!(rx.await.is_err());
        assert!(!correlator.remove(&id));
    }

    #[tokio::test]
    async fn dropped_guard_notifies_peer_once() {
        let (local, peer) = memory::pair();
        let local: Arc<dyn Transport> = Arc::new(local);
        let correlator = Arc::new(RequestCorrelator::new());

        let id = correlator.next_request_id();
        let _rx = correlator.register(&id);
        let guard = CancelGuard::new(Arc::clone(&correlator), Arc::clone(&local), id.clone());
        drop(guard);

        let line = peer.recv_line().await.unwrap().unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["method"], json!("notifications/cancelled"));
        assert_eq!(value["params"]["requestId"], id);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn disarmed_guard_stays_silent() {
        let (local, peer) = memory::pair();
        let local: Arc<dyn Transport> = Arc::new(local);
        let correlator = Arc::new(RequestCorrelator::new());

        let id = correlator.next_request_id();
        let _rx = correlator.register(&id);
        let mut guard = CancelGuard::new(Arc::clone(&correlator), Arc::clone(&local), id.clone());
        guard.disarm();
        drop(guard);

        // The entry must survive and the peer must hear nothing.
        assert_eq!(correlator.pending_count(), 1);
        drop(correlator);
        tokio::task::yield_now().await;
        let peeked = tokio::time::timeout(std::time::Duration::from_millis(50), peer.recv_line());
        assert!(peeked.await.is_err());
    }
}
