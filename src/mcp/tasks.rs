//! Table of in-flight inbound request tasks.
//!
//! Each inbound request runs in its own abortable worker. The abort handle
//! is created and registered before the worker is spawned, so a
//! `notifications/cancelled` arriving immediately after the request can
//! never miss the entry. Deregistration happens when the worker finishes;
//! cancelling an id that is absent or already complete is a tolerated race.

use futures::future::AbortHandle;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tracing::debug;

/// Lock-guarded id → abort-handle table for inbound requests.
#[derive(Default)]
pub struct IncomingTaskTable {
    tasks: Mutex<HashMap<String, AbortHandle>>,
}

impl fmt::Debug for IncomingTaskTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let running = self.tasks.lock().map(|t| t.len()).unwrap_or(0);
        f.debug_struct("IncomingTaskTable")
            .field("tasks", &format!("{} running", running))
            .finish()
    }
}

impl IncomingTaskTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a worker's abort handle under its request id.
    pub fn register(&self, key: String, handle: AbortHandle) {
        let mut tasks = self.tasks.lock().expect("task table lock poisoned");
        tasks.insert(key, handle);
    }

    /// Removes a finished worker's entry. Absence is fine; cancellation may
    /// have removed it first.
    pub fn deregister(&self, key: &str) {
        let mut tasks = self.tasks.lock().expect("task table lock poisoned");
        tasks.remove(key);
    }

    /// Aborts the worker for an id, if it is still running.
    ///
    /// Returns whether a task was found. A missing id is not an error: the
    /// task may have completed a moment ago, or the peer may be confused —
    /// both are no-ops.
    pub fn cancel(&self, key: &str) -> bool {
        let handle = {
            let mut tasks = self.tasks.lock().expect("task table lock poisoned");
            tasks.remove(key)
        };
        match handle {
            Some(handle) => {
                handle.abort();
                true
            }
            None => {
                debug!("cancellation for unknown or finished request {}", key);
                false
            }
        }
    }

    /// Number of workers currently registered.
    pub fn running_count(&self) -> usize {
        self.tasks.lock().map(|t| t.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::{AbortHandle, Abortable};

    #[tokio::test]
    async fn cancel_aborts_registered_worker() {
        let table = IncomingTaskTable::new();
        let (handle, registration) = AbortHandle::new_pair();
        table.register("7".to_string(), handle);

        let worker = tokio::spawn(Abortable::new(
            async {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            },
            registration,
        ));

        assert!(table.cancel("7"));
        assert!(worker.await.unwrap().is_err());
        assert_eq!(table.running_count(), 0);
    }

    #[tokio::test]
    async fn cancelling_missing_id_is_noop() {
        let table = IncomingTaskTable::new();
        assert!(!table.cancel("nothing-here"));
    }

    #[tokio::test]
    async fn redundant_cancel_after_completion_is_noop() {
        let table = IncomingTaskTable::new();
        let (handle, registration) = AbortHandle::new_pair();
        table.register("3".to_string(), handle);

        let worker = tokio::spawn(Abortable::new(async { 42 }, registration));
        assert_eq!(worker.await.unwrap().unwrap(), 42);

        table.deregister("3");
        assert!(!table.cancel("3"));
    }
}
