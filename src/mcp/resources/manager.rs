//! Provider aggregation and subscription tracking.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::mcp::resources::models::{
    ReadResourceResult, ResourceEntry, ResourceTemplate, ResourceUpdatedParams,
};
use crate::mcp::resources::provider::ResourceProvider;
use crate::mcp::types::{JsonRpcNotification, Method};
use crate::utils::error::{McpError, McpResult};

/// Aggregates resource providers into one catalog and gates change
/// notifications by subscription.
///
/// Providers are consulted in registration order: catalog merging keeps the
/// first entry per URI, reads fall through to the first provider that owns
/// the URI. The subscription set holds bare URIs and is deliberately
/// decoupled from catalog state — subscribing to a URI no provider lists is
/// allowed.
pub struct ResourceProviderManager {
    providers: RwLock<Vec<Arc<dyn ResourceProvider>>>,
    subscriptions: Mutex<HashSet<String>>,
    notify: Mutex<Option<mpsc::UnboundedSender<JsonRpcNotification>>>,
}

impl fmt::Debug for ResourceProviderManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscriptions = self.subscriptions.lock().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("ResourceProviderManager")
            .field("subscriptions", &format!("{} uris", subscriptions))
            .finish()
    }
}

impl Default for ResourceProviderManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProviderManager {
    /// Creates a manager with no providers and no subscriptions.
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            subscriptions: Mutex::new(HashSet::new()),
            notify: Mutex::new(None),
        }
    }

    /// Appends a provider. Order matters: earlier providers win catalog
    /// collisions and are consulted first on reads.
    pub async fn add_provider(&self, provider: Arc<dyn ResourceProvider>) {
        self.providers.write().await.push(provider);
    }

    /// Whether any provider is registered.
    pub async fn has_providers(&self) -> bool {
        !self.providers.read().await.is_empty()
    }

    /// Merged catalog across all providers, de-duplicated by URI with the
    /// first occurrence winning.
    pub async fn list_resources(&self) -> McpResult<Vec<ResourceEntry>> {
        let providers = self.providers.read().await;
        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for provider in providers.iter() {
            for entry in provider.list().await? {
                if seen.insert(entry.uri.clone()) {
                    merged.push(entry);
                } else {
                    debug!("skipping duplicate catalog entry for {}", entry.uri);
                }
            }
        }
        Ok(merged)
    }

    /// Merged template listing across all providers, in provider order.
    pub async fn list_templates(&self) -> McpResult<Vec<ResourceTemplate>> {
        let providers = self.providers.read().await;
        let mut merged = Vec::new();
        for provider in providers.iter() {
            merged.extend(provider.templates().await?);
        }
        Ok(merged)
    }

    /// Reads a URI through the first provider that owns it.
    pub async fn read_resource(&self, uri: &str) -> McpResult<ReadResourceResult> {
        let providers = self.providers.read().await;
        for provider in providers.iter() {
            if let Some(result) = provider.read(uri).await? {
                return Ok(result);
            }
        }
        Err(McpError::ResourceNotFound(uri.to_string()))
    }

    /// Adds a URI to the subscription set.
    pub fn subscribe(&self, uri: &str) {
        let mut subscriptions = self.subscriptions.lock().expect("subscription lock poisoned");
        subscriptions.insert(uri.to_string());
    }

    /// Removes a URI from the subscription set.
    pub fn unsubscribe(&self, uri: &str) {
        let mut subscriptions = self.subscriptions.lock().expect("subscription lock poisoned");
        subscriptions.remove(uri);
    }

    /// Whether the peer currently subscribes to a URI.
    pub fn is_subscribed(&self, uri: &str) -> bool {
        self.subscriptions
            .lock()
            .map(|s| s.contains(uri))
            .unwrap_or(false)
    }

    /// Wires the sink change notifications are emitted through.
    pub fn set_notification_sink(&self, sink: mpsc::UnboundedSender<JsonRpcNotification>) {
        let mut notify = self.notify.lock().expect("notify lock poisoned");
        *notify = Some(sink);
    }

    /// Announces a content change for one URI.
    ///
    /// Emits `notifications/resources/updated` iff the URI is subscribed;
    /// returns whether a notification went out.
    pub fn notify_resource_updated(&self, uri: &str) -> bool {
        if !self.is_subscribed(uri) {
            return false;
        }
        let params = ResourceUpdatedParams {
            uri: uri.to_string(),
        };
        self.emit(JsonRpcNotification::new(
            Method::ResourceUpdated,
            serde_json::to_value(params).ok(),
        ))
    }

    /// Announces a catalog change. Always emits, subscriptions do not gate
    /// list-level changes.
    pub fn notify_list_changed(&self) -> bool {
        self.emit(JsonRpcNotification::new(Method::ResourceListChanged, None))
    }

    fn emit(&self, notification: JsonRpcNotification) -> bool {
        let notify = self.notify.lock().expect("notify lock poisoned");
        match notify.as_ref() {
            Some(sink) => sink.send(notification).is_ok(),
            None => {
                warn!("change notification dropped: no sink wired");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::resources::provider::StaticProvider;

    async fn manager_with(
        providers: Vec<StaticProvider>,
    ) -> (
        ResourceProviderManager,
        mpsc::UnboundedReceiver<JsonRpcNotification>,
    ) {
        let manager = ResourceProviderManager::new();
        for provider in providers {
            manager.add_provider(Arc::new(provider)).await;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        manager.set_notification_sink(tx);
        (manager, rx)
    }

    #[tokio::test]
    async fn merge_is_first_registration_wins() {
        let first = StaticProvider::new()
            .with_text("mem://shared", "from first", None, "one")
            .with_text("mem://only-first", "a", None, "a");
        let second = StaticProvider::new()
            .with_text("mem://shared", "from second", None, "two")
            .with_text("mem://only-second", "b", None, "b");

        let (manager, _rx) = manager_with(vec![first, second]).await;
        let listing = manager.list_resources().await.unwrap();

        assert_eq!(listing.len(), 3);
        let shared = listing.iter().find(|e| e.uri == "mem://shared").unwrap();
        assert_eq!(shared.name, "from first");
    }

    #[tokio::test]
    async fn read_falls_through_in_order() {
        let first = StaticProvider::new().with_text("mem://a", "a", None, "first says a");
        let second = StaticProvider::new()
            .with_text("mem://a", "a", None, "second says a")
            .with_text("mem://b", "b", None, "second says b");

        let (manager, _rx) = manager_with(vec![first, second]).await;

        let a = manager.read_resource("mem://a").await.unwrap();
        match &a.contents[0] {
            crate::mcp::resources::models::ResourceContents::Text { text, .. } => {
                assert_eq!(text, "first says a")
            }
            other => panic!("expected text, got {:?}", other),
        }

        assert!(manager.read_resource("mem://b").await.is_ok());
        assert!(matches!(
            manager.read_resource("file://missing").await,
            Err(McpError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn updates_are_gated_by_subscription() {
        let provider = StaticProvider::new().with_text("mem://a", "a", None, "a");
        let (manager, mut rx) = manager_with(vec![provider]).await;

        assert!(!manager.notify_resource_updated("mem://a"));
        assert!(rx.try_recv().is_err());

        manager.subscribe("mem://a");
        assert!(manager.notify_resource_updated("mem://a"));
        let n = rx.try_recv().unwrap();
        assert_eq!(n.method, Method::ResourceUpdated.as_str());

        manager.unsubscribe("mem://a");
        assert!(!manager.notify_resource_updated("mem://a"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscription_ignores_catalog_state() {
        let (manager, mut rx) = manager_with(vec![]).await;
        // No provider lists this URI; subscribing is still accepted.
        manager.subscribe("mem://phantom");
        assert!(manager.is_subscribed("mem://phantom"));
        assert!(manager.notify_resource_updated("mem://phantom"));
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn list_changed_is_unconditional() {
        let (manager, mut rx) = manager_with(vec![]).await;
        assert!(manager.notify_list_changed());
        let n = rx.try_recv().unwrap();
        assert_eq!(n.method, Method::ResourceListChanged.as_str());
        assert!(n.params.is_none());
    }
}
