//! MCP client: the side that opens the session and consumes catalogs.
//!
//! A client moves through `Created → Started → Initializing → Ready`.
//! `start` launches the read loop; `initialize` performs the handshake and,
//! on success, emits `notifications/initialized` and flips the session to
//! ready. An error result during the handshake is a fatal local failure —
//! there is no automatic retry.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::mcp::component::{McpComponent, SessionState};
use crate::mcp::dispatcher::ProtocolHandler;
use crate::mcp::protocol::{
    CallToolParams, GetPromptParams, Implementation, InitializeParams, InitializeResult,
    ListPromptsResult, ListToolsResult,
};
use crate::mcp::resources::models::{
    ListResourceTemplatesResult, ListResourcesResult, ReadResourceParams, ReadResourceResult,
    SubscribeParams,
};
use crate::mcp::transport::Transport;
use crate::mcp::types::{JsonRpcResponse, Method};
use crate::utils::error::{McpError, McpResult};
use async_trait::async_trait;

/// Callback invoked for a server-sent notification.
pub type NotificationHook = Arc<dyn Fn(Option<Value>) + Send + Sync>;

/// MCP client over one transport.
pub struct Client {
    component: Arc<McpComponent>,
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    state: Mutex<SessionState>,
    server: Mutex<Option<InitializeResult>>,
    hooks: Mutex<HashMap<String, NotificationHook>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .finish()
    }
}

#[async_trait]
impl ProtocolHandler for ClientInner {
    async fn handle_request(&self, method: &str, _params: Option<Value>) -> McpResult<Value> {
        // This engine's client serves no inbound requests; unimplemented
        // optional handlers answer as method-not-found.
        Err(McpError::MethodNotFound(method.to_string()))
    }

    async fn handle_notification(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        let hook = {
            let hooks = self.hooks.lock().expect("hook table lock poisoned");
            hooks.get(method).cloned()
        };
        match hook {
            Some(hook) => hook(params),
            None => debug!("no hook registered for notification {}", method),
        }
        Ok(())
    }

    async fn on_transport_error(&self, error: &McpError) {
        warn!("client transport failed: {}", error);
    }
}

impl Client {
    /// Creates a client over a transport.
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        let inner = Arc::new(ClientInner {
            config,
            state: Mutex::new(SessionState::Created),
            server: Mutex::new(None),
            hooks: Mutex::new(HashMap::new()),
        });
        let handler: Arc<dyn ProtocolHandler> = inner.clone();
        Self {
            component: Arc::new(McpComponent::new(transport, handler)),
            inner,
        }
    }

    /// Launches the read loop. The session becomes `Started`.
    pub fn start(&self) -> McpResult<()> {
        self.transition(SessionState::Created, SessionState::Started)?;
        self.component.start()
    }

    /// Performs the `initialize` handshake.
    ///
    /// On success the client emits `notifications/initialized`, stores the
    /// server identity, and becomes `Ready`. An error result from the server
    /// is fatal for this session: the state falls back to `Started` and the
    /// error is returned without retrying.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> McpResult<InitializeResult> {
        self.transition(SessionState::Started, SessionState::Initializing)?;

        let params = InitializeParams {
            protocol_version: self.inner.config.protocol_version.clone(),
            capabilities: Value::Object(serde_json::Map::new()),
            client_info: Implementation {
                name: self.inner.config.name.clone(),
                version: self.inner.config.version.clone(),
            },
        };

        let outcome = async {
            let response = self
                .component
                .send_request(Method::Initialize, Some(serde_json::to_value(&params)
                    .map_err(|e| McpError::Serialization(e.to_string()))?))
                .await?;
            let result: InitializeResult = deserialize_result(response)?;
            self.component
                .send_notification(Method::Initialized, None)
                .await?;
            Ok(result)
        }
        .await;

        match outcome {
            Ok(result) => {
                {
                    let mut server = self.inner.server.lock().expect("server info lock poisoned");
                    *server = Some(result.clone());
                }
                self.set_state(SessionState::Ready);
                debug!(
                    "initialized against {} {}",
                    result.server_info.name, result.server_info.version
                );
                Ok(result)
            }
            Err(error) => {
                self.set_state(SessionState::Started);
                Err(error)
            }
        }
    }

    /// Liveness probe; allowed as soon as the session is started.
    pub async fn ping(&self) -> McpResult<()> {
        let response = self.component.send_request(Method::Ping, None).await?;
        response.into_result().map(|_| ())
    }

    /// One page of the tool catalog.
    pub async fn list_tools(&self, cursor: Option<String>) -> McpResult<ListToolsResult> {
        self.require_ready()?;
        let response = self
            .component
            .send_request(Method::ToolsList, list_params(cursor))
            .await?;
        deserialize_result(response)
    }

    /// Invokes a tool by name.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> McpResult<Value> {
        self.require_ready()?;
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let response = self
            .component
            .send_request(Method::ToolsCall, Some(serde_json::to_value(params)
                .map_err(|e| McpError::Serialization(e.to_string()))?))
            .await?;
        response.into_result()
    }

    /// One page of the prompt catalog.
    pub async fn list_prompts(&self, cursor: Option<String>) -> McpResult<ListPromptsResult> {
        self.require_ready()?;
        let response = self
            .component
            .send_request(Method::PromptsList, list_params(cursor))
            .await?;
        deserialize_result(response)
    }

    /// Renders a prompt by name.
    pub async fn get_prompt(&self, name: &str, arguments: Option<Value>) -> McpResult<Value> {
        self.require_ready()?;
        let params = GetPromptParams {
            name: name.to_string(),
            arguments,
        };
        let response = self
            .component
            .send_request(Method::PromptsGet, Some(serde_json::to_value(params)
                .map_err(|e| McpError::Serialization(e.to_string()))?))
            .await?;
        response.into_result()
    }

    /// One page of the resource catalog.
    pub async fn list_resources(&self, cursor: Option<String>) -> McpResult<ListResourcesResult> {
        self.require_ready()?;
        let response = self
            .component
            .send_request(Method::ResourcesList, list_params(cursor))
            .await?;
        deserialize_result(response)
    }

    /// One page of the resource template catalog.
    pub async fn list_resource_templates(
        &self,
        cursor: Option<String>,
    ) -> McpResult<ListResourceTemplatesResult> {
        self.require_ready()?;
        let response = self
            .component
            .send_request(Method::ResourcesTemplatesList, list_params(cursor))
            .await?;
        deserialize_result(response)
    }

    /// Reads a resource by URI.
    pub async fn read_resource(&self, uri: &str) -> McpResult<ReadResourceResult> {
        self.require_ready()?;
        let params = ReadResourceParams {
            uri: uri.to_string(),
        };
        let response = self
            .component
            .send_request(Method::ResourcesRead, Some(serde_json::to_value(params)
                .map_err(|e| McpError::Serialization(e.to_string()))?))
            .await?;
        deserialize_result(response)
    }

    /// Subscribes to change notifications for one URI.
    pub async fn subscribe_resource(&self, uri: &str) -> McpResult<()> {
        self.require_ready()?;
        let response = self
            .component
            .send_request(Method::ResourcesSubscribe, subscribe_params(uri)?)
            .await?;
        response.into_result().map(|_| ())
    }

    /// Drops the subscription for one URI.
    pub async fn unsubscribe_resource(&self, uri: &str) -> McpResult<()> {
        self.require_ready()?;
        let response = self
            .component
            .send_request(Method::ResourcesUnsubscribe, subscribe_params(uri)?)
            .await?;
        response.into_result().map(|_| ())
    }

    /// Registers a callback for a server-sent notification method.
    pub fn on_notification<F>(&self, method: Method, hook: F)
    where
        F: Fn(Option<Value>) + Send + Sync + 'static,
    {
        let mut hooks = self.inner.hooks.lock().expect("hook table lock poisoned");
        hooks.insert(method.as_str().to_string(), Arc::new(hook));
    }

    /// Sends a raw request, for methods outside the typed surface.
    pub async fn send_request(
        &self,
        method: Method,
        params: Option<Value>,
    ) -> McpResult<JsonRpcResponse> {
        self.component.send_request(method, params).await
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.lock().expect("state lock poisoned")
    }

    /// Identity and capabilities the server reported, once initialized.
    pub fn server_info(&self) -> Option<InitializeResult> {
        self.inner
            .server
            .lock()
            .expect("server info lock poisoned")
            .clone()
    }

    /// Closes the session and fails in-flight requests.
    pub async fn close(&self) -> McpResult<()> {
        self.component.close().await
    }

    fn require_ready(&self) -> McpResult<()> {
        if self.state() != SessionState::Ready {
            return Err(McpError::InvalidState(
                "session is not initialized".to_string(),
            ));
        }
        Ok(())
    }

    fn transition(&self, from: SessionState, to: SessionState) -> McpResult<()> {
        let mut state = self.inner.state.lock().expect("state lock poisoned");
        if *state != from {
            return Err(McpError::InvalidState(format!(
                "expected session state {:?}, found {:?}",
                from, *state
            )));
        }
        *state = to;
        Ok(())
    }

    fn set_state(&self, to: SessionState) {
        let mut state = self.inner.state.lock().expect("state lock poisoned");
        *state = to;
    }
}

fn list_params(cursor: Option<String>) -> Option<Value> {
    cursor.map(|cursor| json!({ "cursor": cursor }))
}

fn subscribe_params(uri: &str) -> McpResult<Option<Value>> {
    let params = SubscribeParams {
        uri: uri.to_string(),
    };
    Ok(Some(serde_json::to_value(params).map_err(|e| {
        McpError::Serialization(e.to_string())
    })?))
}

fn deserialize_result<T: serde::de::DeserializeOwned>(response: JsonRpcResponse) -> McpResult<T> {
    let value = response.into_result()?;
    serde_json::from_value(value).map_err(|e| McpError::Deserialization(e.to_string()))
}
