//! MCP server: the side that owns the catalogs and answers the handshake.
//!
//! The server consumes two externally built catalogs (tools and prompts,
//! each a handler registry plus a schema registry) and a resource provider
//! manager. The registries are read-only once the server exists; the
//! startup phase that fills them is outside the engine. Capability flags in
//! the `initialize` answer are present exactly when the corresponding
//! catalog is non-empty.

use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use crate::config::ServerConfig;
use crate::mcp::component::{McpComponent, SessionState};
use crate::mcp::dispatcher::ProtocolHandler;
use crate::mcp::pagination::paginate;
use crate::mcp::protocol::{
    CallToolParams, GetPromptParams, Implementation, InitializeParams, InitializeResult,
    ListChangedCapability, ListParams, ListPromptsResult, ListToolsResult, PromptArgument,
    PromptInfo, ResourcesCapability, ServerCapabilities, ToolInfo,
};
use crate::mcp::registry::{HandlerRegistry, SchemaRegistry};
use crate::mcp::resources::models::{
    ListResourceTemplatesResult, ListResourcesResult, ReadResourceParams, SubscribeParams,
};
use crate::mcp::resources::ResourceProviderManager;
use crate::mcp::transport::Transport;
use crate::mcp::types::Method;
use crate::utils::error::{McpError, McpResult};
use async_trait::async_trait;

/// One externally built catalog: callable handlers plus declared schemas,
/// keyed by the same names.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Name-keyed callables
    pub handlers: HandlerRegistry,
    /// Name-keyed schemas, the source of `*/list` entries
    pub schemas: SchemaRegistry,
}

/// MCP server over one transport.
pub struct Server {
    component: Arc<McpComponent>,
    inner: Arc<ServerInner>,
}

struct ServerInner {
    config: ServerConfig,
    tools: Catalog,
    prompts: Catalog,
    resources: Arc<ResourceProviderManager>,
    state: Mutex<SessionState>,
    client: Mutex<Option<Implementation>>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .field("tools", &self.inner.tools.schemas.len())
            .field("prompts", &self.inner.prompts.schemas.len())
            .finish()
    }
}

impl Server {
    /// Creates a server from its injected catalogs and provider manager.
    pub fn new(
        transport: Arc<dyn Transport>,
        config: ServerConfig,
        tools: Catalog,
        prompts: Catalog,
        resources: ResourceProviderManager,
    ) -> Self {
        let inner = Arc::new(ServerInner {
            config,
            tools,
            prompts,
            resources: Arc::new(resources),
            state: Mutex::new(SessionState::Created),
            client: Mutex::new(None),
        });
        let handler: Arc<dyn ProtocolHandler> = inner.clone();
        Self {
            component: Arc::new(McpComponent::new(transport, handler)),
            inner,
        }
    }

    /// Launches the read loop and wires resource change notifications.
    pub fn start(&self) -> McpResult<()> {
        {
            let mut state = self.inner.state.lock().expect("state lock poisoned");
            if *state != SessionState::Created {
                return Err(McpError::InvalidState(
                    "server already started".to_string(),
                ));
            }
            *state = SessionState::Started;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.inner.resources.set_notification_sink(tx);
        let component = Arc::clone(&self.component);
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                if let Err(e) = component.send_notification_message(notification).await {
                    warn!("could not deliver change notification: {}", e);
                }
            }
        });

        self.component.start()
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.lock().expect("state lock poisoned")
    }

    /// Identity the client reported, once the handshake ran.
    pub fn client_info(&self) -> Option<Implementation> {
        self.inner
            .client
            .lock()
            .expect("client info lock poisoned")
            .clone()
    }

    /// Access to the resource manager, e.g. to raise change notifications.
    pub fn resources(&self) -> Arc<ResourceProviderManager> {
        Arc::clone(&self.inner.resources)
    }

    /// Announces a content change for one URI; delivered iff subscribed.
    pub fn notify_resource_updated(&self, uri: &str) -> bool {
        self.inner.resources.notify_resource_updated(uri)
    }

    /// Announces a resource catalog change; always delivered.
    pub fn notify_resources_list_changed(&self) -> bool {
        self.inner.resources.notify_list_changed()
    }

    /// Announces a tool catalog change.
    pub async fn notify_tools_list_changed(&self) -> McpResult<()> {
        self.component
            .send_notification(Method::ToolListChanged, None)
            .await
    }

    /// Announces a prompt catalog change.
    pub async fn notify_prompts_list_changed(&self) -> McpResult<()> {
        self.component
            .send_notification(Method::PromptListChanged, None)
            .await
    }

    /// Closes the session and fails in-flight requests.
    pub async fn close(&self) -> McpResult<()> {
        self.component.close().await
    }
}

#[async_trait]
impl ProtocolHandler for ServerInner {
    #[instrument(skip(self, params), fields(method = %method))]
    async fn handle_request(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        match Method::from_wire(method) {
            Some(Method::Initialize) => self.handle_initialize(params).await,
            Some(Method::Ping) => Ok(json!({})),
            Some(Method::ToolsList) => self.handle_tools_list(params),
            Some(Method::ToolsCall) => self.handle_tools_call(params).await,
            Some(Method::PromptsList) => self.handle_prompts_list(params),
            Some(Method::PromptsGet) => self.handle_prompts_get(params).await,
            Some(Method::ResourcesList) => self.handle_resources_list(params).await,
            Some(Method::ResourcesRead) => self.handle_resources_read(params).await,
            Some(Method::ResourcesTemplatesList) => {
                self.handle_resource_templates_list(params).await
            }
            Some(Method::ResourcesSubscribe) => self.handle_subscribe(params, true),
            Some(Method::ResourcesUnsubscribe) => self.handle_subscribe(params, false),
            _ => Err(McpError::MethodNotFound(method.to_string())),
        }
    }

    async fn handle_notification(&self, method: &str, _params: Option<Value>) -> McpResult<()> {
        match Method::from_wire(method) {
            Some(Method::Initialized) => {
                let mut state = self.state.lock().expect("state lock poisoned");
                *state = SessionState::Ready;
                debug!("session ready");
                Ok(())
            }
            _ => {
                debug!("ignoring notification {}", method);
                Ok(())
            }
        }
    }

    async fn on_transport_error(&self, error: &McpError) {
        warn!("server transport failed: {}", error);
    }
}

impl ServerInner {
    async fn handle_initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let params: InitializeParams = require_params(params)?;

        {
            let mut state = self.state.lock().expect("state lock poisoned");
            *state = SessionState::Initializing;
        }
        {
            let mut client = self.client.lock().expect("client info lock poisoned");
            *client = Some(params.client_info.clone());
        }
        debug!(
            "initialize from {} {} (protocol {})",
            params.client_info.name, params.client_info.version, params.protocol_version
        );

        let capabilities = ServerCapabilities {
            tools: (!self.tools.schemas.is_empty()).then_some(ListChangedCapability {
                list_changed: Some(true),
            }),
            prompts: (!self.prompts.schemas.is_empty()).then_some(ListChangedCapability {
                list_changed: Some(true),
            }),
            resources: self
                .resources
                .has_providers()
                .await
                .then_some(ResourcesCapability {
                    subscribe: Some(true),
                    list_changed: Some(true),
                }),
        };

        let result = InitializeResult {
            protocol_version: params.protocol_version,
            capabilities,
            server_info: Implementation {
                name: self.config.name.clone(),
                version: self.config.version.clone(),
            },
        };
        to_value(result)
    }

    fn handle_tools_list(&self, params: Option<Value>) -> McpResult<Value> {
        let params: ListParams = optional_params(params)?;
        let tools: Vec<ToolInfo> = self
            .tools
            .schemas
            .entries()
            .into_iter()
            .map(|schema| ToolInfo {
                name: schema.name.clone(),
                description: schema.description.clone(),
                input_schema: schema.params_schema.clone(),
            })
            .collect();
        let page = paginate(&tools, params.cursor.as_deref(), self.config.page_size)?;
        to_value(ListToolsResult {
            tools: page.items,
            next_cursor: page.next_cursor,
        })
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> McpResult<Value> {
        let params: CallToolParams = require_params(params)?;
        let handler = self
            .tools
            .handlers
            .get(&params.name)
            .ok_or_else(|| McpError::MethodNotFound(params.name.clone()))?;
        if self.tools.schemas.get(&params.name).is_some() {
            self.tools
                .schemas
                .validate_args(&params.name, params.arguments.as_ref())?;
        }
        handler(params.arguments).await
    }

    fn handle_prompts_list(&self, params: Option<Value>) -> McpResult<Value> {
        let params: ListParams = optional_params(params)?;
        let prompts: Vec<PromptInfo> = self
            .prompts
            .schemas
            .entries()
            .into_iter()
            .map(|schema| {
                let properties = schema
                    .params_schema
                    .get("properties")
                    .and_then(Value::as_object);
                let arguments = properties
                    .map(|props| {
                        props
                            .iter()
                            .map(|(name, declared)| PromptArgument {
                                name: name.clone(),
                                description: declared
                                    .get("description")
                                    .and_then(Value::as_str)
                                    .map(str::to_string),
                                required: schema.required.contains(name),
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                PromptInfo {
                    name: schema.name.clone(),
                    description: schema.description.clone(),
                    arguments,
                }
            })
            .collect();
        let page = paginate(&prompts, params.cursor.as_deref(), self.config.page_size)?;
        to_value(ListPromptsResult {
            prompts: page.items,
            next_cursor: page.next_cursor,
        })
    }

    async fn handle_prompts_get(&self, params: Option<Value>) -> McpResult<Value> {
        let params: GetPromptParams = require_params(params)?;
        let handler = self
            .prompts
            .handlers
            .get(&params.name)
            .ok_or_else(|| McpError::MethodNotFound(params.name.clone()))?;
        if self.prompts.schemas.get(&params.name).is_some() {
            self.prompts
                .schemas
                .validate_args(&params.name, params.arguments.as_ref())?;
        }
        handler(params.arguments).await
    }

    async fn handle_resources_list(&self, params: Option<Value>) -> McpResult<Value> {
        let params: ListParams = optional_params(params)?;
        let resources = self.resources.list_resources().await?;
        let page = paginate(&resources, params.cursor.as_deref(), self.config.page_size)?;
        to_value(ListResourcesResult {
            resources: page.items,
            next_cursor: page.next_cursor,
        })
    }

    async fn handle_resources_read(&self, params: Option<Value>) -> McpResult<Value> {
        let params: ReadResourceParams = require_params(params)?;
        let result = self.resources.read_resource(&params.uri).await?;
        to_value(result)
    }

    async fn handle_resource_templates_list(&self, params: Option<Value>) -> McpResult<Value> {
        let params: ListParams = optional_params(params)?;
        let templates = self.resources.list_templates().await?;
        let page = paginate(&templates, params.cursor.as_deref(), self.config.page_size)?;
        to_value(ListResourceTemplatesResult {
            resource_templates: page.items,
            next_cursor: page.next_cursor,
        })
    }

    fn handle_subscribe(&self, params: Option<Value>, subscribe: bool) -> McpResult<Value> {
        let params: SubscribeParams = require_params(params)?;
        if subscribe {
            self.resources.subscribe(&params.uri);
        } else {
            self.resources.unsubscribe(&params.uri);
        }
        Ok(json!({}))
    }
}

fn require_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> McpResult<T> {
    let params = params.ok_or_else(|| McpError::InvalidParams("missing params".to_string()))?;
    serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))
}

fn optional_params<T: serde::de::DeserializeOwned + Default>(
    params: Option<Value>,
) -> McpResult<T> {
    match params {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => {
            serde_json::from_value(value).map_err(|e| McpError::InvalidParams(e.to_string()))
        }
    }
}

fn to_value<T: serde::Serialize>(value: T) -> McpResult<Value> {
    serde_json::to_value(value).map_err(|e| McpError::Serialization(e.to_string()))
}
