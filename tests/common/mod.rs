//! Shared wiring for the integration tests: a client and server connected
//! over an in-memory transport pair, with a small tool/prompt surface.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use mcp_engine::config::{ClientConfig, ServerConfig};
use mcp_engine::mcp::client::Client;
use mcp_engine::mcp::registry::MethodSchema;
use mcp_engine::mcp::resources::{ResourceProviderManager, StaticProvider};
use mcp_engine::mcp::server::{Catalog, Server};
use mcp_engine::mcp::transport::memory::{self, MemoryTransport};
use mcp_engine::utils::error::McpError;

/// Tool catalog used across the scenarios: a fast echo, an adder, and a tool
/// that never finishes on its own.
pub fn tool_catalog() -> Catalog {
    let mut catalog = Catalog::default();

    catalog.handlers.register("echo", |params| async move {
        Ok(params.unwrap_or(Value::Null))
    });
    catalog.schemas.register(
        MethodSchema::new(
            "echo",
            Some("Echoes its arguments"),
            json!({"type": "object", "properties": {"text": {"type": "string"}}}),
        )
        .with_required(&["text"]),
    );

    catalog.handlers.register("add", |params| async move {
        let params = params.unwrap_or(Value::Null);
        let a = params.get("a").and_then(Value::as_i64).unwrap_or(0);
        let b = params.get("b").and_then(Value::as_i64).unwrap_or(0);
        Ok(json!({"sum": a + b}))
    });
    catalog.schemas.register(
        MethodSchema::new(
            "add",
            Some("Adds two integers"),
            json!({"type": "object", "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}}}),
        )
        .with_required(&["a", "b"]),
    );

    catalog.handlers.register("sleepy", |_params| async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(json!("finally"))
    });
    catalog.schemas.register(MethodSchema::new(
        "sleepy",
        Some("Sleeps for a long time"),
        json!({"type": "object", "properties": {}}),
    ));

    catalog
}

/// Prompt catalog with one template.
pub fn prompt_catalog() -> Catalog {
    let mut catalog = Catalog::default();
    catalog.handlers.register("greet", |params| async move {
        let name = params
            .as_ref()
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("world");
        Ok(json!({
            "messages": [{
                "role": "user",
                "content": {"type": "text", "text": format!("Say hello to {}", name)}
            }]
        }))
    });
    catalog.schemas.register(
        MethodSchema::new(
            "greet",
            Some("Greets someone by name"),
            json!({"type": "object", "properties": {"name": {"type": "string", "description": "Who to greet"}}}),
        )
        .with_required(&["name"]),
    );
    catalog
}

/// Resource manager with two providers sharing one URI, to exercise the
/// first-registration-wins merge.
pub async fn resource_manager() -> ResourceProviderManager {
    let manager = ResourceProviderManager::new();
    manager
        .add_provider(Arc::new(
            StaticProvider::new()
                .with_text("mem://alpha", "alpha (primary)", Some("text/plain"), "alpha from primary")
                .with_template("mem://{key}", "by key"),
        ))
        .await;
    manager
        .add_provider(Arc::new(
            StaticProvider::new()
                .with_text("mem://alpha", "alpha (shadow)", Some("text/plain"), "alpha from shadow")
                .with_text("mem://beta", "beta", Some("text/plain"), "beta content"),
        ))
        .await;
    manager
}

/// A started server and a started, initialized client over a memory pair.
pub async fn connected_pair() -> (Client, Server) {
    let (client_side, server_side) = memory::pair();

    let server = Server::new(
        Arc::new(server_side),
        ServerConfig {
            name: "test-server".to_string(),
            page_size: 2,
            ..ServerConfig::default()
        },
        tool_catalog(),
        prompt_catalog(),
        resource_manager().await,
    );
    server.start().expect("server start");

    let client = Client::new(
        Arc::new(client_side),
        ClientConfig {
            name: "test-client".to_string(),
            ..ClientConfig::default()
        },
    );
    client.start().expect("client start");
    client.initialize().await.expect("initialize");

    (client, server)
}

/// Receives the next line from a scripted peer, decoded as JSON.
pub async fn recv_json(peer: &MemoryTransport) -> Value {
    use mcp_engine::mcp::transport::Transport;
    let line = tokio::time::timeout(Duration::from_secs(2), peer.recv_line())
        .await
        .expect("timed out waiting for a line")
        .expect("transport failed")
        .expect("stream ended early");
    serde_json::from_str(&line).expect("line is not JSON")
}

/// Asserts that no line arrives within a grace period.
pub async fn assert_silent(peer: &MemoryTransport) {
    use mcp_engine::mcp::transport::Transport;
    let peeked = tokio::time::timeout(Duration::from_millis(150), peer.recv_line()).await;
    assert!(peeked.is_err(), "unexpected line: {:?}", peeked);
}

/// Unwraps the protocol error carried by a client-side failure.
pub fn rpc_code(error: McpError) -> i32 {
    match error {
        McpError::Rpc { code, .. } => code,
        other => panic!("expected rpc error, got {:?}", other),
    }
}
