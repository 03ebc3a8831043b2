//! Handshake and lifecycle scenarios.

mod common;

use std::sync::Arc;

use serde_json::json;

use mcp_engine::config::{ClientConfig, ServerConfig};
use mcp_engine::mcp::client::Client;
use mcp_engine::mcp::component::SessionState;
use mcp_engine::mcp::resources::ResourceProviderManager;
use mcp_engine::mcp::server::{Catalog, Server};
use mcp_engine::mcp::transport::{memory, Transport};

use common::{assert_silent, recv_json};

/// The handshake is exactly three lines: initialize request, matching
/// response, initialized notification — in that order, nothing else.
#[tokio::test]
async fn handshake_is_exactly_three_lines_in_order() {
    let (client_side, peer) = memory::pair();
    let client = Client::new(
        Arc::new(client_side),
        ClientConfig {
            name: "test-client".to_string(),
            version: "1.0.0".to_string(),
            ..ClientConfig::default()
        },
    );
    client.start().unwrap();

    let handshake = tokio::spawn(async move { client.initialize().await });

    // Line 1: the initialize request, first id on the wire.
    let request = recv_json(&peer).await;
    assert_eq!(request["method"], json!("initialize"));
    assert_eq!(request["id"], json!("1"));
    assert_eq!(request["jsonrpc"], json!("2.0"));
    assert_eq!(request["params"]["protocolVersion"], json!("2024-11-05"));
    assert_eq!(request["params"]["clientInfo"]["name"], json!("test-client"));

    // Line 2: the server answers with a matching version and identity.
    let response = json!({
        "jsonrpc": "2.0",
        "id": request["id"],
        "result": {
            "protocolVersion": request["params"]["protocolVersion"],
            "capabilities": {},
            "serverInfo": {"name": "scripted-server", "version": "9.9.9"}
        }
    });
    peer.send_line(&response.to_string()).await.unwrap();

    // Line 3: the initialized notification, then silence.
    let initialized = recv_json(&peer).await;
    assert_eq!(initialized["method"], json!("notifications/initialized"));
    assert!(initialized.get("id").is_none());
    assert_silent(&peer).await;

    let result = handshake.await.unwrap().unwrap();
    assert_eq!(result.protocol_version, "2024-11-05");
    assert_eq!(result.server_info.name, "scripted-server");
}

#[tokio::test]
async fn full_handshake_reaches_ready_on_both_sides() {
    let (client, server) = common::connected_pair().await;

    assert_eq!(client.state(), SessionState::Ready);
    let info = client.server_info().unwrap();
    assert_eq!(info.server_info.name, "test-server");

    // Non-empty catalogs on all three axes.
    let capabilities = info.capabilities;
    assert!(capabilities.tools.is_some());
    assert!(capabilities.prompts.is_some());
    assert!(capabilities.resources.is_some());

    // The initialized notification flips the server to ready; give the
    // notification a moment to cross.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(server.state(), SessionState::Ready);
    assert_eq!(server.client_info().unwrap().name, "test-client");
}

#[tokio::test]
async fn empty_catalogs_advertise_no_capabilities() {
    let (client_side, server_side) = memory::pair();
    let server = Server::new(
        Arc::new(server_side),
        ServerConfig::default(),
        Catalog::default(),
        Catalog::default(),
        ResourceProviderManager::new(),
    );
    server.start().unwrap();

    let client = Client::new(Arc::new(client_side), ClientConfig::default());
    client.start().unwrap();
    let info = client.initialize().await.unwrap();

    assert!(info.capabilities.tools.is_none());
    assert!(info.capabilities.prompts.is_none());
    assert!(info.capabilities.resources.is_none());
}

#[tokio::test]
async fn ping_round_trips() {
    let (client, _server) = common::connected_pair().await;
    client.ping().await.unwrap();
}
