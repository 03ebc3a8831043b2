//! Core MCP protocol implementation: message types, correlation, dispatch,
//! and the client/server components.
//!
//! # Model Context Protocol (MCP)
//!
//! The Model Context Protocol is a JSON-RPC 2.0 based protocol connecting AI
//! tool-calling clients with servers that expose tools, prompts, and
//! resources. This module implements the bidirectional engine:
//!
//! - **Request correlation**: concurrent outbound requests matched to
//!   late-arriving responses by monotonically increasing ids
//! - **Cancellable inbound work**: every inbound request runs in its own
//!   abortable task; cancelling an outbound request notifies the peer
//! - **Catalog pagination**: ordered listings split into pages behind opaque
//!   cursors
//! - **Subscriptions**: per-resource change notifications delivered only to
//!   interested peers
//!
//! ## Architecture
//!
//! - `types`: JSON-RPC wire structs, the method table, line classification
//! - `protocol`: typed parameter and result payloads for the MCP methods
//! - `correlator`: outbound id allocation and the pending-request table
//! - `tasks`: the inbound cancellable-task table
//! - `dispatcher`: routing of decoded messages, error-to-payload conversion
//! - `pagination`: cursor codec and page slicing
//! - `registry`: read-only handler/schema maps built by an external phase
//! - `resources`: provider trait, catalog merging, subscription tracking
//! - `component`: the shared transport + read-loop core
//! - `client` / `server`: the two protocol roles
//! - `transport`: stdio, TCP, and in-memory line channels

/// JSON-RPC wire types and the method table
pub mod types;

/// Typed parameter and result payloads
pub mod protocol;

/// Outbound request correlation
pub mod correlator;

/// Inbound task table
pub mod tasks;

/// Inbound message routing
pub mod dispatcher;

/// Cursor-based pagination
pub mod pagination;

/// Handler and schema registries
pub mod registry;

/// Resource providers, catalog merging, and subscriptions
pub mod resources;

/// Shared component core: transport, read loop, send paths
pub mod component;

/// MCP client role
pub mod client;

/// MCP server role
pub mod server;

/// Transport implementations
pub mod transport;
