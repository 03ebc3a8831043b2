//! Resource system: catalog models, pluggable providers, and the manager
//! that merges them and tracks subscriptions.

/// Wire models for resources
pub mod models;

/// Provider trait and built-in providers
pub mod provider;

/// Provider aggregation and subscription tracking
pub mod manager;

pub use manager::ResourceProviderManager;
pub use models::{
    ListResourceTemplatesResult, ListResourcesResult, ReadResourceParams, ReadResourceResult,
    ResourceContents, ResourceEntry, ResourceTemplate, SubscribeParams,
};
pub use provider::{FileSystemProvider, ResourceProvider, StaticProvider};
