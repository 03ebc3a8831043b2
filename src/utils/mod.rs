//! Utility modules for error handling and common functionality.

/// Error types shared across the crate
pub mod error;

/// Tracing subscriber setup
pub mod logging;
