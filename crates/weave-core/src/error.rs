//! Error types for weave-core

use thiserror::Error;

/// Core error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The planner or joiner's model call failed at the transport level.
    #[error("model transport error: {0}")]
    ModelTransport(String),

    /// `max_replans` or another configuration value was invalid.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A tool-side error, wrapped so callers get one `Result` type across
    /// the registry/runner boundary.
    #[error(transparent)]
    Tool(#[from] weave_tools::Error),

    /// Layered configuration loading (file/env) failed.
    #[error("configuration loading failed: {0}")]
    ConfigLoad(#[from] config::ConfigError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
