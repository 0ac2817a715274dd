//! Error types for weave-tools

use thiserror::Error;

/// Tool error type
#[derive(Debug, Error)]
pub enum Error {
    /// No tool registered under the requested name
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Tool execution failed
    #[error("execution failed: {0}")]
    Execution(String),

    /// Invalid input passed to a tool
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A tool invocation exceeded its configured timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// IO error surfaced by a tool implementation
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
