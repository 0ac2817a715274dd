//! weave-tools - tool registry and execution engine
//!
//! Provides the `Tool` trait, a name-keyed `ToolRegistry`, and a
//! timeout-wrapped `ToolRunner` used by the scheduler in `weave-core`. Also
//! ships two illustrative, dependency-free tool implementations (`search`,
//! `math`) under `builtins`, used by the test suite.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builtins;
pub mod error;
pub mod registry;
pub mod runner;

pub use builtins::{MathTool, SearchEntry, SearchTool};
pub use error::{Error, Result};
pub use registry::{RiskLevel, Tool, ToolArg, ToolCategory, ToolDefinition, ToolRegistry};
pub use runner::{RunnerConfig, ToolRunner};
