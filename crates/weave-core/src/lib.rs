//! weave-core - planner, streaming parser, task-fetching unit, and joiner
//!
//! Turns a natural-language question into a DAG of tool invocations,
//! executes it with maximum parallelism subject to data dependencies, and
//! asks a joining step whether the accumulated observations answer the
//! question or whether another planning iteration is needed. See
//! [`Compiler::run`] for the single entry point.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod compiler;
pub mod config;
pub mod error;
pub mod joiner;
pub mod llm;
pub mod metrics;
pub mod parser;
pub mod planner;
pub mod task;
pub mod tfu;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use compiler::Compiler;
pub use config::CompilerConfig;
pub use error::{Error, Result};
pub use joiner::{JoinVerdict, Joiner};
pub use llm::{CompletionRequest, CompletionResponse, LlmProvider, StreamEvent, TokenUsage};
pub use metrics::RunMetrics;
pub use parser::StreamingPlanParser;
pub use planner::Planner;
pub use task::{StreamItem, Task, TaskGraph};
pub use tfu::TaskFetchingUnit;
