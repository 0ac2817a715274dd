//! Runner - timeout-wrapped tool execution
//!
//! Sits between the scheduler and the registry: looks a tool up by name,
//! enforces a per-invocation timeout, and surfaces typed errors rather than
//! panics. Turning those errors into the `"Error: …"` observation contract
//! is the caller's job (the Task-Fetching Unit), not this module's.

use crate::error::{Error, Result};
use crate::registry::{ToolArg, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

/// Configuration for the tool runner.
#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    /// Timeout applied to every tool invocation unless overridden per call.
    pub default_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
        }
    }
}

impl RunnerConfig {
    /// Create a configuration with a specific default timeout.
    #[must_use]
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    /// Override the default timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

/// Executes registered tools on the runner's behalf, applying a timeout
/// around each invocation.
pub struct ToolRunner {
    registry: Arc<ToolRegistry>,
    config: RunnerConfig,
}

impl ToolRunner {
    /// Create a runner over `registry` with the given configuration.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, config: RunnerConfig) -> Self {
        Self { registry, config }
    }

    /// Create a runner with default configuration.
    #[must_use]
    pub fn with_defaults(registry: Arc<ToolRegistry>) -> Self {
        Self::new(registry, RunnerConfig::default())
    }

    /// The underlying registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute `name` with `args`, subject to the runner's default timeout.
    #[instrument(skip(self, args), fields(tool = %name))]
    pub async fn execute(&self, name: &str, args: &[ToolArg]) -> Result<String> {
        self.execute_with_timeout(name, args, self.config.default_timeout)
            .await
    }

    /// Execute `name` with `args`, subject to an explicit timeout.
    pub async fn execute_with_timeout(
        &self,
        name: &str,
        args: &[ToolArg],
        timeout: Duration,
    ) -> Result<String> {
        let tool = self.registry.get(name)?;
        match tokio::time::timeout(timeout, tool.invoke(args)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(tool = %name, timeout_ms = timeout.as_millis() as u64, "tool invocation timed out");
                Err(Error::Timeout(timeout.as_millis() as u64))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Tool, ToolDefinition};
    use async_trait::async_trait;

    struct Slow {
        def: ToolDefinition,
    }

    #[async_trait]
    impl Tool for Slow {
        fn definition(&self) -> &ToolDefinition {
            &self.def
        }

        async fn invoke(&self, _args: &[ToolArg]) -> Result<String> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok("done".to_string())
        }
    }

    fn registry_with_slow() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Slow {
            def: ToolDefinition::new("slow", "slow(x) - sleeps then returns"),
        }));
        Arc::new(registry)
    }

    #[tokio::test]
    async fn executes_registered_tool() {
        let runner = ToolRunner::with_defaults(registry_with_slow());
        let out = runner.execute("slow", &[]).await.expect("runs");
        assert_eq!(out, "done");
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let runner = ToolRunner::with_defaults(registry_with_slow());
        let err = runner.execute("missing", &[]).await.unwrap_err();
        assert!(matches!(err, Error::UnknownTool(_)));
    }

    #[tokio::test]
    async fn timeout_is_surfaced() {
        let runner = ToolRunner::new(registry_with_slow(), RunnerConfig::new(Duration::from_millis(5)));
        let err = runner.execute("slow", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }
}
