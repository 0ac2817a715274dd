//! Compiler configuration (C10).
//!
//! Layered defaults < config file < environment (`LLMC_*`), validated once
//! at construction so the loop never runs against an invalid configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_MAX_REPLANS: usize = 3;
const DEFAULT_SCHEDULING_INTERVAL_MS: u64 = 10;
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// Validated, layered configuration for a single compiler run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Maximum number of Planner→TFU→Joiner iterations. Must be `>= 1`.
    pub max_replans: usize,
    /// How long the Task-Fetching Unit sleeps between scheduling ticks when
    /// nothing is ready, in milliseconds.
    pub scheduling_interval_ms: u64,
    /// Per-tool-invocation timeout, in seconds.
    pub tool_timeout_secs: u64,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_replans: DEFAULT_MAX_REPLANS,
            scheduling_interval_ms: DEFAULT_SCHEDULING_INTERVAL_MS,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
        }
    }
}

impl CompilerConfig {
    /// Build configuration from compiled-in defaults layered with an
    /// optional config file and `LLMC_*` environment overrides, then
    /// validate the result.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix("LLMC"));
        let loaded: Self = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate field invariants, returning [`Error::ConfigInvalid`] on the
    /// first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.max_replans == 0 {
            return Err(Error::ConfigInvalid(
                "max_replans must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The scheduling interval as a [`Duration`].
    #[must_use]
    pub fn scheduling_interval(&self) -> Duration {
        Duration::from_millis(self.scheduling_interval_ms)
    }

    /// The per-tool timeout as a [`Duration`].
    #[must_use]
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Override `max_replans`, re-validating.
    pub fn with_max_replans(mut self, max_replans: usize) -> Result<Self> {
        self.max_replans = max_replans;
        self.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CompilerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_replans, DEFAULT_MAX_REPLANS);
    }

    #[test]
    fn zero_max_replans_is_invalid() {
        let err = CompilerConfig::default().with_max_replans(0).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[test]
    fn scheduling_interval_converts_to_duration() {
        let config = CompilerConfig::default();
        assert_eq!(config.scheduling_interval(), Duration::from_millis(10));
    }
}
