//! A fixed in-memory lookup table standing in for a real web-search backend.

use crate::error::{Error, Result};
use crate::registry::{Tool, ToolArg, ToolDefinition};
use async_trait::async_trait;

/// One entry in a [`SearchTool`]'s lookup table.
#[derive(Debug, Clone)]
pub struct SearchEntry {
    /// Substring matched (case-insensitively) against the query argument.
    pub key: String,
    /// Observation returned when `key` matches.
    pub observation: String,
}

impl SearchEntry {
    /// Build an entry from plain strings.
    pub fn new(key: impl Into<String>, observation: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            observation: observation.into(),
        }
    }
}

/// `search(query)` — returns the observation of the first entry whose key is
/// a substring of `query` (or vice versa), case-insensitively. Returns a
/// [`Error::Execution`] when nothing matches, so callers can exercise the
/// tool-failure path deliberately.
pub struct SearchTool {
    def: ToolDefinition,
    entries: Vec<SearchEntry>,
}

impl SearchTool {
    /// Build a search tool over a fixed set of entries.
    #[must_use]
    pub fn new(entries: Vec<SearchEntry>) -> Self {
        Self {
            def: ToolDefinition::new(
                "search",
                "search(query: string) - looks up factual information about `query`",
            ),
            entries,
        }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn definition(&self) -> &ToolDefinition {
        &self.def
    }

    async fn invoke(&self, args: &[ToolArg]) -> Result<String> {
        let query = args
            .first()
            .map(ToolArg::as_display)
            .ok_or_else(|| Error::InvalidInput("search requires a query argument".into()))?;
        let needle = query.to_lowercase();

        self.entries
            .iter()
            .find(|entry| {
                let key = entry.key.to_lowercase();
                needle.contains(&key) || key.contains(&needle)
            })
            .map(|entry| entry.observation.clone())
            .ok_or_else(|| Error::Execution(format!("no results for {query:?}")))
    }
}
