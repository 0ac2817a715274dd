//! Registry - tool registration and discovery
//!
//! A lookup by name for the callable actions a planner may reference in a
//! plan. Tools are registered with metadata (description, risk level,
//! category) and can be queried by name or enumerated for prompt assembly.

use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// A parsed positional argument passed to a tool invocation.
///
/// Mirrors the outcome of the planner's safe-literal-eval-with-fallback
/// argument parsing: most arguments come back as `Str`, `Num`, or `List`;
/// anything that didn't parse as a literal is kept verbatim as `Raw` rather
/// than rejected, since downstream tools are expected to tolerate strings.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArg {
    /// A quoted string literal.
    Str(String),
    /// A numeric literal.
    Num(f64),
    /// A list/tuple of nested arguments.
    List(Vec<ToolArg>),
    /// Anything that failed literal evaluation, kept as the raw source text.
    Raw(String),
}

impl ToolArg {
    /// Render this argument the way it would appear in a plan trace line.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            ToolArg::Str(s) => format!("\"{s}\""),
            ToolArg::Num(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            ToolArg::List(items) => {
                let inner = items
                    .iter()
                    .map(ToolArg::render)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("[{inner}]")
            }
            ToolArg::Raw(s) => s.clone(),
        }
    }

    /// Best-effort stringification used when substituting this argument into
    /// a tool call, as opposed to rendering it back into plan-line syntax.
    #[must_use]
    pub fn as_display(&self) -> String {
        match self {
            ToolArg::Str(s) | ToolArg::Raw(s) => s.clone(),
            ToolArg::Num(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            ToolArg::List(items) => items
                .iter()
                .map(ToolArg::as_display)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Risk level of a tool, carried as ambient metadata for callers that want
/// to gate or log on it; the registry itself does not enforce policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskLevel {
    /// Read-only or otherwise side-effect-free.
    Low,
    /// Limited-scope side effects (e.g. a sandboxed calculation).
    Medium,
    /// Unrestricted side effects (network writes, external state).
    High,
}

impl RiskLevel {
    /// String form used in logging and prompt diagnostics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tool category, used only to group tools in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolCategory {
    /// Information retrieval (search, lookup).
    Search,
    /// Computation (arithmetic, transforms).
    Compute,
    /// Anything not covered above.
    Utility,
}

impl ToolCategory {
    /// String form used in logging and prompt diagnostics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Compute => "compute",
            Self::Utility => "utility",
        }
    }
}

/// Static metadata describing a registered tool.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// Unique tool name, as it appears in a plan line.
    pub name: String,
    /// Human-readable description, included verbatim in the planner prompt.
    pub description: String,
    /// Risk classification, carried for logging/future policy hooks.
    pub risk_level: RiskLevel,
    /// Grouping category, carried for diagnostics.
    pub category: ToolCategory,
}

impl ToolDefinition {
    /// Create a new tool definition with default risk/category.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            risk_level: RiskLevel::Low,
            category: ToolCategory::Utility,
        }
    }

    /// Set the risk level.
    #[must_use]
    pub fn with_risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: ToolCategory) -> Self {
        self.category = category;
        self
    }
}

/// A callable action the planner may reference in a plan.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Static metadata for this tool.
    fn definition(&self) -> &ToolDefinition;

    /// Invoke the tool with already-substituted positional arguments,
    /// returning the observation string recorded on the originating task.
    async fn invoke(&self, args: &[ToolArg]) -> Result<String>;

    /// Render `args` for a trace line. Defaults to a comma-joined literal
    /// rendering; a tool may override this to produce a friendlier trace.
    fn render(&self, args: &[ToolArg]) -> String {
        let rendered = args
            .iter()
            .map(ToolArg::render)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.definition().name, rendered)
    }
}

/// Lookup of registered tools by name. Backed by a concurrent map so a
/// shared `Arc<ToolRegistry>` can be registered against at startup and read
/// from many scheduler tasks afterward without external locking.
#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous registration under the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name.clone();
        debug!(tool = %name, "registering tool");
        self.tools.insert(name, tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::UnknownTool(name.to_string()))
    }

    /// Check whether a tool is registered.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All registered tool names, in no particular order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Render a numbered description of every registered tool, one per
    /// line, for inclusion in the planner's system prompt. The special
    /// `join` action is not part of the registry and is not emitted here;
    /// callers append its description separately.
    #[must_use]
    pub fn describe_all(&self) -> String {
        let mut names: Vec<String> = self.names();
        names.sort_unstable();
        names
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let entry = self.tools.get(&name).expect("name just listed by names()");
                format!("{}. {}", i + 1, entry.value().definition().description)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry has no registered tools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
