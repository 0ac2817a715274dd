//! Task records and the task graph they form.
//!
//! A [`Task`] is the unit the streaming parser emits and the scheduler
//! dispatches: an immutable identity (idx, tool name, args, dependencies,
//! thought) plus a mutable `observation` slot that is written exactly once.

use std::collections::{BTreeSet, HashMap};
use weave_tools::{ToolArg, ToolRegistry};

/// The literal action name that terminates every plan.
pub const JOIN_NAME: &str = "join";

/// One numbered action in a plan: a tool call, or the terminal `join`.
#[derive(Debug, Clone)]
pub struct Task {
    /// Positive, strictly-increasing identity within a plan.
    pub idx: usize,
    /// Tool name, or the literal `"join"`.
    pub name: String,
    /// Parsed positional arguments, prior to dependency substitution.
    pub args: Vec<ToolArg>,
    /// Idxs that must complete before this task may run.
    pub dependencies: BTreeSet<usize>,
    /// Rationale captured from the most recent `Thought:` line, if any.
    pub thought: Option<String>,
    /// Set exactly once, by the scheduler, after the task completes.
    pub observation: Option<String>,
}

impl Task {
    /// Whether this task is the plan's terminal `join`.
    #[must_use]
    pub fn is_join(&self) -> bool {
        self.name == JOIN_NAME
    }

    /// Render the `idx. name(args)` portion of a trace line, using `render`
    /// for the argument list when a tool-specific renderer is supplied,
    /// falling back to a plain comma-joined literal rendering otherwise.
    #[must_use]
    pub fn render_call(&self, render: Option<&str>) -> String {
        match render {
            Some(rendered) => format!("{}. {}", self.idx, rendered),
            None => {
                let args = self
                    .args
                    .iter()
                    .map(ToolArg::render)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}. {}({})", self.idx, self.name, args)
            }
        }
    }

    /// Render the full trace line: optional `Thought:` line, the call line,
    /// and an `Observation:` line if the task has completed.
    #[must_use]
    pub fn render_trace(&self, render: Option<&str>) -> String {
        let mut out = String::new();
        if let Some(thought) = &self.thought {
            if !thought.is_empty() {
                out.push_str(&format!("Thought: {thought}\n"));
            }
        }
        out.push_str(&self.render_call(render));
        out.push('\n');
        if let Some(obs) = &self.observation {
            out.push_str(&format!("Observation: {obs}\n"));
        }
        out
    }
}

/// Mapping from idx to [`Task`], forming a dependency DAG by construction:
/// every task's dependencies refer to strictly-smaller idxs already present.
pub type TaskGraph = HashMap<usize, Task>;

/// Render every non-join task in `graph`, in ascending idx order, as the
/// scratchpad presented to the joiner.
#[must_use]
pub fn render_scratchpad(graph: &TaskGraph, renders: &HashMap<usize, String>) -> String {
    let mut idxs: Vec<&usize> = graph.keys().filter(|idx| !graph[idx].is_join()).collect();
    idxs.sort_unstable();
    idxs.into_iter()
        .map(|idx| {
            let task = &graph[idx];
            task.render_trace(renders.get(idx).map(String::as_str))
        })
        .collect::<Vec<_>>()
        .join("")
}

/// Build a per-task custom-render map: for every non-join task whose tool is
/// still registered, ask that tool to render its own arguments via
/// [`weave_tools::Tool::render`]; tasks whose tool has since been
/// unregistered (or that are the terminal `join`) are left for
/// [`Task::render_trace`]'s default literal rendering.
#[must_use]
pub fn build_renders(graph: &TaskGraph, registry: &ToolRegistry) -> HashMap<usize, String> {
    graph
        .values()
        .filter(|task| !task.is_join())
        .filter_map(|task| {
            registry
                .get(&task.name)
                .ok()
                .map(|tool| (task.idx, tool.render(&task.args)))
        })
        .collect()
}

/// Compute dependency idxs for a freshly-parsed task from its raw argument
/// text, per the wire grammar: `join` depends on every prior idx; any other
/// tool depends on every `$K`/`${K}` sigil appearing anywhere in `raw_args`.
#[must_use]
pub fn dependencies_from_args(idx: usize, tool_name: &str, raw_args: &str) -> BTreeSet<usize> {
    if tool_name == JOIN_NAME {
        return (1..idx).collect();
    }
    crate::parser::sigil_refs(raw_args).into_iter().collect()
}

/// An item produced by the streaming parser/planner: either a completed
/// task or the end-of-plan sentinel.
#[derive(Debug, Clone)]
pub enum StreamItem {
    /// A fully-parsed task, ready to be ingested by the scheduler.
    Task(Task),
    /// No further tasks will be produced for this iteration.
    EndOfPlan,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(idx: usize, name: &str, deps: &[usize]) -> Task {
        Task {
            idx,
            name: name.to_string(),
            args: vec![],
            dependencies: deps.iter().copied().collect(),
            thought: None,
            observation: None,
        }
    }

    #[test]
    fn join_depends_on_everything_before_it() {
        let deps = dependencies_from_args(4, JOIN_NAME, "");
        assert_eq!(deps, BTreeSet::from([1, 2, 3]));
    }

    #[test]
    fn non_join_depends_on_sigils_only() {
        let deps = dependencies_from_args(3, "math", "\"x\", $1, ${2}");
        assert_eq!(deps, BTreeSet::from([1, 2]));
    }

    #[test]
    fn render_trace_includes_thought_and_observation() {
        let mut t = task(1, "search", &[]);
        t.args = vec![ToolArg::Str("Everest".into())];
        t.thought = Some("need elevation".into());
        t.observation = Some("29,032 ft".into());
        let rendered = t.render_trace(None);
        assert_eq!(
            rendered,
            "Thought: need elevation\n1. search(\"Everest\")\nObservation: 29,032 ft\n"
        );
    }

    #[test]
    fn build_renders_uses_registered_tools_custom_render() {
        use async_trait::async_trait;
        use weave_tools::{Result as ToolResult, Tool, ToolDefinition};

        struct Loud {
            def: ToolDefinition,
        }

        #[async_trait]
        impl Tool for Loud {
            fn definition(&self) -> &ToolDefinition {
                &self.def
            }
            async fn invoke(&self, _args: &[ToolArg]) -> ToolResult<String> {
                Ok(String::new())
            }
            fn render(&self, _args: &[ToolArg]) -> String {
                "LOUD()".to_string()
            }
        }

        let mut registry = weave_tools::ToolRegistry::new();
        registry.register(std::sync::Arc::new(Loud {
            def: ToolDefinition::new("shout", "shout() - shouts"),
        }));

        let mut graph = TaskGraph::new();
        graph.insert(1, task(1, "shout", &[]));
        graph.insert(2, task(2, JOIN_NAME, &[1]));

        let renders = build_renders(&graph, &registry);
        assert_eq!(renders.get(&1).map(String::as_str), Some("LOUD()"));
        assert!(!renders.contains_key(&2));
    }

    #[test]
    fn scratchpad_excludes_join_and_is_idx_ordered() {
        let mut graph = TaskGraph::new();
        graph.insert(2, task(2, "search", &[]));
        graph.insert(1, task(1, "search", &[]));
        graph.insert(3, task(3, JOIN_NAME, &[1, 2]));
        let scratchpad = render_scratchpad(&graph, &HashMap::new());
        let first = scratchpad.find("1. search").unwrap();
        let second = scratchpad.find("2. search").unwrap();
        assert!(first < second);
        assert!(!scratchpad.contains("join"));
    }
}
