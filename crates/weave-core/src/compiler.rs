//! The Compiler Loop (C7).
//!
//! Orchestrates up to `max_replans` iterations of Planner → TFU → Joiner;
//! on a replan verdict it composes a "previous plans" context and loops,
//! otherwise it returns the joiner's answer.

use crate::config::CompilerConfig;
use crate::error::Result;
use crate::joiner::Joiner;
use crate::llm::LlmProvider;
use crate::metrics::RunMetrics;
use crate::planner::{format_contexts, format_previous_plan, Planner};
use crate::task::{build_renders, render_scratchpad};
use crate::tfu::TaskFetchingUnit;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use weave_tools::{ToolRegistry, ToolRunner};

/// Ties the Planner, Task-Fetching Unit, and Joiner together into a single
/// bounded replan loop.
pub struct Compiler {
    registry: Arc<ToolRegistry>,
    planner: Planner,
    joiner: Joiner,
    tfu: TaskFetchingUnit,
    config: CompilerConfig,
}

impl Compiler {
    /// Build a compiler from a shared tool registry and separate planner /
    /// joiner model handles, validated against `config`.
    #[must_use]
    pub fn new(
        registry: Arc<ToolRegistry>,
        planner_model: Arc<dyn LlmProvider>,
        joiner_model: Arc<dyn LlmProvider>,
        config: CompilerConfig,
    ) -> Self {
        let runner = Arc::new(ToolRunner::new(
            Arc::clone(&registry),
            weave_tools::RunnerConfig::new(config.tool_timeout()),
        ));
        Self {
            registry: Arc::clone(&registry),
            planner: Planner::new(planner_model, registry),
            joiner: Joiner::new(joiner_model),
            tfu: TaskFetchingUnit::new(runner, config.scheduling_interval()),
            config,
        }
    }

    /// Answer `question`, iterating Planner → TFU → Joiner until the joiner
    /// stops asking to replan or `max_replans` is reached, whichever comes
    /// first. Returns the final answer alongside metrics accumulated across
    /// every iteration.
    #[instrument(skip(self, question))]
    pub async fn run(&self, question: &str) -> Result<(String, RunMetrics)> {
        let mut contexts: Vec<String> = Vec::new();
        let mut metrics = RunMetrics::new();
        let mut answer = String::new();

        for i in 0..self.config.max_replans {
            let is_final = i == self.config.max_replans - 1;

            let context = if contexts.is_empty() {
                None
            } else {
                Some(format_contexts(&contexts))
            };
            let (graph, planner_usage) = self.planner.plan(question, context.as_deref()).await?;
            debug!(iteration = i, tasks = graph.len(), "planner produced graph");
            metrics.record_planner_tokens(planner_usage.prompt_tokens, planner_usage.completion_tokens);

            let (graph, task_metrics) = self.tfu.run_batch(graph).await;
            for (tool, latencies) in task_metrics.per_task_latency {
                for latency in latencies {
                    metrics.record_task_latency(&tool, latency);
                }
            }

            let renders = build_renders(&graph, &self.registry);
            let scratchpad = render_scratchpad(&graph, &renders);
            let (mut verdict, joiner_usage) =
                self.joiner.join(question, &scratchpad, is_final).await?;
            metrics.record_joiner_tokens(joiner_usage.prompt_tokens, joiner_usage.completion_tokens);

            if !is_final && !verdict.action_parsed {
                warn!(iteration = i, "malformed joiner output on non-final iteration, forcing replan");
                verdict.replan = true;
                verdict.answer.clear();
            }
            answer = verdict.answer;

            if !verdict.replan {
                return Ok((answer, metrics));
            }

            if is_final {
                warn!(iteration = i, "max replans reached while joiner still requested replan");
                return Ok((answer, metrics));
            }

            contexts.push(format_previous_plan(&graph, &verdict.thought, &renders));
        }

        Ok((answer, metrics))
    }
}
