//! Explicit, per-call metrics (C9).
//!
//! A plain value threaded through `run()` and returned to the caller — no
//! global singleton, no background aggregation. A caller that wants metrics
//! aggregated across many runs owns that composition on top of this.

use std::collections::HashMap;
use std::time::Duration;

/// Token counters and per-task latencies accumulated across one `run()` call.
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    /// Prompt tokens sent to the planner model, summed across iterations.
    pub planner_tokens_in: u64,
    /// Completion tokens produced by the planner model, summed across iterations.
    pub planner_tokens_out: u64,
    /// Prompt tokens sent to the joiner model, summed across iterations.
    pub joiner_tokens_in: u64,
    /// Completion tokens produced by the joiner model, summed across iterations.
    pub joiner_tokens_out: u64,
    /// One latency observation per completed task, keyed by tool name.
    pub per_task_latency: HashMap<String, Vec<Duration>>,
}

impl RunMetrics {
    /// An empty metrics accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a planner model call's token usage.
    pub fn record_planner_tokens(&mut self, prompt: u64, completion: u64) {
        self.planner_tokens_in += prompt;
        self.planner_tokens_out += completion;
    }

    /// Record a joiner model call's token usage.
    pub fn record_joiner_tokens(&mut self, prompt: u64, completion: u64) {
        self.joiner_tokens_in += prompt;
        self.joiner_tokens_out += completion;
    }

    /// Record one task's execution latency.
    pub fn record_task_latency(&mut self, tool_name: &str, elapsed: Duration) {
        self.per_task_latency
            .entry(tool_name.to_string())
            .or_default()
            .push(elapsed);
    }
}
