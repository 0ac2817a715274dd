//! The Task-Fetching Unit (C5).
//!
//! Owns the task graph and a completion event per idx, substitutes
//! dependency observations into pending tasks' arguments, and dispatches
//! executable tasks concurrently as soon as their dependency closure is
//! satisfied — whether the graph arrived all at once (`run_batch`) or is
//! still streaming in (`run_stream`).

use crate::metrics::RunMetrics;
use crate::task::{StreamItem, Task, TaskGraph};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, instrument, warn};
use weave_tools::{ToolArg, ToolRunner};

static SIGIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{(\d+)\}|\$(\d+)").unwrap());

/// A completion flag that can be checked synchronously (for the scheduler's
/// polling readiness check) or awaited asynchronously (for any caller that
/// wants to block on a specific task, e.g. a topological-order assertion).
struct CompletionEvent {
    notify: Notify,
    triggered: AtomicBool,
}

impl CompletionEvent {
    fn new() -> Self {
        Self {
            notify: Notify::new(),
            triggered: AtomicBool::new(false),
        }
    }

    fn is_set(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    fn set(&self) {
        self.triggered.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    #[allow(dead_code)]
    async fn wait(&self) {
        if self.is_set() {
            return;
        }
        self.notify.notified().await;
    }
}

struct Shared {
    tasks: DashMap<usize, Task>,
    done: DashMap<usize, Arc<CompletionEvent>>,
    pending: Mutex<HashSet<usize>>,
    total: AtomicUsize,
    completed: AtomicUsize,
}

impl Shared {
    fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            done: DashMap::new(),
            pending: Mutex::new(HashSet::new()),
            total: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    fn ingest(&self, task: Task) {
        let idx = task.idx;
        self.done.insert(idx, Arc::new(CompletionEvent::new()));
        self.tasks.insert(idx, task);
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).insert(idx);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    fn is_task_done(&self, idx: usize) -> bool {
        self.done.get(&idx).map(|e| e.is_set()).unwrap_or(false)
    }

    fn ready_set(&self) -> Vec<usize> {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending
            .iter()
            .filter(|&&idx| {
                self.tasks
                    .get(&idx)
                    .map(|t| t.dependencies.iter().all(|d| self.is_task_done(*d)))
                    .unwrap_or(false)
            })
            .copied()
            .collect()
    }

    fn take_pending(&self, idx: usize) {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).remove(&idx);
    }

    fn drained(&self) -> bool {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
            && self.completed.load(Ordering::Acquire) == self.total.load(Ordering::Acquire)
    }

    fn into_graph(self) -> TaskGraph {
        self.tasks.into_iter().collect()
    }
}

/// Recursively substitute every `$K` / `${K}` sigil in `args` with the
/// stringified observation of task `K`. Non-string, non-sequence values
/// pass through unchanged. Dependencies are guaranteed complete by the time
/// this runs, since the scheduler never dispatches a task before its
/// dependency closure is satisfied.
fn substitute_args(args: &[ToolArg], tasks: &DashMap<usize, Task>) -> Vec<ToolArg> {
    args.iter().map(|arg| substitute_one(arg, tasks)).collect()
}

fn substitute_one(arg: &ToolArg, tasks: &DashMap<usize, Task>) -> ToolArg {
    match arg {
        ToolArg::Str(s) => ToolArg::Str(substitute_sigils(s, tasks)),
        ToolArg::Raw(s) => ToolArg::Raw(substitute_sigils(s, tasks)),
        ToolArg::Num(n) => ToolArg::Num(*n),
        ToolArg::List(items) => {
            ToolArg::List(items.iter().map(|item| substitute_one(item, tasks)).collect())
        }
    }
}

fn substitute_sigils(s: &str, tasks: &DashMap<usize, Task>) -> String {
    // `\d+` is greedy, so `${12}`/`$12` are matched whole and never confused
    // with `$1` followed by a literal `2` — no explicit longest-match-first
    // pass is needed on top of the regex itself.
    SIGIL_RE
        .replace_all(s, |caps: &regex::Captures| {
            let k: usize = caps
                .get(1)
                .or_else(|| caps.get(2))
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            tasks
                .get(&k)
                .and_then(|t| t.observation.clone())
                .unwrap_or_default()
        })
        .into_owned()
}

/// Maintains the task graph and schedules ready tasks against a
/// [`ToolRunner`] with maximum parallelism.
pub struct TaskFetchingUnit {
    runner: Arc<ToolRunner>,
    scheduling_interval: Duration,
}

impl TaskFetchingUnit {
    /// Build a TFU over `runner`, polling every `scheduling_interval` when
    /// nothing is ready.
    #[must_use]
    pub fn new(runner: Arc<ToolRunner>, scheduling_interval: Duration) -> Self {
        Self {
            runner,
            scheduling_interval,
        }
    }

    /// Install all of `graph`'s tasks up front, then drive the scheduling
    /// step until every task has completed.
    #[instrument(skip(self, graph))]
    pub async fn run_batch(&self, graph: TaskGraph) -> (TaskGraph, RunMetrics) {
        let shared = Arc::new(Shared::new());
        for task in graph.into_values() {
            shared.ingest(task);
        }
        self.drive(shared, Arc::new(AtomicBool::new(true))).await
    }

    /// Concurrently ingest tasks arriving on `receiver` until
    /// [`StreamItem::EndOfPlan`], while driving the scheduling step; returns
    /// once the stream is exhausted and every ingested task has completed.
    #[instrument(skip(self, receiver))]
    pub async fn run_stream(
        &self,
        mut receiver: mpsc::UnboundedReceiver<StreamItem>,
    ) -> (TaskGraph, RunMetrics) {
        let shared = Arc::new(Shared::new());
        let ingest_done = Arc::new(AtomicBool::new(false));

        let ingest_shared = Arc::clone(&shared);
        let ingest_flag = Arc::clone(&ingest_done);
        let ingest_handle = tokio::spawn(async move {
            while let Some(item) = receiver.recv().await {
                match item {
                    StreamItem::Task(task) => ingest_shared.ingest(task),
                    StreamItem::EndOfPlan => break,
                }
            }
            ingest_flag.store(true, Ordering::Release);
        });

        let result = self.drive(shared, ingest_done).await;
        let _ = ingest_handle.await;
        result
    }

    async fn drive(&self, shared: Arc<Shared>, ingest_done: Arc<AtomicBool>) -> (TaskGraph, RunMetrics) {
        let metrics = Arc::new(Mutex::new(RunMetrics::new()));
        let mut handles = Vec::new();

        loop {
            let ready = shared.ready_set();
            if ready.is_empty() {
                if ingest_done.load(Ordering::Acquire) && shared.drained() {
                    break;
                }
                tokio::time::sleep(self.scheduling_interval).await;
                continue;
            }

            for idx in ready {
                shared.take_pending(idx);
                let shared = Arc::clone(&shared);
                let runner = Arc::clone(&self.runner);
                let metrics = Arc::clone(&metrics);
                handles.push(tokio::spawn(async move {
                    Self::execute_one(shared, runner, metrics, idx).await;
                }));
            }
        }

        for handle in handles {
            let _ = handle.await;
        }

        let graph = Arc::try_unwrap(shared)
            .unwrap_or_else(|_| unreachable!("all spawned activities have joined"))
            .into_graph();
        let metrics = Arc::try_unwrap(metrics)
            .map(|m| m.into_inner().unwrap_or_else(|e| e.into_inner()))
            .unwrap_or_default();
        (graph, metrics)
    }

    async fn execute_one(
        shared: Arc<Shared>,
        runner: Arc<ToolRunner>,
        metrics: Arc<Mutex<RunMetrics>>,
        idx: usize,
    ) {
        let (name, args, is_join) = {
            let task = shared.tasks.get(&idx).expect("task was ingested");
            (task.name.clone(), task.args.clone(), task.is_join())
        };

        if is_join {
            debug!(idx, "join task reached; skipping invocation");
            if let Some(event) = shared.done.get(&idx) {
                event.set();
            }
            shared.completed.fetch_add(1, Ordering::Release);
            return;
        }

        let substituted = substitute_args(&args, &shared.tasks);
        let start = Instant::now();
        let observation = match runner.execute(&name, &substituted).await {
            Ok(obs) => obs,
            Err(err) => {
                warn!(idx, tool = %name, error = %err, "tool invocation failed");
                format!("Error: {err}")
            }
        };
        let elapsed = start.elapsed();

        if let Some(mut task) = shared.tasks.get_mut(&idx) {
            task.observation = Some(observation);
        }
        metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record_task_latency(&name, elapsed);

        if let Some(event) = shared.done.get(&idx) {
            event.set();
        }
        shared.completed.fetch_add(1, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::JOIN_NAME;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use weave_tools::{Result as ToolResult, Tool, ToolDefinition, ToolRegistry};

    struct Recording {
        def: ToolDefinition,
        calls: Arc<StdAtomicUsize>,
    }

    #[async_trait]
    impl Tool for Recording {
        fn definition(&self) -> &ToolDefinition {
            &self.def
        }
        async fn invoke(&self, args: &[ToolArg]) -> ToolResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(args.iter().map(ToolArg::as_display).collect::<Vec<_>>().join(","))
        }
    }

    struct Failing {
        def: ToolDefinition,
    }

    #[async_trait]
    impl Tool for Failing {
        fn definition(&self) -> &ToolDefinition {
            &self.def
        }
        async fn invoke(&self, _args: &[ToolArg]) -> ToolResult<String> {
            Err(weave_tools::Error::Execution("boom".into()))
        }
    }

    fn task(idx: usize, name: &str, args: Vec<ToolArg>, deps: &[usize]) -> Task {
        Task {
            idx,
            name: name.to_string(),
            args,
            dependencies: deps.iter().copied().collect(),
            thought: None,
            observation: None,
        }
    }

    fn tfu_with(registry: ToolRegistry) -> TaskFetchingUnit {
        let runner = Arc::new(ToolRunner::with_defaults(Arc::new(registry)));
        TaskFetchingUnit::new(runner, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn runs_independent_tasks_and_joins() {
        let calls = Arc::new(StdAtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Recording {
            def: ToolDefinition::new("search", "search(q) - looks up q"),
            calls: Arc::clone(&calls),
        }));

        let mut graph = TaskGraph::new();
        graph.insert(1, task(1, "search", vec![ToolArg::Str("a".into())], &[]));
        graph.insert(2, task(2, "search", vec![ToolArg::Str("b".into())], &[]));
        graph.insert(3, task(3, JOIN_NAME, vec![], &[1, 2]));

        let tfu = tfu_with(registry);
        let (result, metrics) = tfu.run_batch(graph).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result[&1].observation.as_deref(), Some("a"));
        assert_eq!(result[&2].observation.as_deref(), Some("b"));
        assert!(result[&3].observation.is_none());
        assert_eq!(metrics.per_task_latency["search"].len(), 2);
    }

    #[tokio::test]
    async fn substitutes_dependency_observation() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Recording {
            def: ToolDefinition::new("search", "search(q)"),
            calls: Arc::new(StdAtomicUsize::new(0)),
        }));
        registry.register(Arc::new(Recording {
            def: ToolDefinition::new("math", "math(expr)"),
            calls: Arc::new(StdAtomicUsize::new(0)),
        }));

        let mut graph = TaskGraph::new();
        graph.insert(1, task(1, "search", vec![ToolArg::Str("Everest".into())], &[]));
        graph.insert(
            2,
            task(
                2,
                "math",
                vec![ToolArg::Raw("height / 2".into()), ToolArg::Raw("$1".into())],
                &[1],
            ),
        );

        let tfu = tfu_with(registry);
        let (result, _metrics) = tfu.run_batch(graph).await;

        let obs2 = result[&2].observation.clone().unwrap();
        assert!(obs2.contains("Everest"), "expected substituted observation, got {obs2}");
        assert!(!obs2.contains('$'), "no sigil should survive substitution");
    }

    #[tokio::test]
    async fn tool_failure_is_captured_as_error_observation() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Failing {
            def: ToolDefinition::new("search", "search(q)"),
        }));

        let mut graph = TaskGraph::new();
        graph.insert(1, task(1, "search", vec![ToolArg::Str("X".into())], &[]));
        graph.insert(2, task(2, JOIN_NAME, vec![], &[1]));

        let tfu = tfu_with(registry);
        let (result, _metrics) = tfu.run_batch(graph).await;

        let obs = result[&1].observation.clone().unwrap();
        assert!(obs.starts_with("Error: "));
        assert!(result[&2].observation.is_none());
    }

    #[tokio::test]
    async fn run_stream_ingests_until_end_of_plan() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Recording {
            def: ToolDefinition::new("search", "search(q)"),
            calls: Arc::new(StdAtomicUsize::new(0)),
        }));

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(StreamItem::Task(task(1, "search", vec![ToolArg::Str("a".into())], &[])))
            .unwrap();
        tx.send(StreamItem::Task(task(2, JOIN_NAME, vec![], &[1])))
            .unwrap();
        tx.send(StreamItem::EndOfPlan).unwrap();
        drop(tx);

        let tfu = tfu_with(registry);
        let (result, _metrics) = tfu.run_stream(rx).await;
        assert_eq!(result.len(), 2);
        assert_eq!(result[&1].observation.as_deref(), Some("a"));
    }
}
