//! End-to-end scenarios exercising the full Planner → TFU → Joiner loop
//! against a scripted model and the illustrative `search`/`math` tools.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use weave_core::testing::ScriptedProvider;
use weave_core::{CompilerConfig, Compiler};
use weave_tools::{
    MathTool, Result as ToolResult, SearchEntry, SearchTool, Tool, ToolArg, ToolDefinition,
    ToolRegistry,
};

fn search_and_math_registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SearchTool::new(vec![
        SearchEntry::new(
            "Arthur's Magazine",
            "Arthur's Magazine (1844-1846) was an American literary periodical.",
        ),
        SearchEntry::new(
            "First for Women",
            "First for Women is a woman's magazine that started in 1989.",
        ),
        SearchEntry::new("cheetah", "The cheetah can run up to 98 km/h."),
        SearchEntry::new("greyhound", "The greyhound can run up to 70 km/h."),
        SearchEntry::new("Everest", "Mount Everest stands at 29032 feet."),
        SearchEntry::new("Kilimanjaro", "Mount Kilimanjaro stands at 19341 feet."),
    ])));
    registry.register(Arc::new(MathTool::new()));
    Arc::new(registry)
}

/// S1 — two independent searches feed a join; joiner finishes directly.
#[tokio::test]
async fn s1_two_search_compare() {
    let planner_model = Arc::new(ScriptedProvider::new(vec![concat!(
        "1. search(\"Arthur's Magazine\")\n",
        "2. search(\"First for Women (magazine)\")\n",
        "3. join()\n",
        "<END_OF_PLAN>",
    )]));
    let joiner_model = Arc::new(ScriptedProvider::new(vec![
        "Thought: Arthur's Magazine (1844) predates First for Women (1989)\nAction: Finish(Arthur's Magazine)",
    ]));
    let compiler = Compiler::new(
        search_and_math_registry(),
        planner_model,
        joiner_model,
        CompilerConfig::default(),
    );
    let (answer, _metrics) = compiler
        .run("Which magazine was started first, Arthur's Magazine or First for Women?")
        .await
        .unwrap();
    assert_eq!(answer, "Arthur's Magazine");
}

/// S2 — four independent tasks (two searches, two literal-arg math calls)
/// all dispatch concurrently; their latencies are all recorded.
#[tokio::test]
async fn s2_dependent_math_runs_concurrently() {
    let planner_model = Arc::new(ScriptedProvider::new(vec![concat!(
        "1. search(\"cheetah\")\n",
        "2. search(\"greyhound\")\n",
        "3. math(\"98/1.3\")\n",
        "4. math(\"70*1.5\")\n",
        "5. join()\n",
        "<END_OF_PLAN>",
    )]));
    let joiner_model = Arc::new(ScriptedProvider::new(vec![
        "Thought: cheetahs are faster\nAction: Finish(cheetah)",
    ]));
    let compiler = Compiler::new(
        search_and_math_registry(),
        planner_model,
        joiner_model,
        CompilerConfig::default(),
    );
    let (answer, metrics) = compiler.run("which animal is faster?").await.unwrap();
    assert_eq!(answer, "cheetah");
    assert_eq!(metrics.per_task_latency["search"].len(), 2);
    assert_eq!(metrics.per_task_latency["math"].len(), 2);
}

struct Recorder {
    def: ToolDefinition,
    seen: Arc<std::sync::Mutex<Vec<String>>>,
}

#[async_trait]
impl Tool for Recorder {
    fn definition(&self) -> &ToolDefinition {
        &self.def
    }
    async fn invoke(&self, args: &[ToolArg]) -> ToolResult<String> {
        let rendered = args.iter().map(ToolArg::as_display).collect::<Vec<_>>().join(" | ");
        self.seen.lock().unwrap().push(rendered.clone());
        Ok(rendered)
    }
}

/// S3 — the second task's dependency sigil is replaced with the full
/// observation text of task 1, not left as the literal `$1`.
#[tokio::test]
async fn s3_substitution_fidelity() {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SearchTool::new(vec![SearchEntry::new(
        "Everest",
        "Mount Everest stands at 29032 feet.",
    )])));
    registry.register(Arc::new(Recorder {
        def: ToolDefinition::new("record", "record(note, value) - records a note"),
        seen: Arc::clone(&seen),
    }));

    let planner_model = Arc::new(ScriptedProvider::new(vec![concat!(
        "1. search(\"Everest\")\n",
        "2. record(\"height of Everest\", $1)\n",
        "3. join()\n",
        "<END_OF_PLAN>",
    )]));
    let joiner_model = Arc::new(ScriptedProvider::new(vec!["Thought: done\nAction: Finish(ok)"]));
    let compiler = Compiler::new(Arc::new(registry), planner_model, joiner_model, CompilerConfig::default());
    compiler.run("how tall is Everest?").await.unwrap();

    let calls = seen.lock().unwrap();
    let record_call = calls.iter().find(|c| c.contains("height of Everest")).unwrap();
    assert!(!record_call.contains('$'), "no sigil should survive substitution: {record_call}");
    assert!(record_call.contains("29032"), "expected substituted observation: {record_call}");
}

/// S4 — a replan carries the joiner's thought into the next planner prompt's
/// context, and the second iteration's answer is returned.
#[tokio::test]
async fn s4_replan_carries_context() {
    let planner_model = Arc::new(ScriptedProvider::new(vec![
        "1. search(\"Everest\")\n2. join()\n<END_OF_PLAN>",
        "1. search(\"Kilimanjaro\")\n2. join()\n<END_OF_PLAN>",
    ]));
    let joiner_model = Arc::new(ScriptedProvider::new(vec![
        "Thought: need Kilimanjaro\nAction: Replan(need Kilimanjaro)",
        "Thought: both known\nAction: Finish(7365.57)",
    ]));
    let config = CompilerConfig::default().with_max_replans(3).unwrap();
    let compiler = Compiler::new(search_and_math_registry(), planner_model, joiner_model, config);
    let (answer, _metrics) = compiler.run("combined elevation?").await.unwrap();
    assert_eq!(answer, "7365.57");
}

/// S5 — a failing tool call degrades to an `"Error: "`-prefixed observation
/// without aborting the run; the join is still reached and the joiner is
/// still invoked.
#[tokio::test]
async fn s5_tool_failure_degrades_to_error_observation() {
    let calls = Arc::new(AtomicUsize::new(0));
    struct Failing {
        def: ToolDefinition,
        calls: Arc<AtomicUsize>,
    }
    #[async_trait]
    impl Tool for Failing {
        fn definition(&self) -> &ToolDefinition {
            &self.def
        }
        async fn invoke(&self, _args: &[ToolArg]) -> ToolResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(weave_tools::Error::Execution("backend unavailable".into()))
        }
    }

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(Failing {
        def: ToolDefinition::new("search", "search(query)"),
        calls: Arc::clone(&calls),
    }));

    let planner_model = Arc::new(ScriptedProvider::new(vec![
        "1. search(\"X\")\n2. join()\n<END_OF_PLAN>",
    ]));
    let joiner_model = Arc::new(ScriptedProvider::new(vec!["Thought: degraded\nAction: Finish(unknown)"]));
    let compiler = Compiler::new(Arc::new(registry), planner_model, joiner_model, CompilerConfig::default());
    let (answer, _metrics) = compiler.run("what is X?").await.unwrap();

    assert_eq!(answer, "unknown");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// S6 — with `max_replans=2` and the joiner requesting `Replan` on both
/// iterations, the second iteration uses the final joiner prompt (which
/// forbids replan) and its answer is returned regardless.
#[tokio::test]
async fn s6_max_replans_cap_forces_final_answer() {
    let planner_model = Arc::new(ScriptedProvider::new(vec![
        "1. search(\"cheetah\")\n2. join()\n<END_OF_PLAN>",
        "1. search(\"greyhound\")\n2. join()\n<END_OF_PLAN>",
    ]));
    let joiner_model = Arc::new(ScriptedProvider::new(vec![
        "Thought: need more data\nAction: Replan(check greyhound too)",
        "Thought: out of iterations\nAction: Replan(would ask again but cannot)",
    ]));
    let config = CompilerConfig::default().with_max_replans(2).unwrap();
    let compiler = Compiler::new(search_and_math_registry(), planner_model, joiner_model, config);
    let (answer, _metrics) = compiler.run("which is faster?").await.unwrap();
    assert_eq!(answer, "would ask again but cannot");
}
