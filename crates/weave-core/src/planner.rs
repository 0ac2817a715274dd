//! The Planner (C4).
//!
//! Builds the system+user prompts (initial and replan variants), invokes the
//! model, routes tokens to the streaming parser, and yields either a task
//! map (batch mode) or a task channel (stream mode).

use crate::error::Result;
use crate::llm::{CompletionRequest, LlmProvider, StreamEvent, TokenUsage};
use crate::parser::{StreamingPlanParser, END_OF_PLAN};
use crate::task::{StreamItem, Task, TaskGraph};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::instrument;
use weave_tools::ToolRegistry;

const JOIN_DESCRIPTION: &str = concat!(
    "join():\n",
    " - Collects and combines results from prior actions.\n",
    " - Call join to either finalize the answer or hand off to the next planning step.\n",
    " - join should always be the last action in the plan.",
);

/// Build the system prompt the planner sends to the model, in either the
/// initial or replan variant.
#[must_use]
pub fn build_system_prompt(registry: &ToolRegistry, is_replan: bool) -> String {
    let tool_count = registry.len() + 1;
    let mut prompt = format!(
        "Given a user query, create a plan to solve it with the utmost parallelizability. \
         Each plan should comprise an action from the following {tool_count} types:\n"
    );
    prompt.push_str(&registry.describe_all());
    prompt.push('\n');
    prompt.push_str(&format!("{}. {JOIN_DESCRIPTION}\n\n", registry.len() + 1));

    prompt.push_str(
        "Guidelines:\n\
         - Each action in the plan should strictly be one of the above types.\n\
         - Each action MUST have a unique ID, which is strictly increasing.\n\
         - Inputs for actions can either be constants or outputs from preceding actions. \
           In the latter case, use the format $id to denote the ID of the previous action \
           whose output will be the input.\n",
    );
    prompt.push_str(&format!(
        " - Always call join as the last action in the plan. Say '{END_OF_PLAN}' after you call join\n"
    ));
    prompt.push_str(
        " - Ensure the plan maximizes parallelizability.\n\
         - Only use the provided action types.\n\
         - Never introduce new actions other than the ones provided.\n\n",
    );

    if is_replan {
        prompt.push_str(
            "You are given a \"Previous Plan\" section: the plan the previous iteration created, \
             along with each action's observation and a closing thought about why another plan \
             is needed. Use it to create the next plan under \"Current Plan\". Start the current \
             plan with a Thought that outlines the new strategy. Never repeat an action already \
             executed in the Previous Plan.\n",
        );
    }

    prompt
}

/// Builds prompts, drives the model, and produces task graphs for one
/// planning iteration.
pub struct Planner {
    model: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
}

impl Planner {
    /// Build a planner over `model`, resolving tool names against `registry`.
    #[must_use]
    pub fn new(model: Arc<dyn LlmProvider>, registry: Arc<ToolRegistry>) -> Self {
        Self { model, registry }
    }

    fn user_prompt(question: &str, context: Option<&str>) -> String {
        match context {
            Some(context) => format!("Question: {question}\n{context}\n"),
            None => format!("Question: {question}"),
        }
    }

    /// Batch mode: invoke the model with the full prompt, feed the full
    /// reply through the streaming parser, and return the collected graph
    /// alongside the call's token usage.
    #[instrument(skip(self, context))]
    pub async fn plan(
        &self,
        question: &str,
        context: Option<&str>,
    ) -> Result<(TaskGraph, TokenUsage)> {
        let is_replan = context.is_some();
        let request = CompletionRequest {
            system_prompt: build_system_prompt(&self.registry, is_replan),
            user_prompt: Self::user_prompt(question, context),
            stop: vec![END_OF_PLAN.to_string()],
        };
        let response = self.model.complete(request).await?;

        let mut parser = StreamingPlanParser::new(Arc::clone(&self.registry));
        let mut graph = TaskGraph::new();
        for token in response.text.split_inclusive('\n') {
            for task in parser.ingest_token(token) {
                let is_join = task.is_join();
                graph.insert(task.idx, task);
                if is_join {
                    return Ok((graph, response.usage));
                }
            }
        }
        if let Some(task) = parser.finalize() {
            graph.insert(task.idx, task);
        }
        Ok((graph, response.usage))
    }

    /// Streaming mode: invoke the model with a token callback that forwards
    /// tokens to a dedicated parser instance; emitted tasks (and a final
    /// [`StreamItem::EndOfPlan`] sentinel) are placed on `sender`. Returns
    /// the stream's terminal token usage.
    #[instrument(skip(self, context, sender))]
    pub async fn stream_plan(
        &self,
        question: &str,
        context: Option<&str>,
        sender: mpsc::UnboundedSender<StreamItem>,
    ) -> Result<TokenUsage> {
        let is_replan = context.is_some();
        let request = CompletionRequest {
            system_prompt: build_system_prompt(&self.registry, is_replan),
            user_prompt: Self::user_prompt(question, context),
            stop: vec![END_OF_PLAN.to_string()],
        };

        let mut stream = self.model.complete_stream(request).await?;
        let mut parser = StreamingPlanParser::new(Arc::clone(&self.registry));
        let mut ended = false;
        let mut usage = TokenUsage::default();

        while let Some(event) = stream.next().await {
            match event {
                StreamEvent::Token(token) => {
                    for task in parser.ingest_token(&token) {
                        let is_join = task.is_join();
                        let _ = sender.send(StreamItem::Task(task));
                        if is_join {
                            let _ = sender.send(StreamItem::EndOfPlan);
                            ended = true;
                        }
                    }
                }
                StreamEvent::Done(done_usage) => {
                    usage = done_usage;
                    break;
                }
            }
        }

        if !ended {
            if let Some(task) = parser.finalize() {
                let _ = sender.send(StreamItem::Task(task));
            }
            let _ = sender.send(StreamItem::EndOfPlan);
        }
        Ok(usage)
    }
}

fn collect_non_join(graph: &TaskGraph) -> Vec<&Task> {
    let mut tasks: Vec<&Task> = graph.values().filter(|t| !t.is_join()).collect();
    tasks.sort_by_key(|t| t.idx);
    tasks
}

/// Render the "previous plan" block for a replanned iteration: every
/// non-join task as `idx. render(args)\nObservation: obs\n`, followed by a
/// trailing `Thought: <joiner thought>` line. `renders` supplies a tool's
/// custom trace rendering, keyed by task idx, falling back to the default
/// literal rendering for any task missing an entry.
#[must_use]
pub fn format_previous_plan(
    graph: &TaskGraph,
    joiner_thought: &str,
    renders: &std::collections::HashMap<usize, String>,
) -> String {
    let mut body = String::new();
    for task in collect_non_join(graph) {
        body.push_str(&task.render_trace(renders.get(&task.idx).map(String::as_str)));
    }
    format!("{}\nThought: {joiner_thought}", body.trim_end())
}

/// Join accumulated previous-plan contexts with the replanner's trailing
/// "Current Plan" marker.
#[must_use]
pub fn format_contexts(contexts: &[String]) -> String {
    let mut out = String::new();
    for context in contexts {
        out.push_str(&format!("Previous Plan:\n\n{context}\n\n"));
    }
    out.push_str("Current Plan:\n\n");
    out
}
