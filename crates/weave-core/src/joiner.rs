//! The Joiner (C6).
//!
//! Formats the executed trace plus the question into a second prompt and
//! parses the model's verdict as `(thought, answer, replan?)`.

use crate::error::Result;
use crate::llm::{CompletionRequest, LlmProvider, TokenUsage};
use std::sync::Arc;
use tracing::instrument;

const REPLAN_MARKER: &str = "Replan";

/// Instruction template shared by both the non-final and final joiner
/// prompts; the final variant additionally forbids `Replan`.
fn instruction_block(is_final: bool) -> String {
    let mut block = String::from(
        "Solve the question. You are given the question and the actions taken so far \
         along with their observations.\n\
         Respond with exactly two lines:\n\
         Thought: <your reasoning>\n",
    );
    if is_final {
        block.push_str("Action: Finish(<answer>)\n");
    } else {
        block.push_str("Action: Finish(<answer>) | Replan(<hint for the next plan>)\n");
    }
    block
}

/// The joiner's verdict on one iteration's trace.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinVerdict {
    /// Free-text rationale from the `Thought:` line.
    pub thought: String,
    /// Payload from the `Action:` line's parentheses.
    pub answer: String,
    /// Whether the model asked for another planning iteration.
    pub replan: bool,
    /// Whether a well-formed `Action:` line was found at all. `false` means
    /// the response was malformed; the compiler loop is responsible for
    /// applying the error-handling fallback (`Finish("")` on the final
    /// iteration, `Replan("")` otherwise) rather than trusting `answer`/
    /// `replan` as a legitimate verdict.
    pub action_parsed: bool,
}

/// Formats joiner prompts and parses joiner responses against an
/// [`LlmProvider`].
pub struct Joiner {
    model: Arc<dyn LlmProvider>,
}

impl Joiner {
    /// Build a joiner over the given model provider.
    #[must_use]
    pub fn new(model: Arc<dyn LlmProvider>) -> Self {
        Self { model }
    }

    /// Ask the joiner whether `scratchpad` answers `question`.
    ///
    /// On the final iteration (`is_final == true`) `replan?` is force-set to
    /// `false` regardless of what the model's response says, per the final
    /// joiner prompt's contract. Also returns the call's token usage.
    #[instrument(skip(self, question, scratchpad))]
    pub async fn join(
        &self,
        question: &str,
        scratchpad: &str,
        is_final: bool,
    ) -> Result<(JoinVerdict, TokenUsage)> {
        let system_prompt = instruction_block(is_final);
        let user_prompt = format!("Question: {question}\n\n{scratchpad}\n");
        let request = CompletionRequest {
            system_prompt,
            user_prompt,
            stop: Vec::new(),
        };
        let response = self.model.complete(request).await?;
        let mut verdict = parse_joiner_output(&response.text);
        if is_final {
            verdict.replan = false;
        }
        Ok((verdict, response.usage))
    }
}

/// Parse a joiner response per the grammar:
/// ```text
/// Thought: TEXT
/// Action: (Finish|Replan)(ANSWER)
/// ```
/// A response missing the `Action:` line degrades to an empty thought/answer
/// with `replan? == false` and `action_parsed == false`; per the
/// `MalformedJoinerOutput` handling, the compiler loop treats that as
/// `Finish("")` on the final iteration and `Replan("")` otherwise — that
/// split happens in the compiler loop, not here.
#[must_use]
pub fn parse_joiner_output(raw: &str) -> JoinVerdict {
    let mut thought = String::new();
    let mut answer = String::new();
    let mut replan = false;
    let mut saw_action = false;

    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix("Thought:") {
            thought = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Action:") {
            saw_action = true;
            if let (Some(open), Some(close)) = (rest.find('('), rest.rfind(')')) {
                if open < close {
                    answer = rest[open + 1..close].to_string();
                }
            }
            replan = rest.contains(REPLAN_MARKER);
        }
    }

    JoinVerdict {
        thought,
        answer,
        replan: saw_action && replan,
        action_parsed: saw_action,
    }
}
