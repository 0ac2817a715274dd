//! The model-endpoint boundary (C8).
//!
//! Out of scope as an implementation — the language-model endpoint is an
//! external collaborator — but the core needs a trait to call against, both
//! for C4/C6 to depend on and for tests to stub deterministically.

use async_trait::async_trait;
use futures::stream::BoxStream;

/// Token accounting for a single model call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u64,
    /// Tokens produced in the completion.
    pub completion_tokens: u64,
}

/// A non-streaming completion request: system + user prompt, plus stop
/// sequences the model should halt generation on.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt (tool descriptions, guidelines, or joiner instructions).
    pub system_prompt: String,
    /// User-turn prompt (the question, optionally with replan context).
    pub user_prompt: String,
    /// Sequences that terminate generation, e.g. the end-of-plan marker.
    pub stop: Vec<String>,
}

/// The result of a non-streaming completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Full generated text.
    pub text: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
}

/// One item of a streamed completion: either a text delta, or the final
/// usage summary marking the end of the stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A partial text delta.
    Token(String),
    /// The stream has ended; carries total token usage for the call.
    Done(TokenUsage),
}

/// A provider capable of driving the planner and joiner's model calls.
///
/// The planner uses [`LlmProvider::complete_stream`] when operating in
/// streaming mode and [`LlmProvider::complete`] otherwise; the joiner always
/// uses [`LlmProvider::complete`], since its output is short enough that
/// incremental parsing buys nothing.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name, used only in logging.
    fn name(&self) -> &str;

    /// Run a non-streaming completion.
    async fn complete(&self, request: CompletionRequest) -> crate::error::Result<CompletionResponse>;

    /// Run a streaming completion, yielding text deltas as they arrive,
    /// terminated by exactly one [`StreamEvent::Done`].
    async fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> crate::error::Result<BoxStream<'static, StreamEvent>>;
}
