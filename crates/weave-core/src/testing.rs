//! A deterministic, in-memory [`LlmProvider`] stub for tests.
//!
//! Replays a fixed queue of scripted replies — one per call, in order —
//! never touching the network. Only compiled when the `test-util` feature
//! is enabled, so it never ships as part of a production dependency graph.

use crate::error::{Error, Result};
use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider, StreamEvent, TokenUsage};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Mutex;

/// Replays scripted text replies to every [`LlmProvider`] call it receives,
/// one reply per call, in the order they were supplied.
pub struct ScriptedProvider {
    replies: Mutex<std::collections::VecDeque<String>>,
}

impl ScriptedProvider {
    /// Build a provider that replays `replies` in order, one per call.
    #[must_use]
    pub fn new(replies: Vec<impl Into<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }

    fn next_reply(&self) -> Result<String> {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| Error::ModelTransport("scripted provider exhausted".to_string()))
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
        let text = self.next_reply()?;
        let usage = TokenUsage {
            prompt_tokens: 0,
            completion_tokens: text.split_whitespace().count() as u64,
        };
        Ok(CompletionResponse { text, usage })
    }

    async fn complete_stream(
        &self,
        _request: CompletionRequest,
    ) -> Result<BoxStream<'static, StreamEvent>> {
        let text = self.next_reply()?;
        let completion_tokens = text.split_whitespace().count() as u64;

        // Emit one token per character to exercise the parser's
        // token-at-a-time ingestion path, then a final usage event.
        let tokens: Vec<StreamEvent> = text
            .chars()
            .map(|c| StreamEvent::Token(c.to_string()))
            .chain(std::iter::once(StreamEvent::Done(TokenUsage {
                prompt_tokens: 0,
                completion_tokens,
            })))
            .collect();
        Ok(stream::iter(tokens).boxed())
    }
}
