//! Streaming plan parser (C3).
//!
//! Consumes model tokens incrementally and emits fully-formed [`Task`]
//! records as soon as each plan line closes, so that dispatch of an early
//! task can overlap with the model still generating a later one. State is
//! owned per parser instance — a new `StreamingPlanParser` is built for
//! every planning iteration, never shared or reused across iterations.

use crate::task::{dependencies_from_args, Task, JOIN_NAME};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use weave_tools::{ToolArg, ToolRegistry};

/// Literal sentinel the model emits immediately after the `join` action.
pub const END_OF_PLAN: &str = "<END_OF_PLAN>";

static THOUGHT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Thought: ([^\n]*)").unwrap());
static ACTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\n*(\d+)\. (\w+)\((.*)\)(?:\s*#\w+\n)?").unwrap());
static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{?(\d+)\}?").unwrap());

/// Every `$K` / `${K}` reference appearing anywhere in `raw_args`, in the
/// order they occur (duplicates included — callers collect into a set).
#[must_use]
pub fn sigil_refs(raw_args: &str) -> Vec<usize> {
    ID_RE
        .captures_iter(raw_args)
        .filter_map(|caps| caps[1].parse::<usize>().ok())
        .collect()
}

/// Parses a plan's `ARGS` production into positional [`ToolArg`]s.
///
/// Attempts to read the entire argument string as one comma-separated
/// sequence of literals (numbers, quoted strings, nested lists/tuples). If
/// any part of that fails, the *whole* string is kept as a single raw
/// fallback argument rather than rejected outright, so a tool can still
/// receive free-form text it may not otherwise expect.
#[must_use]
pub fn parse_args(raw: &str) -> Vec<ToolArg> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match try_literal_sequence(raw) {
        Some(args) if !args.is_empty() => args,
        _ => vec![ToolArg::Raw(raw.to_string())],
    }
}

fn try_literal_sequence(raw: &str) -> Option<Vec<ToolArg>> {
    let parts = split_top_level(raw)?;
    let mut out = Vec::with_capacity(parts.len());
    for part in parts {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        out.push(parse_literal(trimmed)?);
    }
    Some(out)
}

fn parse_literal(s: &str) -> Option<ToolArg> {
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        return Some(ToolArg::Str(s[1..s.len() - 1].to_string()));
    }
    if s.len() >= 2
        && ((s.starts_with('[') && s.ends_with(']')) || (s.starts_with('(') && s.ends_with(')')))
    {
        let inner = &s[1..s.len() - 1];
        if inner.trim().is_empty() {
            return Some(ToolArg::List(Vec::new()));
        }
        let items = try_literal_sequence(inner)?;
        return Some(ToolArg::List(items));
    }
    s.parse::<f64>().ok().map(ToolArg::Num)
}

/// Split `s` on top-level commas, respecting nested `()`/`[]` and quoted
/// strings. Returns `None` if brackets or quotes are unbalanced.
fn split_top_level(s: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    let bytes = s.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        let c = s[i..].chars().next().unwrap();
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' | '[' => depth += 1,
                ')' | ']' => depth -= 1,
                ',' if depth == 0 => {
                    parts.push(&s[start..i]);
                    start = i + c.len_utf8();
                }
                _ => {}
            },
        }
        i += c.len_utf8();
    }
    if depth != 0 || quote.is_some() {
        return None;
    }
    parts.push(&s[start..]);
    Some(parts)
}

/// Streaming recogniser for the plan grammar. Maintains a line buffer and a
/// pending-thought slot, both private to this instance.
pub struct StreamingPlanParser {
    registry: Arc<ToolRegistry>,
    buffer: String,
    thought: Option<String>,
}

impl StreamingPlanParser {
    /// Build a fresh parser against `registry` for resolving tool names.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            buffer: String::new(),
            thought: None,
        }
    }

    /// Feed one chunk of tokens from the model's stream. A chunk may contain
    /// zero, one, or several complete lines (a real provider is free to
    /// batch its stream into multi-line deltas); a [`Task`] is returned for
    /// every plan line that closes as a result of this call, in order.
    pub fn ingest_token(&mut self, token: &str) -> Vec<Task> {
        let mut emitted = Vec::new();
        let mut rest = token;
        while let Some(nl) = rest.find('\n') {
            let line = rest[..nl].trim();
            self.buffer.push_str(line);
            self.buffer.push('\n');
            rest = &rest[nl + 1..];
            if let Some(task) = self.match_buffer() {
                emitted.push(task);
            }
        }
        self.buffer.push_str(rest);
        emitted
    }

    /// Flush any buffered content once the stream has ended.
    pub fn finalize(&mut self) -> Option<Task> {
        self.buffer.push('\n');
        self.match_buffer()
    }

    fn match_buffer(&mut self) -> Option<Task> {
        if let Some(caps) = THOUGHT_RE.captures(&self.buffer) {
            self.thought = Some(caps[1].to_string());
            self.buffer.clear();
            return None;
        }
        if let Some(caps) = ACTION_RE.captures(&self.buffer.clone()) {
            self.buffer.clear();
            let idx: usize = caps[1].parse().ok()?;
            let tool_name = caps[2].to_string();
            let args_raw = caps[3].to_string();
            let thought = self.thought.take();

            if tool_name != JOIN_NAME && !self.registry.has(&tool_name) {
                tracing::warn!(tool = %tool_name, idx, "dropping plan line: unknown tool");
                return None;
            }

            let dependencies = dependencies_from_args(idx, &tool_name, &args_raw);
            let args = parse_args(&args_raw);
            return Some(Task {
                idx,
                name: tool_name,
                args,
                dependencies,
                thought,
                observation: None,
            });
        }
        None
    }
}
