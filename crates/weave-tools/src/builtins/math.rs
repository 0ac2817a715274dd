//! A tiny arithmetic-expression evaluator standing in for a calculator chain.

use crate::error::{Error, Result};
use crate::registry::{Tool, ToolArg, ToolDefinition};
use async_trait::async_trait;

/// `math(expression: string)` — evaluates a `+ - * / ( )` expression over
/// floating point numbers and returns its value as a string.
pub struct MathTool {
    def: ToolDefinition,
}

impl Default for MathTool {
    fn default() -> Self {
        Self::new()
    }
}

impl MathTool {
    /// Build the tool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            def: ToolDefinition::new(
                "math",
                "math(expression: string) - evaluates an arithmetic expression and returns the result",
            ),
        }
    }
}

#[async_trait]
impl Tool for MathTool {
    fn definition(&self) -> &ToolDefinition {
        &self.def
    }

    async fn invoke(&self, args: &[ToolArg]) -> Result<String> {
        let expr = args
            .first()
            .map(ToolArg::as_display)
            .ok_or_else(|| Error::InvalidInput("math requires an expression argument".into()))?;
        eval(&expr)
            .map(|value| format_number(value))
            .map_err(Error::Execution)
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let mut s = format!("{value:.2}");
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
        s
    }
}

/// Recursive-descent evaluator for `expr := term (('+'|'-') term)*`,
/// `term := factor (('*'|'/') factor)*`, `factor := NUMBER | '(' expr ')'`.
fn eval(src: &str) -> std::result::Result<f64, String> {
    let tokens: Vec<char> = src.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pos = 0usize;
    let value = parse_expr(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err(format!("unexpected trailing input in {src:?}"));
    }
    Ok(value)
}

fn parse_expr(tokens: &[char], pos: &mut usize) -> std::result::Result<f64, String> {
    let mut value = parse_term(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some('+') => {
                *pos += 1;
                value += parse_term(tokens, pos)?;
            }
            Some('-') => {
                *pos += 1;
                value -= parse_term(tokens, pos)?;
            }
            _ => break,
        }
    }
    Ok(value)
}

fn parse_term(tokens: &[char], pos: &mut usize) -> std::result::Result<f64, String> {
    let mut value = parse_factor(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some('*') => {
                *pos += 1;
                value *= parse_factor(tokens, pos)?;
            }
            Some('/') => {
                *pos += 1;
                let divisor = parse_factor(tokens, pos)?;
                if divisor == 0.0 {
                    return Err("division by zero".to_string());
                }
                value /= divisor;
            }
            _ => break,
        }
    }
    Ok(value)
}

fn parse_factor(tokens: &[char], pos: &mut usize) -> std::result::Result<f64, String> {
    match tokens.get(*pos) {
        Some('(') => {
            *pos += 1;
            let value = parse_expr(tokens, pos)?;
            match tokens.get(*pos) {
                Some(')') => {
                    *pos += 1;
                    Ok(value)
                }
                _ => Err("expected closing parenthesis".to_string()),
            }
        }
        Some('-') => {
            *pos += 1;
            Ok(-parse_factor(tokens, pos)?)
        }
        _ => {
            let start = *pos;
            while tokens
                .get(*pos)
                .is_some_and(|c| c.is_ascii_digit() || *c == '.')
            {
                *pos += 1;
            }
            if *pos == start {
                return Err(format!(
                    "expected a number at position {start}, found {:?}",
                    tokens.get(start)
                ));
            }
            let text: String = tokens[start..*pos].iter().collect();
            text.parse::<f64>()
                .map_err(|e| format!("invalid number {text:?}: {e}"))
        }
    }
}
