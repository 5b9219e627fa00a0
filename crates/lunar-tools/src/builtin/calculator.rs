// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluates a basic arithmetic expression (+, -, *, /, parentheses, decimals)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {"type": "string", "description": "Arithmetic expression, e.g. \"(2 + 3) * 4\""}
            },
            "required": ["expression"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let expression = match call.args.get("expression").and_then(|v| v.as_str()) {
            Some(e) => e,
            None => return ToolOutput::err(&call.id, "missing required parameter 'expression'"),
        };
        match evaluate(expression) {
            Ok(result) => ToolOutput::ok(&call.id, result.to_string()),
            Err(e) => ToolOutput::err(&call.id, e),
        }
    }
}

/// Evaluates a basic arithmetic expression with +, -, *, /, unary minus and
/// parentheses, via a small recursive-descent parser.
fn evaluate(expression: &str) -> Result<f64, String> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("unexpected trailing input at token {}", parser.pos));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(expression: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expression.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text.parse::<f64>().map_err(|_| format!("invalid number: {text}"))?;
                tokens.push(Token::Number(value));
            }
            other => return Err(format!("unexpected character: {other}")),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn parse_expr(&mut self) -> Result<f64, String> {
        let mut value = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.parse_term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.parse_term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_term(&mut self) -> Result<f64, String> {
        let mut value = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.parse_unary()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let divisor = self.parse_unary()?;
                    if divisor == 0.0 {
                        return Err("division by zero".into());
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_unary(&mut self) -> Result<f64, String> {
        if let Some(Token::Minus) = self.peek() {
            self.pos += 1;
            return Ok(-self.parse_unary()?);
        }
        if let Some(Token::Plus) = self.peek() {
            self.pos += 1;
            return self.parse_unary();
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<f64, String> {
        match self.peek().cloned() {
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(n)
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let value = self.parse_expr()?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => Err("expected closing parenthesis".into()),
                }
            }
            other => Err(format!("unexpected token: {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(expression: &str) -> ToolCall {
        ToolCall { id: "1".into(), name: "calculator".into(), args: json!({"expression": expression}) }
    }

    #[tokio::test]
    async fn adds_two_numbers() {
        let out = CalculatorTool.execute(&call("2 + 3")).await;
        assert_eq!(out.content, "5");
    }

    #[tokio::test]
    async fn respects_operator_precedence() {
        let out = CalculatorTool.execute(&call("2 + 3 * 4")).await;
        assert_eq!(out.content, "14");
    }

    #[tokio::test]
    async fn respects_parentheses() {
        let out = CalculatorTool.execute(&call("(2 + 3) * 4")).await;
        assert_eq!(out.content, "20");
    }

    #[tokio::test]
    async fn supports_unary_minus() {
        let out = CalculatorTool.execute(&call("-5 + 10")).await;
        assert_eq!(out.content, "5");
    }

    #[tokio::test]
    async fn division_by_zero_is_an_error() {
        let out = CalculatorTool.execute(&call("1 / 0")).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn invalid_expression_is_an_error() {
        let out = CalculatorTool.execute(&call("2 + ")).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn missing_expression_is_an_error() {
        let call = ToolCall { id: "1".into(), name: "calculator".into(), args: json!({}) };
        let out = CalculatorTool.execute(&call).await;
        assert!(out.is_error);
    }
}
