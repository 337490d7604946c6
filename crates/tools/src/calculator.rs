//! Calculator tool: evaluates arithmetic expressions.
//!
//! Supports `+`, `-`, `*`, `/`, `%`, `^` (right-associative power),
//! parentheses, unary negation and decimal numbers, via a
//! recursive-descent parser. No dependencies beyond std.

use async_trait::async_trait;
use toolwright_core::error::ToolError;
use toolwright_core::tool::{Tool, ToolContext, ToolOutcome, ToolParams};

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Params: {\"expression\": \"(2 + 3) * 4\"}. \
         Supports + - * / % ^, parentheses and decimals."
    }

    async fn execute(&self, params: ToolParams, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let expr = params
            .get("expression")
            .or_else(|| params.get("expr"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'expression' argument".into()))?;

        Ok(match evaluate(expr) {
            Ok(value) => ToolOutcome::ok(serde_json::json!({
                "expression": expr,
                "result": value,
                "formatted": format_number(value),
            })),
            Err(e) => ToolOutcome::failure(format!("Could not evaluate '{expr}': {e}")),
        })
    }
}

/// Remove the trailing `.0` from integral results.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ── Recursive-descent expression evaluator ────────────────────────────────

/// Evaluate an arithmetic expression string.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser::new(&tokens);
    let result = parser.parse_expr()?;
    if let Some(tok) = parser.peek() {
        return Err(format!("Unexpected token at position {}: {tok:?}", parser.pos));
    }
    if !result.is_finite() {
        return Err("Result is not a finite number".into());
    }
    Ok(result)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let single = match chars[i] {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let num_str: String = chars[start..i].iter().collect();
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("Invalid number: {num_str}"))?;
                tokens.push(Token::Number(num));
                continue;
            }
            c => return Err(format!("Unexpected character: '{c}'")),
        };
        tokens.push(single);
        i += 1;
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    // expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<f64, String> {
        let mut left = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.consume();
                    left += self.parse_term()?;
                }
                Some(Token::Minus) => {
                    self.consume();
                    left -= self.parse_term()?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // term = unary (('*' | '/' | '%') unary)*
    fn parse_term(&mut self) -> Result<f64, String> {
        let mut left = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.consume();
                    left *= self.parse_unary()?;
                }
                Some(Token::Slash) => {
                    self.consume();
                    let right = self.parse_unary()?;
                    if right == 0.0 {
                        return Err("Division by zero".into());
                    }
                    left /= right;
                }
                Some(Token::Percent) => {
                    self.consume();
                    let right = self.parse_unary()?;
                    if right == 0.0 {
                        return Err("Modulo by zero".into());
                    }
                    left %= right;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // unary = '-' unary | power
    fn parse_unary(&mut self) -> Result<f64, String> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            return Ok(-self.parse_unary()?);
        }
        self.parse_power()
    }

    // power = primary ('^' unary)?   (right-associative, binds tighter than unary minus on the left)
    fn parse_power(&mut self) -> Result<f64, String> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // primary = NUMBER | '(' expr ')'
    fn parse_primary(&mut self) -> Result<f64, String> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(*n),
            Some(Token::LParen) => {
                let val = self.parse_expr()?;
                match self.consume() {
                    Some(Token::RParen) => Ok(val),
                    _ => Err("Expected closing parenthesis".into()),
                }
            }
            Some(tok) => Err(format!("Unexpected token: {tok:?}")),
            None => Err("Unexpected end of expression".into()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: serde_json::Value) -> ToolParams {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn operator_precedence() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
    }

    #[test]
    fn nested_parentheses() {
        assert_eq!(evaluate("((1 + 2) * (3 + 4))").unwrap(), 21.0);
    }

    #[test]
    fn division_and_modulo() {
        assert_eq!(evaluate("10 / 4").unwrap(), 2.5);
        assert_eq!(evaluate("10 % 4").unwrap(), 2.0);
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("1 % 0").is_err());
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
        assert_eq!(evaluate("2 * 3 ^ 2").unwrap(), 18.0);
        assert_eq!(evaluate("-2 ^ 2").unwrap(), -4.0);
        assert_eq!(evaluate("2 ^ -1").unwrap(), 0.5);
    }

    #[test]
    fn unary_negation_and_decimals() {
        assert_eq!(evaluate("-5 + 3").unwrap(), -2.0);
        assert_eq!(evaluate("3.14 * 2").unwrap(), 6.28);
    }

    #[test]
    fn invalid_expressions() {
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("2 3").is_err());
        assert!(evaluate("1..2").is_err());
        assert!(evaluate("abs(2)").is_err());
    }

    #[tokio::test]
    async fn accepts_expr_alias() {
        let outcome = CalculatorTool
            .execute(params(serde_json::json!({"expr": "2+2"})), &ToolContext::new())
            .await
            .unwrap();
        assert!(outcome.success);
        let data = outcome.data.unwrap();
        assert_eq!(data["result"], 4.0);
        assert_eq!(data["formatted"], "4");
    }

    #[tokio::test]
    async fn formats_decimals() {
        let outcome = CalculatorTool
            .execute(params(serde_json::json!({"expression": "10 / 3"})), &ToolContext::new())
            .await
            .unwrap();
        let formatted = outcome.data.unwrap()["formatted"].as_str().unwrap().to_string();
        assert!(formatted.starts_with("3.333"));
    }

    #[tokio::test]
    async fn evaluation_error_is_failure_outcome() {
        let outcome = CalculatorTool
            .execute(params(serde_json::json!({"expression": "1 / 0"})), &ToolContext::new())
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("Division by zero"));
    }

    #[tokio::test]
    async fn missing_expression_is_invalid_arguments() {
        let result = CalculatorTool
            .execute(ToolParams::new(), &ToolContext::new())
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
