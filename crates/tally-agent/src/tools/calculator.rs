use std::f64::consts;
use std::future::ready;

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tally_agent_core::tool::{Error as ToolError, Tool, ToolResult};
use thiserror::Error;

const DEFAULT_PRECISION: usize = 10;

/// More decimals than this carry no information for an `f64`.
const MAX_PRECISION: usize = 17;

/// Nesting limit for parentheses, unary signs and `^` chains.
const MAX_DEPTH: usize = 256;

/// Why an expression could not be evaluated.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CalculatorError {
    /// The expression is empty.
    #[error("expression is empty")]
    Empty,
    /// A character that is not part of the expression grammar.
    #[error("unexpected character `{0}` at position {1}")]
    UnexpectedChar(char, usize),
    /// A token that does not fit where it appears.
    #[error("unexpected `{0}`")]
    UnexpectedToken(String),
    /// The expression stops in the middle.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    /// A constant or function name we don't know.
    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// The result is infinite or not a number.
    #[error("result is not a finite number")]
    NonFinite,
    /// The expression nests deeper than the parser allows.
    #[error("expression is nested too deeply")]
    TooDeep,
}

/// Evaluates an arithmetic expression.
///
/// Supports `+ - * / % ^` (`**` is accepted for `^`), parentheses, unary
/// signs, the constants `pi` and `e`, and a handful of one-argument
/// functions such as `sqrt` and `sin`. `^` is right-associative and binds
/// tighter than unary minus, so `-2^2` is `-4`.
pub fn evaluate(expression: &str) -> Result<f64, CalculatorError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(CalculatorError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr(0)?;
    if let Some(token) = parser.peek() {
        return Err(CalculatorError::UnexpectedToken(token.to_string()));
    }
    if !value.is_finite() {
        return Err(CalculatorError::NonFinite);
    }
    Ok(value)
}

/// Formats `value` with at most `precision` decimal places, dropping
/// trailing zeros. `precision` is capped at 17.
pub fn format_number(value: f64, precision: usize) -> String {
    let precision = precision.min(MAX_PRECISION);
    let mut s = format!("{value:.precision$}");
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" { "0".to_owned() } else { s }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(Op),
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Ident(name) => f.write_str(name),
            Token::Op(op) => write!(f, "{}", op.symbol()),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Rem => "%",
            Op::Pow => "^",
        }
    }

    /// Left and right binding power.
    fn binding_power(self) -> (u8, u8) {
        match self {
            Op::Add | Op::Sub => (1, 2),
            Op::Mul | Op::Div | Op::Rem => (3, 4),
            Op::Pow => (7, 6),
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> Result<f64, CalculatorError> {
        let value = match self {
            Op::Add => lhs + rhs,
            Op::Sub => lhs - rhs,
            Op::Mul => lhs * rhs,
            Op::Div | Op::Rem if rhs == 0.0 => {
                return Err(CalculatorError::DivisionByZero);
            }
            Op::Div => lhs / rhs,
            // Floored modulo: the sign follows the divisor.
            Op::Rem => lhs - rhs * (lhs / rhs).floor(),
            Op::Pow => lhs.powf(rhs),
        };
        Ok(value)
    }
}

const PREFIX_BP: u8 = 5;

fn tokenize(input: &str) -> Result<Vec<Token>, CalculatorError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_digit() || chars[i] == '.')
                {
                    i += 1;
                }
                // Exponent, only when digits follow so `2e` stays `2 e`.
                if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && matches!(chars[j], '+' | '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse()
                    .map_err(|_| CalculatorError::UnexpectedToken(text))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_')
                {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                tokens.push(Token::Ident(name.to_lowercase()));
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Op(Op::Pow));
                i += 2;
            }
            _ => {
                let token = match c {
                    '+' => Token::Op(Op::Add),
                    '-' => Token::Op(Op::Sub),
                    '*' => Token::Op(Op::Mul),
                    '/' => Token::Op(Op::Div),
                    '%' => Token::Op(Op::Rem),
                    '^' => Token::Op(Op::Pow),
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    _ => return Err(CalculatorError::UnexpectedChar(c, i)),
                };
                tokens.push(token);
                i += 1;
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, CalculatorError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(CalculatorError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn expect_rparen(&mut self) -> Result<(), CalculatorError> {
        match self.next()? {
            Token::RParen => Ok(()),
            token => Err(CalculatorError::UnexpectedToken(token.to_string())),
        }
    }

    fn expr(&mut self, min_bp: u8) -> Result<f64, CalculatorError> {
        if self.depth == MAX_DEPTH {
            return Err(CalculatorError::TooDeep);
        }
        self.depth += 1;
        let value = self.expr_inner(min_bp);
        self.depth -= 1;
        value
    }

    fn expr_inner(&mut self, min_bp: u8) -> Result<f64, CalculatorError> {
        let mut lhs = self.prefix()?;
        while let Some(&Token::Op(op)) = self.peek() {
            let (l_bp, r_bp) = op.binding_power();
            if l_bp < min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.expr(r_bp)?;
            lhs = op.apply(lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<f64, CalculatorError> {
        match self.next()? {
            Token::Number(n) => Ok(n),
            Token::Op(Op::Sub) => Ok(-self.expr(PREFIX_BP)?),
            Token::Op(Op::Add) => self.expr(PREFIX_BP),
            Token::LParen => {
                let value = self.expr(0)?;
                self.expect_rparen()?;
                Ok(value)
            }
            Token::Ident(name) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let arg = self.expr(0)?;
                    self.expect_rparen()?;
                    call_function(&name, arg)
                } else {
                    constant(&name)
                }
            }
            token => Err(CalculatorError::UnexpectedToken(token.to_string())),
        }
    }
}

fn constant(name: &str) -> Result<f64, CalculatorError> {
    match name {
        "pi" => Ok(consts::PI),
        "e" => Ok(consts::E),
        _ => Err(CalculatorError::UnknownIdentifier(name.to_owned())),
    }
}

fn call_function(name: &str, x: f64) -> Result<f64, CalculatorError> {
    let value = match name {
        "sqrt" => x.sqrt(),
        "abs" => x.abs(),
        "exp" => x.exp(),
        "ln" | "log" => x.ln(),
        "log10" => x.log10(),
        "log2" => x.log2(),
        "sin" => x.sin(),
        "cos" => x.cos(),
        "tan" => x.tan(),
        "asin" => x.asin(),
        "acos" => x.acos(),
        "atan" => x.atan(),
        "floor" => x.floor(),
        "ceil" => x.ceil(),
        "round" => x.round_ties_even(),
        _ => return Err(CalculatorError::UnknownIdentifier(name.to_owned())),
    };
    Ok(value)
}

/// Arguments of [`CalculatorTool`].
#[derive(Deserialize, JsonSchema)]
pub struct CalculatorParameters {
    #[schemars(
        description = "The expression to evaluate, e.g. `2 * (3 + 4) ^ 2` or `sqrt(16) + sin(pi / 2)`."
    )]
    expression: String,
    #[schemars(
        description = "Decimal places to keep in the result, default to 10."
    )]
    precision: Option<usize>,
}

/// A tool that evaluates arithmetic expressions.
pub struct CalculatorTool {
    parameter_schema: Value,
}

impl CalculatorTool {
    /// Creates a new calculator tool.
    #[inline]
    pub fn new() -> Self {
        Self {
            parameter_schema: schema_for!(CalculatorParameters).to_value(),
        }
    }
}

impl Default for CalculatorTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for CalculatorTool {
    type Input = CalculatorParameters;

    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        r#"
Evaluates a mathematical expression and returns the numeric result.
Supports + - * / % ^, parentheses, the constants pi and e, and the functions
sqrt, abs, exp, ln, log, log10, log2, sin, cos, tan, asin, acos, atan, floor,
ceil and round."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let precision = input.precision.unwrap_or(DEFAULT_PRECISION);
        let result = evaluate(&input.expression)
            .map(|value| {
                format!("Result: {}", format_number(value, precision))
            })
            .map_err(|err| {
                let error = match err {
                    CalculatorError::DivisionByZero
                    | CalculatorError::NonFinite => ToolError::execution_error(),
                    _ => ToolError::invalid_input(),
                };
                error.with_reason(err.to_string())
            });
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tally_agent_core::tool::ErrorKind as ToolErrorKind;

    use super::*;

    fn eval(expr: &str) -> f64 {
        evaluate(expr).unwrap_or_else(|err| panic!("{expr}: {err}"))
    }

    fn assert_close(expr: &str, expected: f64) {
        let value = eval(expr);
        assert!((value - expected).abs() < 1e-12, "{expr} = {value}");
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3"), 7.0);
        assert_eq!(eval("(1 + 2) * 3"), 9.0);
        assert_eq!(eval("10 - 4 - 3"), 3.0);
        assert_eq!(eval("2 ^ 3 ^ 2"), 512.0);
        assert_eq!(eval("2 ** 10"), 1024.0);
        assert_eq!(eval("-2 ^ 2"), -4.0);
        assert_eq!(eval("2 ^ -1"), 0.5);
        assert_eq!(eval("--3"), 3.0);
        assert_eq!(eval("+4 * -2"), -8.0);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(eval("1.5e3"), 1500.0);
        assert_eq!(eval("2E-2"), 0.02);
        assert_eq!(eval(".5 + .25"), 0.75);
        // No implicit multiplication.
        assert!(matches!(
            evaluate("2e"),
            Err(CalculatorError::UnexpectedToken(_))
        ));
    }

    #[test]
    fn test_modulo_follows_divisor_sign() {
        assert_eq!(eval("7 % 3"), 1.0);
        assert_eq!(eval("-7 % 3"), 2.0);
        assert_eq!(eval("7 % -3"), -2.0);
    }

    #[test]
    fn test_functions_and_constants() {
        assert_eq!(eval("sqrt(16) + abs(-2)"), 6.0);
        assert_eq!(eval("floor(2.7) + ceil(2.1)"), 5.0);
        assert_eq!(eval("round(2.5)"), 2.0);
        assert_eq!(eval("round(3.5)"), 4.0);
        assert_close("log10(1000)", 3.0);
        assert_close("log2(8)", 3.0);
        assert_close("ln(e) + log(e)", 2.0);
        assert_close("SIN(PI / 2)", 1.0);
        assert_close("atan(1) * 4", consts::PI);
        assert_eq!(eval("cos(0)"), 1.0);
    }

    #[test]
    fn test_errors() {
        assert_eq!(evaluate(""), Err(CalculatorError::Empty));
        assert_eq!(evaluate("   "), Err(CalculatorError::Empty));
        assert_eq!(evaluate("1 / 0"), Err(CalculatorError::DivisionByZero));
        assert_eq!(evaluate("5 % 0"), Err(CalculatorError::DivisionByZero));
        assert_eq!(evaluate("sqrt(-1)"), Err(CalculatorError::NonFinite));
        assert_eq!(evaluate("10 ^ 400"), Err(CalculatorError::NonFinite));
        assert_eq!(
            evaluate("foo(1)"),
            Err(CalculatorError::UnknownIdentifier("foo".to_owned()))
        );
        assert_eq!(
            evaluate("x + 1"),
            Err(CalculatorError::UnknownIdentifier("x".to_owned()))
        );
        assert_eq!(evaluate("1 +"), Err(CalculatorError::UnexpectedEnd));
        assert_eq!(evaluate("(1 + 2"), Err(CalculatorError::UnexpectedEnd));
        assert_eq!(
            evaluate("1 + 2)"),
            Err(CalculatorError::UnexpectedToken(")".to_owned()))
        );
        assert_eq!(
            evaluate("2 $ 3"),
            Err(CalculatorError::UnexpectedChar('$', 2))
        );
        assert_eq!(
            evaluate("1..2"),
            Err(CalculatorError::UnexpectedToken("1..2".to_owned()))
        );
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(4.0, 10), "4");
        assert_eq!(format_number(0.1 + 0.2, 10), "0.3");
        assert_eq!(format_number(1.0 / 3.0, 4), "0.3333");
        assert_eq!(format_number(2.4, 0), "2");
        assert_eq!(format_number(-0.00001, 2), "0");
        assert_eq!(format_number(-1.5, 3), "-1.5");
        assert_eq!(format_number(1200.0, 2), "1200");
        assert_eq!(
            format_number(1.0 / 3.0, 70_000),
            format_number(1.0 / 3.0, 17)
        );
        assert_eq!(format_number(0.5, usize::MAX), "0.5");
    }

    #[test]
    fn test_nesting_limit() {
        let nested = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(eval(&nested), 1.0);
        assert_eq!(eval(&format!("{}1", "-".repeat(200))), 1.0);

        let deep =
            format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert_eq!(evaluate(&deep), Err(CalculatorError::TooDeep));
        assert_eq!(
            evaluate(&"(".repeat(100_000)),
            Err(CalculatorError::TooDeep)
        );
        assert_eq!(
            evaluate(&format!("{}1", "-".repeat(100_000))),
            Err(CalculatorError::TooDeep)
        );
        assert_eq!(
            evaluate(&format!("1{}", "^1".repeat(100_000))),
            Err(CalculatorError::TooDeep)
        );
        // Long flat expressions are fine.
        assert_eq!(eval(&format!("0{}", "+1".repeat(100_000))), 100_000.0);
    }

    #[tokio::test]
    async fn test_execute() {
        let tool = CalculatorTool::new();

        let input =
            serde_json::from_value(json!({ "expression": "2 * (3 + 4)" }))
                .unwrap();
        assert_eq!(tool.execute(input).await.unwrap(), "Result: 14");

        let input = serde_json::from_value(
            json!({ "expression": "pi", "precision": 3 }),
        )
        .unwrap();
        assert_eq!(tool.execute(input).await.unwrap(), "Result: 3.142");

        let input =
            serde_json::from_value(json!({ "expression": "1 / 0" })).unwrap();
        let err = tool.execute(input).await.unwrap_err();
        assert_eq!(err.reason(), "division by zero");

        let input = serde_json::from_value(
            json!({ "expression": "1 / 3", "precision": 70_000 }),
        )
        .unwrap();
        assert_eq!(
            tool.execute(input).await.unwrap(),
            "Result: 0.33333333333333331"
        );

        let input = serde_json::from_value(
            json!({ "expression": "(".repeat(100_000) }),
        )
        .unwrap();
        let err = tool.execute(input).await.unwrap_err();
        assert_eq!(err.kind(), ToolErrorKind::InvalidInput);
        assert_eq!(err.reason(), "expression is nested too deeply");
    }
}
