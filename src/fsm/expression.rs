//! Condition expressions evaluated against an execution context.
//!
//! Grammar:
//!
//! ```text
//! expression := field_path
//!             | field_path operator literal
//! field_path := segment ("." segment)*
//! ```
//!
//! Segments may only contain ASCII letters, digits, `_` and `-`, and segments
//! starting with `_` are rejected. Literals may be wrapped in single
//! or double quotes. Numeric-looking operands compare numerically, everything
//! else compares as strings.
//!
//! Missing data resolves asymmetrically:
//!
//! - a bare `field_path` whose leaf key is absent evaluates to `true`
//! - a comparison whose field is absent evaluates to `false`
//! - a missing or `null` parent segment evaluates to `false` in both forms

use super::error::ExpressionError;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a three-part expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Contains,
    MinLength,
    MaxLength,
}

impl FromStr for Operator {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" | "equals" => Ok(Self::Equals),
            "!=" | "not_equals" => Ok(Self::NotEquals),
            ">" | "greater_than" => Ok(Self::GreaterThan),
            "<" | "less_than" => Ok(Self::LessThan),
            ">=" | "greater_than_or_equal" => Ok(Self::GreaterOrEqual),
            "<=" | "less_than_or_equal" => Ok(Self::LessOrEqual),
            "contains" => Ok(Self::Contains),
            "min_length" => Ok(Self::MinLength),
            "max_length" => Ok(Self::MaxLength),
            other => Err(ExpressionError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
            Self::Contains => "contains",
            Self::MinLength => "min_length",
            Self::MaxLength => "max_length",
        };
        f.write_str(symbol)
    }
}

/// Parsed condition expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expression {
    pub path: Vec<String>,
    pub comparison: Option<(Operator, String)>,
}

enum Lookup<'a> {
    Found(&'a Value),
    MissingLeaf,
    MissingParent,
}

impl Expression {
    /// Evaluate against a context. Never fails; missing data follows the
    /// module-level rules.
    pub fn evaluate(&self, context: &Value) -> bool {
        let lookup = resolve(&self.path, context);
        match (&self.comparison, lookup) {
            (None, Lookup::Found(value)) => is_truthy(value),
            (None, Lookup::MissingLeaf) => true,
            (None, Lookup::MissingParent) => false,
            (Some(_), Lookup::Found(Value::Null)) => false,
            (Some((op, literal)), Lookup::Found(value)) => compare(value, *op, literal),
            (Some(_), Lookup::MissingLeaf | Lookup::MissingParent) => false,
        }
    }
}

/// Parse an expression, rejecting private (`_`-prefixed) path segments.
///
/// # Example
///
/// ```rust
/// use onex_engine::fsm::{parse_expression, Operator};
///
/// let expr = parse_expression("user.age >= 18").unwrap();
/// assert_eq!(expr.path, vec!["user", "age"]);
/// assert_eq!(expr.comparison, Some((Operator::GreaterOrEqual, "18".to_string())));
///
/// assert!(parse_expression("user.__class__ == x").is_err());
/// ```
pub fn parse_expression(expression: &str) -> Result<Expression, ExpressionError> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(ExpressionError::Empty);
    }

    let (field, rest) = split_token(expression);
    let path = parse_path(field, expression)?;
    if rest.is_empty() {
        return Ok(Expression {
            path,
            comparison: None,
        });
    }

    let (op, literal) = split_token(rest);
    if literal.is_empty() {
        return Err(ExpressionError::Malformed(expression.to_string()));
    }
    let op = op.parse::<Operator>()?;

    Ok(Expression {
        path,
        comparison: Some((op, unquote(literal).to_string())),
    })
}

/// Parse and evaluate in one step. Unparseable expressions are unmet.
pub fn evaluate_expression(expression: &str, context: &Value) -> bool {
    match parse_expression(expression) {
        Ok(parsed) => parsed.evaluate(context),
        Err(err) => {
            tracing::debug!(expression, error = %err, "rejecting condition expression");
            false
        }
    }
}

fn split_token(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn parse_path(field: &str, expression: &str) -> Result<Vec<String>, ExpressionError> {
    let mut path = Vec::new();
    for segment in field.split('.') {
        if segment.is_empty() {
            return Err(ExpressionError::EmptySegment(field.to_string()));
        }
        if segment.starts_with('_') {
            return Err(ExpressionError::PrivateField(field.to_string()));
        }
        // Catches operators written without surrounding spaces, e.g. `a>=1`.
        if !segment.chars().all(is_segment_char) {
            return Err(ExpressionError::Malformed(expression.to_string()));
        }
        path.push(segment.to_string());
    }
    Ok(path)
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn unquote(literal: &str) -> &str {
    let bytes = literal.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &literal[1..literal.len() - 1];
        }
    }
    literal
}

fn resolve<'a>(path: &[String], context: &'a Value) -> Lookup<'a> {
    let mut current = context;
    for (depth, segment) in path.iter().enumerate() {
        let is_leaf = depth + 1 == path.len();
        let next = match current {
            Value::Object(map) => map.get(segment),
            // A non-object root behaves like an empty context.
            _ if depth == 0 => None,
            _ => return Lookup::MissingParent,
        };
        match next {
            Some(value) => current = value,
            None if is_leaf => return Lookup::MissingLeaf,
            None => return Lookup::MissingParent,
        }
    }
    Lookup::Found(current)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}

fn compare(value: &Value, op: Operator, literal: &str) -> bool {
    match op {
        Operator::Contains => match value {
            Value::String(s) => s.contains(literal),
            Value::Array(items) => items.iter().any(|item| as_text(item) == literal),
            Value::Object(map) => map.contains_key(literal),
            _ => false,
        },
        Operator::MinLength | Operator::MaxLength => {
            let (Some(len), Ok(bound)) = (length_of(value), literal.parse::<usize>()) else {
                return false;
            };
            if op == Operator::MinLength {
                len >= bound
            } else {
                len <= bound
            }
        }
        _ => {
            let ordering = match (as_number(value), literal.trim().parse::<f64>()) {
                (Some(lhs), Ok(rhs)) => lhs.partial_cmp(&rhs),
                _ => Some(as_text(value).as_str().cmp(literal)),
            };
            let Some(ordering) = ordering else {
                return false;
            };
            match op {
                Operator::Equals => ordering == Ordering::Equal,
                Operator::NotEquals => ordering != Ordering::Equal,
                Operator::GreaterThan => ordering == Ordering::Greater,
                Operator::LessThan => ordering == Ordering::Less,
                Operator::GreaterOrEqual => ordering != Ordering::Less,
                Operator::LessOrEqual => ordering != Ordering::Greater,
                Operator::Contains | Operator::MinLength | Operator::MaxLength => false,
            }
        }
    }
}
