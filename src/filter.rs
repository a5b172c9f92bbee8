//! Small subset of the logging filter language, used by the file provider.
//!
//! `severity>=ERROR AND labels.service="api" AND textPayload:"timeout"`
//!
//! Clauses are joined by `AND`. `severity` compares by rank, `timestamp`
//! compares as instants, `insertId` and any other dot path compare as
//! strings. `:` is a case-insensitive substring test.

use std::cmp::Ordering;
use std::ops::Range;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::OperationError;
use crate::model::{LogRecord, Severity};
use crate::path::resolve;
use crate::timestamp;

static AND_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+AND\s+").unwrap_or_else(|e| panic!("AND splitter: {e}")));
static FIELD_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*$")
        .unwrap_or_else(|e| panic!("field path pattern: {e}"))
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
    Ne,
    Has,
}

impl Op {
    fn test(self, ord: Ordering) -> bool {
        match self {
            Op::Ge => ord != Ordering::Less,
            Op::Le => ord != Ordering::Greater,
            Op::Gt => ord == Ordering::Greater,
            Op::Lt => ord == Ordering::Less,
            Op::Eq | Op::Has => ord == Ordering::Equal,
            Op::Ne => ord != Ordering::Equal,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Severity(Severity),
    Timestamp(DateTime<Utc>),
    LogId(String),
    Field(String, String),
}

#[derive(Debug, Clone, PartialEq)]
struct Clause {
    op: Op,
    operand: Operand,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    /// An empty expression matches every record.
    pub fn parse(expr: &str) -> Result<Self, OperationError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Ok(Self::default());
        }
        let clauses = split_clauses(expr)
            .into_iter()
            .map(parse_clause)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { clauses })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, record: &LogRecord) -> bool {
        if self.clauses.is_empty() {
            return true;
        }
        let needs_view = self
            .clauses
            .iter()
            .any(|c| matches!(c.operand, Operand::Field(..)));
        let view = if needs_view { record.to_value() } else { Value::Null };
        self.clauses.iter().all(|c| c.matches(record, &view))
    }
}

impl Clause {
    fn matches(&self, record: &LogRecord, view: &Value) -> bool {
        match &self.operand {
            Operand::Severity(rhs) => self.op.test(record.severity().cmp(rhs)),
            Operand::Timestamp(rhs) => record
                .timestamp_value()
                .and_then(timestamp::parse_value)
                .map(|lhs| self.op.test(lhs.cmp(rhs)))
                .unwrap_or(false),
            Operand::LogId(rhs) => record
                .log_id()
                .map(|lhs| self.compare_text(lhs, rhs))
                .unwrap_or(false),
            Operand::Field(path, rhs) => match resolve(view, path) {
                Some(Value::String(lhs)) => self.compare_text(lhs, rhs),
                Some(Value::Null) | None => false,
                Some(other) => self.compare_text(&other.to_string(), rhs),
            },
        }
    }

    fn compare_text(&self, lhs: &str, rhs: &str) -> bool {
        if self.op == Op::Has {
            return lhs.to_lowercase().contains(&rhs.to_lowercase());
        }
        self.op.test(lhs.cmp(rhs))
    }
}

/// Splits on `AND` separators that sit outside double-quoted values.
fn split_clauses(expr: &str) -> Vec<&str> {
    let quoted = quoted_spans(expr);
    let mut clauses = Vec::new();
    let mut start = 0;
    for sep in AND_SPLIT.find_iter(expr) {
        if quoted.iter().any(|span| span.contains(&sep.start())) {
            continue;
        }
        clauses.push(&expr[start..sep.start()]);
        start = sep.end();
    }
    clauses.push(&expr[start..]);
    clauses
}

/// Byte ranges from an opening quote up to its closing quote. An
/// unterminated quote runs to the end of the input.
fn quoted_spans(expr: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut open = None;
    let mut escaped = false;
    for (i, c) in expr.char_indices() {
        match (c, open) {
            (_, Some(_)) if escaped => escaped = false,
            ('\\', Some(_)) => escaped = true,
            ('"', Some(from)) => {
                spans.push(from..i);
                open = None;
            }
            ('"', None) => open = Some(i),
            _ => {}
        }
    }
    if let Some(from) = open {
        spans.push(from..expr.len());
    }
    spans
}

fn parse_clause(raw: &str) -> Result<Clause, OperationError> {
    let raw = raw.trim();
    let (at, op, width) = find_operator(raw)
        .ok_or_else(|| OperationError::invalid_argument(format!("no operator in filter clause: {raw}")))?;
    let path = raw[..at].trim();
    let value = unquote(raw[at + width..].trim());

    if !FIELD_PATH.is_match(path) {
        return Err(OperationError::invalid_argument(format!(
            "invalid field in filter clause: {raw}"
        )));
    }
    let value = value.ok_or_else(|| {
        OperationError::invalid_argument(format!("missing value in filter clause: {raw}"))
    })?;

    let operand = match path {
        "severity" => {
            let parsed = Severity::from_name(&value)
                .or_else(|| value.parse::<i64>().ok().and_then(Severity::from_code))
                .ok_or_else(|| {
                    OperationError::invalid_argument(format!("unknown severity: {value}"))
                })?;
            Operand::Severity(parsed)
        }
        "timestamp" => {
            let parsed = timestamp::parse_str(&value).ok_or_else(|| {
                OperationError::invalid_argument(format!("invalid timestamp: {value}"))
            })?;
            Operand::Timestamp(parsed)
        }
        "insertId" => Operand::LogId(value),
        _ => Operand::Field(path.to_string(), value),
    };
    Ok(Clause { op, operand })
}

/// First operator outside of a quoted value; two-character forms win.
fn find_operator(raw: &str) -> Option<(usize, Op, usize)> {
    for (i, c) in raw.char_indices() {
        if c == '"' {
            return None;
        }
        let rest = &raw[i..];
        let two = [(">=", Op::Ge), ("<=", Op::Le), ("!=", Op::Ne)]
            .into_iter()
            .find(|(tok, _)| rest.starts_with(tok));
        if let Some((_, op)) = two {
            return Some((i, op, 2));
        }
        let one = match c {
            '>' => Some(Op::Gt),
            '<' => Some(Op::Lt),
            '=' => Some(Op::Eq),
            ':' => Some(Op::Has),
            _ => None,
        };
        if let Some(op) = one {
            return Some((i, op, 1));
        }
    }
    None
}

/// Strips one pair of double quotes. Bare values must be non-empty.
fn unquote(value: &str) -> Option<String> {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        return Some(value[1..value.len() - 1].replace("\\\"", "\""));
    }
    if value.is_empty() || value.contains('"') {
        return None;
    }
    Some(value.to_string())
}
