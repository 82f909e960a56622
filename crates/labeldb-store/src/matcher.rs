// crates/labeldb-store/src/matcher.rs
// ============================================================================
// Module: Matcher Compiler
// Description: Translate Prometheus label matchers into SQL predicates.
// Purpose: Bind matcher semantics to identity columns and dimension JSON.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! A matcher is a `(name, op, value)` triple. Compilation maps reserved
//! names onto identity columns, everything else onto a JSON extraction from
//! the dimensions object (absent dimensions compare as the empty string),
//! and the four operators onto `=`, `!=`, `REGEXP`, and `NOT REGEXP`.
//!
//! Exactly one `Namespace` equality matcher with a non-empty value is a hard
//! precondition: the lifetime index is per-namespace, so the namespace drives
//! table selection.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::types::Value;

use crate::error::StoreError;

// ============================================================================
// SECTION: Matcher Types
// ============================================================================

/// Matcher operators in Prometheus selector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    /// `=` exact equality.
    Eq,
    /// `!=` exact inequality.
    Neq,
    /// `=~` regular-expression match (PCRE semantics).
    Re,
    /// `!~` negated regular-expression match.
    NotRe,
}

/// One label matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMatcher {
    /// Label name the matcher applies to.
    pub name: String,
    /// Matcher operator.
    pub op: MatchOp,
    /// Literal value or regular-expression pattern.
    pub value: String,
}

impl LabelMatcher {
    /// Builds a matcher.
    #[must_use]
    pub fn new(name: impl Into<String>, op: MatchOp, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op,
            value: value.into(),
        }
    }
}

// ============================================================================
// SECTION: Compilation
// ============================================================================

/// Compiled predicate fragments with their bound arguments.
#[derive(Debug)]
pub(crate) struct CompiledMatchers {
    /// One `<expr> <op> ?` fragment per matcher, in input order.
    pub(crate) predicates: Vec<String>,
    /// Bound argument per fragment, in the same order.
    pub(crate) args: Vec<Value>,
    /// Namespace extracted from the required equality matcher.
    pub(crate) namespace: String,
}

/// Compiles matchers into predicate fragments over the identity columns.
///
/// # Errors
///
/// Returns [`StoreError::MissingNamespace`] unless exactly one `Namespace`
/// equality matcher with a non-empty value is present, and
/// [`StoreError::InvalidLabelName`] for dimension names outside the
/// Prometheus label charset.
pub(crate) fn compile(matchers: &[LabelMatcher]) -> Result<CompiledMatchers, StoreError> {
    let mut predicates = Vec::with_capacity(matchers.len());
    let mut args = Vec::with_capacity(matchers.len());
    let mut namespace: Option<String> = None;

    for m in matchers {
        if m.name == "Namespace" && m.op == MatchOp::Eq && !m.value.is_empty() {
            if namespace.replace(m.value.clone()).is_some() {
                return Err(StoreError::MissingNamespace);
            }
        }
        let expr = match m.name.as_str() {
            "Namespace" => "m.namespace".to_owned(),
            "__name__" | "MetricName" => "m.metric_name".to_owned(),
            "Region" => "m.region".to_owned(),
            other => {
                // Dimension names are interpolated into the JSON path, so
                // they must stay within the selector label charset.
                if !is_valid_label_name(other) {
                    return Err(StoreError::InvalidLabelName(other.to_owned()));
                }
                format!("IFNULL(m.dimensions->>'$.{other}', '')")
            }
        };
        let op = match m.op {
            MatchOp::Eq => "=",
            MatchOp::Neq => "!=",
            MatchOp::Re => "REGEXP",
            MatchOp::NotRe => "NOT REGEXP",
        };
        predicates.push(format!("{expr} {op} ?"));
        args.push(Value::Text(m.value.clone()));
    }

    let namespace = namespace.ok_or(StoreError::MissingNamespace)?;
    Ok(CompiledMatchers {
        predicates,
        args,
        namespace,
    })
}

/// Returns true for names matching `[a-zA-Z_][a-zA-Z0-9_]*`.
fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// SECTION: Tests
// ============================================================================
