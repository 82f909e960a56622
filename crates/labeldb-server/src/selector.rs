// crates/labeldb-server/src/selector.rs
// ============================================================================
// Module: Selector Parser
// Description: Prometheus series selector parsing for match[] parameters.
// Purpose: Turn selector strings into label matchers for the query engine.
// Dependencies: labeldb-store
// ============================================================================

//! ## Overview
//! Parses the series-API subset of the Prometheus selector grammar:
//!
//! ```text
//! metric_name
//! metric_name{label="v", other=~"re"}
//! {label!="v", other!~"re"}
//! ```
//!
//! A bare metric name becomes an equality matcher on `__name__`. Values are
//! double-quoted with `\\`, `\"`, `\n`, and `\t` escapes. Label names follow
//! `[a-zA-Z_][a-zA-Z0-9_]*`; metric names additionally allow colons. Parse
//! failures carry a position for the HTTP 400 body.

// ============================================================================
// SECTION: Imports
// ============================================================================

use labeldb_store::LabelMatcher;
use labeldb_store::MatchOp;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Selector parse failure with a byte position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorError {
    /// Byte offset the failure was detected at.
    pub position: usize,
    /// Human-readable description.
    pub message: String,
}

impl std::fmt::Display for SelectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at position {}", self.message, self.position)
    }
}

impl std::error::Error for SelectorError {}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Parses one selector into label matchers.
///
/// # Errors
///
/// Returns [`SelectorError`] for grammar violations; an empty matcher set
/// (e.g. `{}`) is not itself an error and fails later at the query engine's
/// namespace check.
pub fn parse_selector(input: &str) -> Result<Vec<LabelMatcher>, SelectorError> {
    Parser::new(input).parse()
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<Vec<LabelMatcher>, SelectorError> {
        let mut matchers = Vec::new();
        self.skip_whitespace();

        let name = self.take_metric_name();
        let has_name = !name.is_empty();
        if has_name {
            matchers.push(LabelMatcher::new("__name__", MatchOp::Eq, name));
        }

        self.skip_whitespace();
        if self.peek() == Some(b'{') {
            self.pos += 1;
            self.parse_matcher_list(&mut matchers)?;
        } else if !has_name {
            return Err(self.error("expected metric name or '{'"));
        }

        self.skip_whitespace();
        if self.pos != self.bytes.len() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(matchers)
    }

    fn parse_matcher_list(
        &mut self,
        matchers: &mut Vec<LabelMatcher>,
    ) -> Result<(), SelectorError> {
        loop {
            self.skip_whitespace();
            if self.peek() == Some(b'}') {
                self.pos += 1;
                return Ok(());
            }

            let label = self.take_label_name();
            if label.is_empty() {
                return Err(self.error("expected label name"));
            }
            self.skip_whitespace();
            let op = self.take_op()?;
            self.skip_whitespace();
            let value = self.take_quoted_string()?;
            matchers.push(LabelMatcher::new(label, op, value));

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                }
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn take_metric_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let c = c as char;
            let legal_start = c.is_ascii_alphabetic() || c == '_' || c == ':';
            let legal = legal_start || c.is_ascii_digit();
            if (self.pos == start && !legal_start) || !legal {
                break;
            }
            self.pos += 1;
        }
        self.input[start..self.pos].to_owned()
    }

    fn take_label_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let c = c as char;
            let legal_start = c.is_ascii_alphabetic() || c == '_';
            let legal = legal_start || c.is_ascii_digit();
            if (self.pos == start && !legal_start) || !legal {
                break;
            }
            self.pos += 1;
        }
        self.input[start..self.pos].to_owned()
    }

    fn take_op(&mut self) -> Result<MatchOp, SelectorError> {
        match (self.peek(), self.peek_at(1)) {
            (Some(b'='), Some(b'~')) => {
                self.pos += 2;
                Ok(MatchOp::Re)
            }
            (Some(b'='), _) => {
                self.pos += 1;
                Ok(MatchOp::Eq)
            }
            (Some(b'!'), Some(b'=')) => {
                self.pos += 2;
                Ok(MatchOp::Neq)
            }
            (Some(b'!'), Some(b'~')) => {
                self.pos += 2;
                Ok(MatchOp::NotRe)
            }
            _ => Err(self.error("expected one of '=', '!=', '=~', '!~'")),
        }
    }

    fn take_quoted_string(&mut self) -> Result<String, SelectorError> {
        if self.peek() != Some(b'"') {
            return Err(self.error("expected '\"'"));
        }
        self.pos += 1;
        let mut value = String::new();
        loop {
            let rest = &self.input[self.pos..];
            let mut chars = rest.chars();
            match chars.next() {
                None => return Err(self.error("unterminated string")),
                Some('"') => {
                    self.pos += 1;
                    return Ok(value);
                }
                Some('\\') => match chars.next() {
                    Some('\\') => {
                        value.push('\\');
                        self.pos += 2;
                    }
                    Some('"') => {
                        value.push('"');
                        self.pos += 2;
                    }
                    Some('n') => {
                        value.push('\n');
                        self.pos += 2;
                    }
                    Some('t') => {
                        value.push('\t');
                        self.pos += 2;
                    }
                    _ => return Err(self.error("invalid escape sequence")),
                },
                Some(c) => {
                    value.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn error(&self, message: &str) -> SelectorError {
        SelectorError {
            position: self.pos,
            message: message.to_owned(),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_metric_name_becomes_name_matcher() {
        let matchers = parse_selector("cpu_usage:rate").unwrap();
        assert_eq!(
            matchers,
            vec![LabelMatcher::new("__name__", MatchOp::Eq, "cpu_usage:rate")]
        );
    }

    #[test]
    fn name_with_matcher_list() {
        let matchers = parse_selector(r#"cpu{Namespace="AWS/EC2", Region=~"us-.*"}"#).unwrap();
        assert_eq!(
            matchers,
            vec![
                LabelMatcher::new("__name__", MatchOp::Eq, "cpu"),
                LabelMatcher::new("Namespace", MatchOp::Eq, "AWS/EC2"),
                LabelMatcher::new("Region", MatchOp::Re, "us-.*"),
            ]
        );
    }

    #[test]
    fn all_four_operators() {
        let matchers =
            parse_selector(r#"{a="1", b!="2", c=~"3", d!~"4"}"#).unwrap();
        let ops: Vec<MatchOp> = matchers.iter().map(|m| m.op).collect();
        assert_eq!(ops, vec![MatchOp::Eq, MatchOp::Neq, MatchOp::Re, MatchOp::NotRe]);
    }

    #[test]
    fn trailing_comma_is_accepted() {
        let matchers = parse_selector(r#"{Namespace="test",}"#).unwrap();
        assert_eq!(matchers.len(), 1);
    }

    #[test]
    fn escapes_in_values() {
        let matchers = parse_selector(r#"{a="with \"quotes\" and \\ and \n"}"#).unwrap();
        assert_eq!(matchers[0].value, "with \"quotes\" and \\ and \n");
    }

    #[test]
    fn empty_matcher_list_is_allowed() {
        // The namespace requirement is enforced by the query engine, not the
        // grammar.
        assert_eq!(parse_selector("cpu{}").unwrap().len(), 1);
        assert!(parse_selector("{}").unwrap().is_empty());
    }

    #[test]
    fn parse_failures() {
        for bad in [
            "",
            "   ",
            "{a=}",
            "{a=\"v\"",
            "{a~\"v\"}",
            "{1a=\"v\"}",
            "cpu{a=\"v\"} trailing",
            "{a=\"unterminated}",
            "{a=\"bad \\q escape\"}",
            "-cpu",
        ] {
            assert!(parse_selector(bad).is_err(), "expected failure for {bad:?}");
        }
    }

    #[test]
    fn whitespace_is_tolerated() {
        let matchers = parse_selector(r#"  cpu  {  Namespace  =  "test"  }  "#).unwrap();
        assert_eq!(matchers.len(), 2);
    }
}
