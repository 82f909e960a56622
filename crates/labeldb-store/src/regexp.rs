// crates/labeldb-store/src/regexp.rs
// ============================================================================
// Module: REGEXP Extension
// Description: PCRE-class REGEXP operator for partition connections.
// Purpose: Let compiled matchers emit REGEXP / NOT REGEXP predicates.
// Dependencies: fancy-regex, rusqlite
// ============================================================================

//! ## Overview
//! SQLite parses `expr REGEXP pattern` but ships no implementation; this
//! module registers a two-argument `regexp(pattern, text)` scalar function on
//! a connection so the operator works. Patterns follow PCRE semantics via a
//! backtracking engine, intentionally diverging from Prometheus's RE2-class
//! matchers (documented compatibility break). Compiled patterns are cached as
//! statement auxiliary data, so a query re-evaluating one pattern across many
//! rows compiles it once. Invalid patterns surface as query errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use fancy_regex::Regex;
use rusqlite::Connection;
use rusqlite::Error;
use rusqlite::functions::FunctionFlags;

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers the `regexp` scalar function on `conn`.
///
/// # Errors
///
/// Returns the underlying [`rusqlite::Error`] when registration fails.
pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |ctx| {
            let pattern: Arc<Regex> = ctx.get_or_create_aux(
                0,
                |vr| -> Result<_, Box<dyn std::error::Error + Send + Sync + 'static>> {
                    Ok(Regex::new(vr.as_str()?)?)
                },
            )?;
            let text = ctx
                .get_raw(1)
                .as_str()
                .map_err(|e| Error::UserFunctionError(e.into()))?;
            pattern
                .is_match(text)
                .map_err(|e| Error::UserFunctionError(e.into()))
        },
    )
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();
        conn
    }

    fn eval(conn: &Connection, sql: &str) -> bool {
        conn.query_row(sql, [], |row| row.get::<_, bool>(0)).unwrap()
    }

    #[test]
    fn regexp_operator_matches() {
        let c = conn();
        assert!(eval(&c, "SELECT 'dim_value1' REGEXP '^dim_.*$'"));
        assert!(!eval(&c, "SELECT 'other' REGEXP '^dim_.*$'"));
    }

    #[test]
    fn not_regexp_is_the_negation() {
        let c = conn();
        assert!(eval(&c, "SELECT 'other' NOT REGEXP '^dim_.*$'"));
        assert!(!eval(&c, "SELECT 'dim_value1' NOT REGEXP '^dim_.*$'"));
    }

    #[test]
    fn backreferences_are_supported() {
        // Backreferences are a PCRE-class feature RE2 rejects outright.
        let c = conn();
        assert!(eval(&c, r"SELECT 'abcabc' REGEXP '^(abc)\1$'"));
        assert!(!eval(&c, r"SELECT 'abcxyz' REGEXP '^(abc)\1$'"));
    }

    #[test]
    fn invalid_pattern_is_a_query_error() {
        let c = conn();
        let result = c.query_row("SELECT 'x' REGEXP '('", [], |row| row.get::<_, bool>(0));
        assert!(result.is_err());
    }
}
