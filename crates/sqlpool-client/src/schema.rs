//! Detection of schema-changing statements.
//!
//! Detection looks only at the first keyword of the SQL text. Comments before
//! the keyword, multi-statement strings and dialect-specific DDL are not
//! recognised.

use once_cell::sync::Lazy;
use regex::Regex;

static SCHEMA_CHANGE_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?i)^\s*(?:ATTACH|DETACH|CREATE|DROP|ALTER)(?:[\s;(]|$)").unwrap()
});

/// Whether `sql` starts with a keyword that changes the database schema.
///
/// The leading keyword is matched case-insensitively after skipping
/// whitespace; it ends at whitespace, `;`, `(` or the end of the text.
#[must_use]
pub fn is_schema_changing(sql: &str) -> bool {
    SCHEMA_CHANGE_RE.is_match(sql)
}
