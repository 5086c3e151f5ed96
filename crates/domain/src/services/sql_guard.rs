//! Static safety checks for operator-supplied SQL fragments.
//!
//! This is a conservative filter, not a parser. A fragment passes only if it
//! looks like a single-table SELECT over a whitelisted table. Rules are checked
//! in a fixed order and the first violation is reported:
//!
//! 1. No forbidden keyword anywhere in the uppercased text (substring match).
//! 2. The trimmed text starts with `SELECT`.
//! 3. The first `FROM <identifier>` names a whitelisted table. A fragment whose
//!    `FROM` cannot be located passes this rule.
//! 4. Parentheses are balanced.
//!
//! Mapping queries must additionally run under a read-only transaction.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::models::TargetModule;

/// Keywords whose presence anywhere in a fragment rejects it.
///
/// Matching is by substring, so a column such as `updated_at` is rejected too.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "UPDATE", "INSERT", "ALTER", "CREATE", "TRUNCATE", "EXEC", "EXECUTE",
    "CALL", "GRANT", "REVOKE",
];

lazy_static! {
    static ref FROM_TABLE_REGEX: Regex =
        Regex::new(r"(?i)\bFROM\s+([a-zA-Z_][a-zA-Z0-9_.]*)").unwrap();
}

/// Why a fragment was rejected. The message is safe to show to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlRejection {
    #[error("Query contains forbidden keyword: {0}")]
    ForbiddenKeyword(&'static str),

    #[error("Only SELECT queries are allowed")]
    NotSelect,

    #[error("Table '{0}' is not allowed for this module")]
    TableNotAllowed(String),

    #[error("Unbalanced parentheses in query")]
    UnbalancedParentheses,
}

/// Validates a fragment against an explicit table whitelist.
///
/// An empty whitelist skips the table rule.
pub fn validate_sql(query: &str, allowed_tables: &[&str]) -> Result<(), SqlRejection> {
    let upper = query.to_uppercase();

    if let Some(keyword) = FORBIDDEN_KEYWORDS.iter().find(|k| upper.contains(*k)) {
        return Err(SqlRejection::ForbiddenKeyword(*keyword));
    }

    if !upper.trim_start().starts_with("SELECT") {
        return Err(SqlRejection::NotSelect);
    }

    if !allowed_tables.is_empty() {
        if let Some(table) = first_from_table(query) {
            if !allowed_tables.iter().any(|t| t.eq_ignore_ascii_case(table)) {
                return Err(SqlRejection::TableNotAllowed(table.to_string()));
            }
        }
    }

    let opening = query.chars().filter(|c| *c == '(').count();
    let closing = query.chars().filter(|c| *c == ')').count();
    if opening != closing {
        return Err(SqlRejection::UnbalancedParentheses);
    }

    Ok(())
}

/// Validates a fragment against a module's table whitelist.
pub fn validate_for_module(query: &str, module: TargetModule) -> Result<(), SqlRejection> {
    validate_sql(query, module.available_tables())
}

/// Identifier following the first `FROM`, if any.
pub fn first_from_table(query: &str) -> Option<&str> {
    FROM_TABLE_REGEX
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
