//! Best-effort output column extraction for SELECT fragments.
//!
//! An empty result means the columns are unknown, not that there are none.
//! Callers fall back to a bounded trial execution in that case.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ALIASED_REGEX: Regex =
        Regex::new(r#"(?is)^.+?\s+AS\s+"?([A-Za-z_][A-Za-z0-9_]*)"?$"#).unwrap();
    static ref COLUMN_REGEX: Regex =
        Regex::new(r#"^(?:"?[A-Za-z_][A-Za-z0-9_]*"?\.)?"?([A-Za-z_][A-Za-z0-9_]*)"?$"#).unwrap();
    static ref STAR_REGEX: Regex = Regex::new(r"^(?:[A-Za-z_][A-Za-z0-9_]*\.)?\*$").unwrap();
}

/// Extracts output column names from a validated SELECT.
///
/// The select list runs from `SELECT` to the first `FROM` outside parentheses
/// and is split on top-level commas. An `AS alias` wins over the column name,
/// a `table.` qualifier is dropped and `*` entries are skipped. Any unaliased
/// expression that is not a plain column makes the whole result unknown.
pub fn extract_columns(query: &str) -> Vec<String> {
    let Some(select_list) = select_list(query) else {
        return Vec::new();
    };

    let mut columns = Vec::new();
    for part in split_top_level(select_list) {
        let part = part.trim();
        if part.is_empty() {
            return Vec::new();
        }
        if STAR_REGEX.is_match(part) {
            continue;
        }
        if let Some(caps) = ALIASED_REGEX.captures(part) {
            columns.push(caps[1].to_string());
        } else if let Some(caps) = COLUMN_REGEX.captures(part) {
            columns.push(caps[1].to_string());
        } else {
            return Vec::new();
        }
    }
    columns
}

/// Text between the leading `SELECT` (and an optional `DISTINCT`) and the first top-level `FROM`.
fn select_list(query: &str) -> Option<&str> {
    let trimmed = query.trim();
    let head = trimmed.get(..6)?;
    if !head.eq_ignore_ascii_case("SELECT") {
        return None;
    }
    let mut rest = &trimmed[6..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    rest = rest.trim_start();
    if let (Some(word), Some(tail)) = (rest.get(..8), rest.get(8..)) {
        if word.eq_ignore_ascii_case("DISTINCT") && tail.starts_with(char::is_whitespace) {
            rest = tail.trim_start();
        }
    }

    let end = top_level_from(rest).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Byte offset of the first `FROM` keyword at parenthesis depth zero.
fn top_level_from(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut quoted = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' => quoted = !quoted,
            b'(' if !quoted => depth += 1,
            b')' if !quoted => depth -= 1,
            b'f' | b'F' if !quoted && depth == 0 => {
                let is_word = text
                    .get(i..i + 4)
                    .map_or(false, |w| w.eq_ignore_ascii_case("FROM"));
                let before_ok = i == 0 || !is_ident_byte(bytes[i - 1]);
                let after_ok = bytes.get(i + 4).map_or(true, |c| !is_ident_byte(*c));
                if is_word && before_ok && after_ok {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Splits on commas outside parentheses and string literals.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth -= 1,
            ',' if !quoted && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}
