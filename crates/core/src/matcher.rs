//! Item lookup against the store's free-text business key.
//!
//! Queries without an explicit `%` wildcard become prefix searches; every
//! engine action then branches on the 0/1/N cardinality of the result.

use crate::domain::deadline::Deadline;

/// Append a trailing `%` unless the caller already supplied a wildcard.
pub fn normalize_query(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.contains('%') {
        trimmed.to_string()
    } else {
        format!("{trimmed}%")
    }
}

/// Case-insensitive `LIKE`-style match supporting `%` wildcards. Shared by
/// the in-memory store so its behavior mirrors the SQL adapter.
pub fn like_match(text: &str, pattern: &str) -> bool {
    like_bytes(text.to_ascii_lowercase().as_bytes(), pattern.to_ascii_lowercase().as_bytes())
}

fn like_bytes(text: &[u8], pattern: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'%', rest)) => (0..=text.len()).any(|skip| like_bytes(&text[skip..], rest)),
        Some((expected, rest)) => {
            text.split_first().is_some_and(|(ch, tail)| ch == expected && like_bytes(tail, rest))
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchOutcome {
    None,
    One(Deadline),
    Many(Vec<Deadline>),
}

impl MatchOutcome {
    pub fn classify(mut rows: Vec<Deadline>) -> Self {
        match rows.len() {
            0 => Self::None,
            1 => Self::One(rows.remove(0)),
            _ => Self::Many(rows),
        }
    }
}
