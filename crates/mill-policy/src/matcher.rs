//! Table path and column pattern matching
//!
//! Matching is case-as-given. A table pattern may end in `*` to cover every
//! table of a schema; column patterns are globs where `*` matches any run of
//! characters.

pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyMatcher;

impl PolicyMatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn matches_table<P, T>(&self, pattern: &[P], path: &[T]) -> bool
    where
        P: AsRef<str>,
        T: AsRef<str>,
    {
        if pattern.is_empty() || pattern.len() != path.len() {
            return false;
        }
        let last = pattern.len() - 1;
        pattern
            .iter()
            .zip(path)
            .enumerate()
            .all(|(i, (p, t))| p.as_ref() == t.as_ref() || (i == last && p.as_ref() == WILDCARD))
    }

    pub fn matches_column(&self, pattern: &str, column: &str) -> bool {
        if !pattern.contains('*') {
            return pattern == column;
        }
        glob_match(pattern, column)
    }

    pub fn matches_any_column<P: AsRef<str>>(&self, patterns: &[P], column: &str) -> bool {
        patterns.iter().any(|p| self.matches_column(p.as_ref(), column))
    }
}

/// Star-only glob; backtracks to the most recent `*` on mismatch
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
