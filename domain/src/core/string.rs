//! String utilities for the domain layer.
//!
//! All limits are counted in characters, not bytes, so that truncation never
//! splits a UTF-8 sequence.

/// Truncate a string to at most `max_chars` characters, ending with `...`
/// when anything was cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(&"..."[..max_chars.min(3)]);
    out
}

/// Hard-truncate a string to at most `max_chars` characters (no marker).
pub fn clip(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// Collapse whitespace runs into single spaces (for one-line previews).
pub fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
