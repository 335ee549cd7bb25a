//! Shared text helpers.

/// Truncates a string to at most `max` bytes on a char boundary.
pub fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        format!("{}... [truncated]", &s[..end])
    }
}

/// Keeps the last `max` bytes of a string, on a char boundary.
pub fn tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut start = s.len() - max;
        while !s.is_char_boundary(start) && start < s.len() {
            start += 1;
        }
        format!("[truncated] ...{}", &s[start..])
    }
}

/// Percent-encodes a name for use inside one path component.
///
/// Only `[A-Za-z0-9.~-]` survive unescaped, so `_` and `/` never appear in
/// the output and can be used to join encoded names.
pub fn escape_component(s: &str) -> String {
    urlencoding::encode(s).replace('_', "%5F")
}
