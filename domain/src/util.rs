//! Shared utility functions.

/// Shorten a string for log output without splitting a UTF-8 character.
///
/// Strings longer than `max_bytes` are cut at the closest preceding char
/// boundary and suffixed with `…`.
pub fn preview(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

/// Generate a fresh random identifier.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
