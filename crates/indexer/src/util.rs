//! Small helpers shared across modules

/// Maximum characters of external output carried into logs and errors
pub const SNIPPET_LEN: usize = 200;

/// Truncate `text` to at most [`SNIPPET_LEN`] characters for logging
pub fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(SNIPPET_LEN) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Trim a URL-like value, treating whitespace-only input as absent
pub fn non_empty_trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
