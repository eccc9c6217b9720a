//! Parsing of validator tool stdout
//!
//! The tool prints a message-of-the-day banner around its JSON output, so the
//! array is located by its closing bracket rather than parsed as a whole.

use serde::de::DeserializeOwned;

use super::CliToolError;

/// Substring of `stdout` from its start through the last `]`
pub fn extract_json_array(stdout: &str) -> Result<&str, CliToolError> {
    let end = stdout.rfind(']').ok_or(CliToolError::MissingJsonArray)?;
    Ok(&stdout[..=end])
}

/// Decode the JSON array embedded in tool output
///
/// Leading banner text is skipped by trying each `[` in order until one
/// decodes through the final `]`.
pub fn parse_json_array<T: DeserializeOwned>(stdout: &str) -> Result<Vec<T>, CliToolError> {
    let candidate = extract_json_array(stdout)?;

    let mut last_error = None;
    for (start, _) in candidate.match_indices('[') {
        match serde_json::from_str::<Vec<T>>(&candidate[start..]) {
            Ok(entries) => return Ok(entries),
            Err(e) => last_error = Some(e),
        }
    }

    match last_error {
        Some(e) => Err(CliToolError::Json(e)),
        None => Err(CliToolError::MissingJsonArray),
    }
}

/// Metadata pointer from `account:show` output
///
/// Returns `None` when the field is missing, empty or the literal `null`.
pub fn parse_metadata_url(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let (_, value) = line.split_once("metadataURL:")?;
        let value = value.trim();
        if value.is_empty() || value == "null" {
            None
        } else {
            Some(value.to_string())
        }
    })
}
