//! Composite resource ids.
//!
//! Child resources are addressed by joining their parent ids with `/`:
//! a pipeline property is `<pipeline_id>/<name>`, a trigger property is
//! `<pipeline_id>/<trigger_id>/<name>`.

use crate::error::ProviderError;

/// Separator between id components.
pub const ID_SEPARATOR: char = '/';

/// Join id components with `/`.
pub fn join_id(parts: &[&str]) -> String {
    parts.join("/")
}

/// Split a composite id into exactly `expected` non-empty components.
///
/// The last component keeps any further separators, so property names that
/// contain `/` survive a round trip.
pub fn split_id(id: &str, expected: usize) -> Result<Vec<String>, ProviderError> {
    let parts: Vec<String> = id.splitn(expected, ID_SEPARATOR).map(str::to_string).collect();

    if parts.len() != expected || parts.iter().any(String::is_empty) {
        return Err(ProviderError::InvalidId(format!(
            "'{}' does not have the form {}",
            id,
            vec!["<part>"; expected].join("/")
        )));
    }

    Ok(parts)
}
