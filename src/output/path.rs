//! Filename sanitisation and image target path construction

use std::path::{Path, PathBuf};

use super::{OutputError, OutputResult};

/// Make a scraped filename safe for the local filesystem.
///
/// Keeps ASCII alphanumerics, `.`, `-` and `_`; every other character
/// (including path separators) becomes `_`. Surrounding whitespace is
/// dropped, so whitespace-only input sanitizes to the empty string.
pub fn sanitize_filename(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// File extension of a URL path, defaulting to `jpeg` when absent.
pub fn extension_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit('/').next().and_then(|name| name.rsplit_once('.')) {
        Some((_, ext)) if !ext.is_empty() && ext.len() <= 5 => ext,
        _ => "jpeg",
    }
}

/// Build the deterministic target path `{dir}/{observation_id}_{filename}`,
/// creating the directory if it does not exist yet.
pub fn build_image_path(
    dir: &Path,
    observation_id: u64,
    filename: &str,
) -> OutputResult<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| {
        OutputError::IoError(format!("failed to create image directory {dir:?}: {e}"))
    })?;
    Ok(dir.join(format!("{observation_id}_{filename}")))
}
