//! Manifest output writers

use crate::Observation;

pub mod csv;
pub mod path;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// The externally visible projection of one observation: one row, with
/// multi-valued cells semicolon-joined in photo order. Every photo
/// contributes exactly one filename entry; unresolved filenames are empty
/// placeholders so the entry count always matches the photo count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRow {
    /// Observation identifier
    pub observation_id: String,
    /// One entry per photo, empty when the filename was not recovered
    pub photo_filenames: Vec<String>,
    /// Photo page URLs, same order
    pub photo_urls: Vec<String>,
    /// Original-resolution URLs, same order, empty entry when underivable
    pub original_photo_urls: Vec<String>,
}

impl ManifestRow {
    /// Project an observation into its manifest row.
    pub fn from_observation(obs: &Observation) -> Self {
        Self {
            observation_id: obs.id.to_string(),
            photo_filenames: obs
                .photos
                .iter()
                .map(|p| p.original_filename.clone().unwrap_or_default())
                .collect(),
            photo_urls: obs.photos.iter().map(|p| p.display_url.clone()).collect(),
            original_photo_urls: obs
                .photos
                .iter()
                .map(|p| p.original_url.clone().unwrap_or_default())
                .collect(),
        }
    }

    /// Number of filenames actually recovered (non-empty entries).
    pub fn recovered_count(&self) -> usize {
        self.photo_filenames.iter().filter(|f| !f.is_empty()).count()
    }
}

/// Streaming sink for manifest rows.
///
/// Rows must reach the sink incrementally so an interrupted run keeps
/// everything already processed.
pub trait ManifestSink {
    /// Append one row.
    fn write_row(&mut self, row: &ManifestRow) -> OutputResult<()>;

    /// Flush any buffered data to disk.
    fn flush(&mut self) -> OutputResult<()>;

    /// Close the sink and finalize output.
    fn close(self) -> OutputResult<()>;
}
