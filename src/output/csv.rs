//! CSV manifest writer implementation

use csv::Writer;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info};

use super::{ManifestRow, ManifestSink, OutputError, OutputResult};

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// Streaming CSV writer for manifest rows.
///
/// The header is fixed at open time: `observation_id,photo_filenames`, plus
/// `photo_urls,original_photo_urls` when URL columns were requested. Each
/// row is flushed as it is written so an interrupted run loses nothing
/// already processed. Creating the writer truncates any existing file —
/// a re-run overwrites the manifest from scratch.
pub struct CsvManifestWriter {
    writer: Writer<BufWriter<File>>,
    include_urls: bool,
    rows_written: u64,
}

impl CsvManifestWriter {
    /// Create a manifest writer at `path`.
    ///
    /// # Arguments
    /// * `path` - Output file path (truncated if it exists)
    /// * `include_urls` - Whether to emit the two URL columns
    pub fn create<P: AsRef<Path>>(path: P, include_urls: bool) -> OutputResult<Self> {
        let path = path.as_ref();
        info!("Creating manifest writer: path={}", path.display());

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    OutputError::IoError(format!("failed to create directory: {e}"))
                })?;
            }
        }

        let file = File::create(path)
            .map_err(|e| OutputError::IoError(format!("failed to create file: {e}")))?;
        let buf_writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file);
        let mut writer = Writer::from_writer(buf_writer);

        let mut header = vec!["observation_id", "photo_filenames"];
        if include_urls {
            header.push("photo_urls");
            header.push("original_photo_urls");
        }
        writer
            .write_record(&header)
            .map_err(|e| OutputError::CsvError(format!("failed to write header: {e}")))?;

        Ok(Self {
            writer,
            include_urls,
            rows_written: 0,
        })
    }

    /// Number of data rows written so far.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

impl ManifestSink for CsvManifestWriter {
    fn write_row(&mut self, row: &ManifestRow) -> OutputResult<()> {
        let mut record = vec![row.observation_id.clone(), row.photo_filenames.join(";")];
        if self.include_urls {
            record.push(row.photo_urls.join(";"));
            record.push(row.original_photo_urls.join(";"));
        }

        self.writer
            .write_record(&record)
            .map_err(|e| OutputError::CsvError(format!("failed to write row: {e}")))?;
        self.rows_written += 1;

        // Each row must survive an interrupt of the run
        self.flush()?;
        debug!("Manifest row {} written", self.rows_written);
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("failed to flush: {e}")))
    }

    fn close(mut self) -> OutputResult<()> {
        debug!("Closing manifest writer: {} rows written", self.rows_written);

        self.flush()?;

        let buf_writer = self
            .writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("failed to get inner writer: {e}")))?;
        let file = buf_writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("failed to get file handle: {e}")))?;
        file.sync_all()
            .map_err(|e| OutputError::IoError(format!("failed to sync file: {e}")))?;

        info!("Manifest writer closed: {} rows written", self.rows_written);
        Ok(())
    }
}
