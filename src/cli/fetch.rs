//! Fetch command implementation

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::client::SessionClient;
use crate::download::ImageDownloader;
use crate::observations::ObservationEnumerator;
use crate::output::csv::CsvManifestWriter;
use crate::pipeline::{Pipeline, RunSummary};
use crate::scrape::PhotoMetadataScraper;
use crate::shutdown::SharedShutdown;

use super::CliError;

/// Parse and validate the observation limit.
fn parse_limit(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if value == 0 {
        return Err("limit must be at least 1".to_string());
    }
    Ok(value)
}

/// Parse the manifest path, requiring a .csv extension so a typo cannot
/// silently clobber an unrelated file.
fn parse_output_path(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(path),
        _ => Err(format!("output path must end in .csv, got '{s}'")),
    }
}

/// iNaturalist Photo Downloader CLI
#[derive(Parser, Debug)]
#[command(name = "inat-photo-downloader")]
#[command(
    about = "Recover original upload filenames for an iNaturalist account's photos",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// iNaturalist username whose observations to enumerate
    #[arg(short, long)]
    pub username: String,

    /// Value of the _inaturalist_session browser cookie
    ///
    /// Log in to inaturalist.org in a browser and copy the cookie value from
    /// the developer tools. Filenames are only visible to the owning account.
    #[arg(short, long)]
    pub cookie: String,

    /// Stop after this many observations
    #[arg(short, long, value_parser = parse_limit)]
    pub limit: Option<usize>,

    /// Print one line per manifest row as it is written
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Enable debug-level logging
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Also download the original-resolution images
    #[arg(short, long, default_value_t = false)]
    pub download: bool,

    /// Directory for downloaded images (created on demand)
    #[arg(long, default_value = "images")]
    pub imagedir: PathBuf,

    /// Add photo_urls and original_photo_urls columns to the manifest
    #[arg(long, default_value_t = false)]
    pub add_photo_urls: bool,

    /// Manifest output path (overwritten if it exists)
    #[arg(
        short,
        long,
        default_value = "inaturalist_filenames.csv",
        value_parser = parse_output_path
    )]
    pub output: PathBuf,
}

/// Spinner shown while the pipeline works, one tick per observation.
fn progress_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} {pos} observations {msg}")
            .expect("static template is valid"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

impl Cli {
    /// Build the pipeline from the parsed arguments and run it.
    pub async fn execute(&self, shutdown: SharedShutdown) -> Result<RunSummary, CliError> {
        let client = Arc::new(SessionClient::new(&self.cookie)?);
        let source = ObservationEnumerator::new(client.clone(), self.username.as_str(), self.limit);
        let resolver = PhotoMetadataScraper::new(client.clone());
        let writer = CsvManifestWriter::create(&self.output, self.add_photo_urls)?;

        info!(
            "Fetching observations for {} into {}",
            self.username,
            self.output.display()
        );

        let pipeline = Pipeline::new(source, resolver, writer)
            .with_shutdown(shutdown)
            .with_verbose(self.verbose);
        // The spinner and per-row lines would fight over the terminal
        let pipeline = if self.verbose {
            pipeline
        } else {
            pipeline.with_progress(progress_spinner())
        };

        let summary = if self.download {
            let downloader = ImageDownloader::new(client.clone(), self.imagedir.clone());
            pipeline.with_downloader(downloader).run().await?
        } else {
            pipeline.run().await?
        };

        Ok(summary)
    }
}
