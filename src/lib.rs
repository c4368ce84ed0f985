//! # iNaturalist Photo Downloader Library
//!
//! Retrieves an authenticated user's iNaturalist observations, recovers the
//! original upload filename of every photo (a value the platform exposes only
//! to the uploading account via the authenticated photo page), and writes a
//! CSV manifest linking observation ids to filenames. Optionally downloads
//! the original-resolution images under deterministic names.
//!
//! ## How it works
//!
//! 1. The public observations API is paged to enumerate the user's
//!    observations ([`observations::ObservationEnumerator`]).
//! 2. Each photo's authenticated HTML page is scraped for the hidden
//!    filename ([`scrape::PhotoMetadataScraper`]).
//! 3. Rows are streamed to a CSV manifest ([`output::csv::CsvManifestWriter`])
//!    and images are optionally fetched ([`download::ImageDownloader`]).
//!
//! All network access goes through a single [`client::SessionClient`], which
//! attaches the session cookie, serializes requests through a shared
//! [`client::RateLimiter`], and retries transient failures with exponential
//! backoff. Execution is strictly sequential: iNaturalist penalizes bursty
//! access, so no two requests are ever in flight at once.
//!
//! ## Quick Start
//!
//! ```no_run
//! use inat_photo_downloader::client::SessionClient;
//! use inat_photo_downloader::observations::ObservationEnumerator;
//! use inat_photo_downloader::output::csv::CsvManifestWriter;
//! use inat_photo_downloader::pipeline::Pipeline;
//! use inat_photo_downloader::scrape::PhotoMetadataScraper;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(SessionClient::new("2f065b3aba346277da95bec21d559f3a")?);
//! let source = ObservationEnumerator::new(client.clone(), "some_user", Some(50));
//! let resolver = PhotoMetadataScraper::new(client.clone());
//! let writer = CsvManifestWriter::create("inaturalist_filenames.csv", false)?;
//!
//! let summary = Pipeline::new(source, resolver, writer).run().await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// CLI command implementations
pub mod cli;

/// Authenticated, rate-limited HTTP access
pub mod client;

/// Original-resolution image downloads
pub mod download;

/// Observation enumeration via the public API
pub mod observations;

/// Manifest output writers
pub mod output;

/// Run orchestration
pub mod pipeline;

/// Authenticated photo-page scraping
pub mod scrape;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

// Re-export commonly used types
pub use client::{ClientError, RateLimiter, SessionClient};
pub use pipeline::{Pipeline, RunSummary};

use crate::output::path::sanitize_filename;

/// One user-submitted sighting record with its ordered photos.
///
/// Constructed by the enumerator from a raw API entry and owned by the
/// pipeline for the duration of processing. Photo order is the platform's
/// reported order and is preserved into the manifest row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Platform-assigned observation identifier
    pub id: u64,
    /// Photos in the order the platform listed them
    pub photos: Vec<PhotoRef>,
}

/// A single photo attached to an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRef {
    /// Platform-assigned photo identifier
    pub photo_id: u64,
    /// The photo's page on the platform (what a browser would open)
    pub display_url: String,
    /// Direct URL of the original-resolution bytes, when derivable
    pub original_url: Option<String>,
    /// Original upload filename, set at most once after a successful scrape.
    /// Always a non-empty sanitized string free of path separators.
    pub original_filename: Option<String>,
}

impl PhotoRef {
    /// Record a scraped filename, sanitizing it for filesystem use.
    ///
    /// The first successful scrape wins; later calls and empty values are
    /// ignored. Returns whether the filename was actually set.
    pub fn resolve_filename(&mut self, raw: &str) -> bool {
        if self.original_filename.is_some() {
            return false;
        }
        let sanitized = sanitize_filename(raw);
        if sanitized.is_empty() {
            return false;
        }
        self.original_filename = Some(sanitized);
        true
    }
}
