//! Run orchestration
//!
//! Composes the enumerator, scraper, downloader, and manifest sink into one
//! strictly sequential run. Per-photo failures are recorded and skipped; only
//! an authentication failure aborts the run, and even then every manifest row
//! flushed so far survives.

use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use crate::download::ImageFetcher;
use crate::observations::ObservationSource;
use crate::output::{ManifestRow, ManifestSink, OutputError};
use crate::scrape::{FilenameResolver, ScrapeOutcome};
use crate::shutdown::SharedShutdown;
use crate::Observation;

/// Pipeline errors. Anything that reaches this type aborts the run;
/// everything recoverable is folded into the [`RunSummary`] instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The session cookie was rejected. Retrying cannot help.
    #[error(
        "authentication failed: {0}. Log in to inaturalist.org and supply a fresh \
         _inaturalist_session cookie value"
    )]
    AuthenticationFailed(String),

    /// The manifest sink failed; nothing downstream can proceed without it.
    #[error("manifest output error: {0}")]
    Output(#[from] OutputError),
}

/// End-of-run accounting, printed so partial success is distinguishable
/// from total success.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Observations fully processed and written to the manifest
    pub observations_processed: u64,
    /// Photos encountered across all observations
    pub photos_seen: u64,
    /// Filenames successfully recovered
    pub filenames_recovered: u64,
    /// Photos whose page carried no filename marker
    pub filenames_unavailable: u64,
    /// Photos owned by a different account than the session's
    pub not_owner: u64,
    /// Photos skipped because their page fetch kept failing
    pub photos_skipped: u64,
    /// Images written to disk
    pub downloads_completed: u64,
    /// Image downloads that failed and were skipped
    pub downloads_failed: u64,
    /// Whether enumeration stopped early on a persistent (non-auth) failure
    pub enumeration_ended_early: bool,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Observations processed: {}", self.observations_processed)?;
        writeln!(f, "Photos seen:            {}", self.photos_seen)?;
        writeln!(f, "Filenames recovered:    {}", self.filenames_recovered)?;
        writeln!(f, "Filenames unavailable:  {}", self.filenames_unavailable)?;
        if self.not_owner > 0 {
            writeln!(f, "Not owned by account:   {}", self.not_owner)?;
        }
        if self.photos_skipped > 0 {
            writeln!(f, "Photos skipped:         {}", self.photos_skipped)?;
        }
        if self.downloads_completed > 0 || self.downloads_failed > 0 {
            writeln!(f, "Downloads completed:    {}", self.downloads_completed)?;
            writeln!(f, "Downloads failed:       {}", self.downloads_failed)?;
        }
        if self.enumeration_ended_early {
            writeln!(f, "Note: enumeration ended early on a network failure")?;
        }
        Ok(())
    }
}

/// Disabled downloader placeholder for pipelines built without `--download`.
pub struct NoDownloads;

#[async_trait::async_trait]
impl ImageFetcher for NoDownloads {
    async fn download(
        &self,
        _photo: &crate::PhotoRef,
        _observation_id: u64,
    ) -> Result<crate::download::DownloadRecord, crate::download::DownloadError> {
        Err(crate::download::DownloadError::MissingUrl)
    }
}

/// Sequential retrieval-and-enrichment pipeline.
pub struct Pipeline<S, R, W, D = NoDownloads>
where
    S: ObservationSource,
    R: FilenameResolver,
    W: ManifestSink,
    D: ImageFetcher,
{
    source: S,
    resolver: R,
    writer: W,
    downloader: Option<D>,
    shutdown: Option<SharedShutdown>,
    progress: Option<ProgressBar>,
    verbose: bool,
}

impl<S, R, W> Pipeline<S, R, W, NoDownloads>
where
    S: ObservationSource,
    R: FilenameResolver,
    W: ManifestSink,
{
    /// Create a pipeline without image downloads.
    pub fn new(source: S, resolver: R, writer: W) -> Self {
        Self {
            source,
            resolver,
            writer,
            downloader: None,
            shutdown: None,
            progress: None,
            verbose: false,
        }
    }
}

impl<S, R, W, D> Pipeline<S, R, W, D>
where
    S: ObservationSource,
    R: FilenameResolver,
    W: ManifestSink,
    D: ImageFetcher,
{
    /// Enable image downloads through the given fetcher.
    pub fn with_downloader<D2: ImageFetcher>(self, downloader: D2) -> Pipeline<S, R, W, D2> {
        Pipeline {
            source: self.source,
            resolver: self.resolver,
            writer: self.writer,
            downloader: Some(downloader),
            shutdown: self.shutdown,
            progress: self.progress,
            verbose: self.verbose,
        }
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Attach a progress indicator advanced once per observation.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Print one line per written manifest row.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run the pipeline to completion.
    ///
    /// The manifest sink is closed on every exit path, including the fatal
    /// abort path, so rows already written always survive.
    pub async fn run(mut self) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();
        let outcome = self.process(&mut summary).await;

        let Pipeline {
            writer, progress, ..
        } = self;
        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        match (outcome, writer.close()) {
            (Ok(()), Ok(())) => Ok(summary),
            (Ok(()), Err(close_err)) => Err(close_err.into()),
            (Err(run_err), close_result) => {
                if let Err(close_err) = close_result {
                    warn!("Failed to close manifest after abort: {}", close_err);
                }
                Err(run_err)
            }
        }
    }

    async fn process(&mut self, summary: &mut RunSummary) -> Result<(), PipelineError> {
        loop {
            // Graceful interrupt: stop only between observations, never
            // with a row half-built
            if let Some(shutdown) = &self.shutdown {
                if shutdown.is_shutdown_requested() {
                    info!("Shutdown requested - stopping after current observation");
                    break;
                }
            }

            let obs = match self.source.next_observation().await {
                Ok(Some(obs)) => obs,
                Ok(None) => break,
                Err(e) if e.is_fatal() => {
                    return Err(PipelineError::AuthenticationFailed(e.to_string()));
                }
                Err(e) => {
                    warn!("Observation enumeration failed, ending run early: {}", e);
                    summary.enumeration_ended_early = true;
                    break;
                }
            };

            self.process_observation(obs, summary).await?;
        }
        Ok(())
    }

    async fn process_observation(
        &mut self,
        mut obs: Observation,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        if let Some(pb) = &self.progress {
            pb.set_message(format!("observation {}", obs.id));
        }
        debug!("Processing observation {} ({} photos)", obs.id, obs.photos.len());

        for photo in &mut obs.photos {
            summary.photos_seen += 1;

            match self.resolver.resolve(photo.photo_id).await {
                Ok(ScrapeOutcome::Found(name)) => {
                    if photo.resolve_filename(&name) {
                        summary.filenames_recovered += 1;
                    } else {
                        // Sanitized to nothing, treat as unavailable
                        summary.filenames_unavailable += 1;
                    }
                }
                Ok(ScrapeOutcome::NotFound) => {
                    debug!("No filename marker on photo {}", photo.photo_id);
                    summary.filenames_unavailable += 1;
                }
                Ok(ScrapeOutcome::NotOwner) => {
                    debug!("Photo {} not owned by this session", photo.photo_id);
                    summary.not_owner += 1;
                }
                Err(e) if e.is_fatal() => {
                    return Err(PipelineError::AuthenticationFailed(e.to_string()));
                }
                Err(e) => {
                    warn!("Skipping photo {}: {}", photo.photo_id, e);
                    summary.photos_skipped += 1;
                }
            }

            // Download whenever an original URL exists, whether or not the
            // filename was recovered
            if let Some(downloader) = &self.downloader {
                if photo.original_url.is_some() {
                    match downloader.download(photo, obs.id).await {
                        Ok(record) => {
                            debug!(
                                "Downloaded {} ({} bytes)",
                                record.target_path.display(),
                                record.byte_length
                            );
                            summary.downloads_completed += 1;
                        }
                        Err(e) if e.is_fatal() => {
                            return Err(PipelineError::AuthenticationFailed(e.to_string()));
                        }
                        Err(e) => {
                            warn!("Download failed for photo {}: {}", photo.photo_id, e);
                            summary.downloads_failed += 1;
                        }
                    }
                }
            }
        }

        let row = ManifestRow::from_observation(&obs);
        self.writer.write_row(&row)?;
        summary.observations_processed += 1;

        if self.verbose {
            println!(
                "Observation {}: {}/{} filenames recovered",
                row.observation_id,
                row.recovered_count(),
                row.photo_filenames.len()
            );
        }
        if let Some(pb) = &self.progress {
            pb.inc(1);
        }
        Ok(())
    }
}
