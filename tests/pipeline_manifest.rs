//! End-to-end pipeline tests over the public API: in-memory observation and
//! filename sources feeding the real CSV manifest writer.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use tempfile::TempDir;

use inat_photo_downloader::client::ClientResult;
use inat_photo_downloader::observations::ObservationSource;
use inat_photo_downloader::output::csv::CsvManifestWriter;
use inat_photo_downloader::pipeline::Pipeline;
use inat_photo_downloader::scrape::{FilenameResolver, ScrapeOutcome};
use inat_photo_downloader::{Observation, PhotoRef};

struct FixtureSource {
    observations: VecDeque<Observation>,
}

#[async_trait]
impl ObservationSource for FixtureSource {
    async fn next_observation(&mut self) -> ClientResult<Option<Observation>> {
        Ok(self.observations.pop_front())
    }
}

struct FixtureResolver {
    filenames: HashMap<u64, ScrapeOutcome>,
}

#[async_trait]
impl FilenameResolver for FixtureResolver {
    async fn resolve(&self, photo_id: u64) -> ClientResult<ScrapeOutcome> {
        Ok(self
            .filenames
            .get(&photo_id)
            .cloned()
            .unwrap_or(ScrapeOutcome::NotFound))
    }
}

fn photo(id: u64) -> PhotoRef {
    PhotoRef {
        photo_id: id,
        display_url: format!("https://www.inaturalist.org/photos/{id}"),
        original_url: Some(format!(
            "https://static.inaturalist.org/photos/{id}/original.jpg"
        )),
        original_filename: None,
    }
}

fn fixture_source() -> FixtureSource {
    FixtureSource {
        observations: VecDeque::from(vec![
            Observation {
                id: 1001,
                photos: vec![photo(11), photo(12)],
            },
            Observation {
                id: 1002,
                photos: vec![],
            },
            Observation {
                id: 1003,
                photos: vec![photo(31)],
            },
        ]),
    }
}

fn fixture_resolver() -> FixtureResolver {
    let mut filenames = HashMap::new();
    filenames.insert(11, ScrapeOutcome::Found("IMG_0456.JPG".to_string()));
    // 12 stays unresolved
    filenames.insert(31, ScrapeOutcome::Found("DSC00123.jpg".to_string()));
    FixtureResolver { filenames }
}

async fn run_once(path: &Path, include_urls: bool) -> inat_photo_downloader::RunSummary {
    let writer = CsvManifestWriter::create(path, include_urls).unwrap();
    Pipeline::new(fixture_source(), fixture_resolver(), writer)
        .run()
        .await
        .unwrap()
}

#[tokio::test]
async fn manifest_rows_match_observation_order_and_shape() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("manifest.csv");

    let summary = run_once(&path, false).await;

    assert_eq!(summary.observations_processed, 3);
    assert_eq!(summary.photos_seen, 3);
    assert_eq!(summary.filenames_recovered, 2);
    assert_eq!(summary.filenames_unavailable, 1);

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(
        lines,
        vec![
            "observation_id,photo_filenames",
            "1001,IMG_0456.JPG;",
            "1002,",
            "1003,DSC00123.jpg",
        ]
    );
}

#[tokio::test]
async fn manifest_with_url_columns_keeps_alignment() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("manifest.csv");

    run_once(&path, true).await;

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(
        lines[0],
        "observation_id,photo_filenames,photo_urls,original_photo_urls"
    );
    assert_eq!(
        lines[1],
        "1001,IMG_0456.JPG;,\
         https://www.inaturalist.org/photos/11;https://www.inaturalist.org/photos/12,\
         https://static.inaturalist.org/photos/11/original.jpg;https://static.inaturalist.org/photos/12/original.jpg"
    );
    // An observation without photos still gets a row with empty cells
    assert_eq!(lines[2], "1002,,,");
}

#[tokio::test]
async fn reruns_produce_identical_manifests() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("manifest.csv");

    run_once(&path, true).await;
    let first = std::fs::read_to_string(&path).unwrap();

    run_once(&path, true).await;
    let second = std::fs::read_to_string(&path).unwrap();

    assert_eq!(first, second);
}
