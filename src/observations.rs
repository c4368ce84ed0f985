//! Observation enumeration via the public observations API
//!
//! Pages `GET /v1/observations?user_login=...` and maps each raw entry into
//! an [`Observation`] with its nested photo descriptors. Ordering is the
//! platform's native ordering, stable across pages; entries are deduplicated
//! by id to guard against page overlap when the account is written to
//! concurrently during a run.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::client::config::{API_BASE_URL, OPEN_DATA_BASE_URL, PER_PAGE, PHOTO_PAGE_BASE_URL};
use crate::client::{ClientResult, SessionClient};
use crate::{Observation, PhotoRef};

/// A lazy, finite, ordered source of observations.
///
/// The pipeline consumes this seam rather than the concrete enumerator so
/// runs can be driven from in-memory fixtures in tests.
#[async_trait]
pub trait ObservationSource: Send {
    /// Yield the next observation, or `None` when the sequence is finished.
    async fn next_observation(&mut self) -> ClientResult<Option<Observation>>;
}

/// Raw API page shape (only the fields this tool reads).
#[derive(Debug, Deserialize)]
pub struct ObservationsPage {
    /// Raw observation entries in platform order
    #[serde(default)]
    pub results: Vec<ApiObservation>,
}

/// One raw observation entry as the API reports it.
#[derive(Debug, Deserialize)]
pub struct ApiObservation {
    /// Observation identifier
    pub id: u64,
    /// Photo descriptors in platform order
    #[serde(default)]
    pub photos: Vec<ApiPhoto>,
}

/// One raw photo descriptor as the API reports it.
#[derive(Debug, Deserialize)]
pub struct ApiPhoto {
    /// Photo identifier
    pub id: u64,
    /// Thumbnail URL, absent for some legacy records
    #[serde(default)]
    pub url: Option<String>,
}

/// Fetches one raw page of observation results.
///
/// The enumerator consumes this seam so pagination behavior (dedup, limit
/// truncation, short-page termination) can be tested against in-memory pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the page described by the given query parameters.
    async fn fetch_page(&self, params: &[(&'static str, String)])
        -> ClientResult<ObservationsPage>;
}

/// Production fetcher: the observations API through the session client.
pub struct ApiPageFetcher {
    client: Arc<SessionClient>,
}

#[async_trait]
impl PageFetcher for ApiPageFetcher {
    async fn fetch_page(
        &self,
        params: &[(&'static str, String)],
    ) -> ClientResult<ObservationsPage> {
        self.client.get_json(API_BASE_URL, params).await
    }
}

/// Derive the original-resolution URL from an API photo descriptor.
///
/// The API reports a thumbnail URL with a `/square.` size segment; the
/// original-resolution variant lives at the same path with `/original.`.
/// Descriptors without a usable URL fall back to the open-data bucket's
/// canonical layout.
fn derive_original_url(photo: &ApiPhoto) -> Option<String> {
    if let Some(url) = &photo.url {
        if url.contains("/square.") {
            return Some(url.replace("/square.", "/original."));
        }
    }
    Some(format!("{OPEN_DATA_BASE_URL}/{}/original.jpeg", photo.id))
}

fn map_photo(photo: &ApiPhoto) -> PhotoRef {
    PhotoRef {
        photo_id: photo.id,
        display_url: format!("{PHOTO_PAGE_BASE_URL}/{}", photo.id),
        original_url: derive_original_url(photo),
        original_filename: None,
    }
}

fn map_observation(obs: &ApiObservation) -> Observation {
    Observation {
        id: obs.id,
        photos: obs.photos.iter().map(map_photo).collect(),
    }
}

/// Pagination state. Owned exclusively by the enumerator and advanced
/// monotonically; terminal once a short page arrives or the limit is hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCursor {
    page_number: u32,
    per_page: usize,
    observations_seen: usize,
}

impl FetchCursor {
    /// Start a cursor at page 1 with the given page size.
    pub fn new(per_page: usize) -> Self {
        Self {
            page_number: 1,
            per_page,
            observations_seen: 0,
        }
    }

    /// Current page number (1-based).
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Observations yielded so far.
    pub fn observations_seen(&self) -> usize {
        self.observations_seen
    }

    /// Query parameters for the current page.
    fn params(&self, username: &str) -> Vec<(&'static str, String)> {
        vec![
            ("user_login", username.to_string()),
            ("page", self.page_number.to_string()),
            ("per_page", self.per_page.to_string()),
        ]
    }

    /// Record a yielded observation. Returns `true` while the optional limit
    /// has not been reached.
    fn record_yield(&mut self, limit: Option<usize>) -> bool {
        self.observations_seen += 1;
        match limit {
            Some(limit) => self.observations_seen < limit,
            None => true,
        }
    }

    /// Record a fetched page. Returns `true` if another page should be
    /// requested (a full page means more data may follow).
    fn record_page(&mut self, page_len: usize) -> bool {
        self.page_number += 1;
        page_len >= self.per_page
    }
}

/// Paginated enumerator over one user's observations.
pub struct ObservationEnumerator<F: PageFetcher = ApiPageFetcher> {
    fetcher: F,
    username: String,
    limit: Option<usize>,
    cursor: FetchCursor,
    buffer: VecDeque<Observation>,
    seen_ids: HashSet<u64>,
    exhausted: bool,
}

impl ObservationEnumerator<ApiPageFetcher> {
    /// Create an enumerator for `username`, optionally truncated at `limit`
    /// observations.
    pub fn new(
        client: Arc<SessionClient>,
        username: impl Into<String>,
        limit: Option<usize>,
    ) -> Self {
        Self::with_fetcher(ApiPageFetcher { client }, username, limit)
    }
}

impl<F: PageFetcher> ObservationEnumerator<F> {
    /// Create an enumerator driven by an arbitrary page source.
    pub fn with_fetcher(fetcher: F, username: impl Into<String>, limit: Option<usize>) -> Self {
        Self {
            fetcher,
            username: username.into(),
            limit,
            cursor: FetchCursor::new(PER_PAGE),
            buffer: VecDeque::new(),
            seen_ids: HashSet::new(),
            exhausted: false,
        }
    }

    /// Pagination state, for diagnostics.
    pub fn cursor(&self) -> &FetchCursor {
        &self.cursor
    }

    async fn fetch_next_page(&mut self) -> ClientResult<()> {
        let params = self.cursor.params(&self.username);
        debug!(
            "Fetching observations page {} for {}",
            self.cursor.page_number(),
            self.username
        );

        let page = self.fetcher.fetch_page(&params).await?;
        let page_len = page.results.len();

        for entry in &page.results {
            // Page overlap under concurrent writes can repeat an entry
            if !self.seen_ids.insert(entry.id) {
                warn!("Skipping duplicate observation {} (page overlap)", entry.id);
                continue;
            }
            self.buffer.push_back(map_observation(entry));
        }

        if !self.cursor.record_page(page_len) {
            debug!(
                "Last page reached after {} observations",
                self.cursor.observations_seen() + self.buffer.len()
            );
            self.exhausted = true;
        }
        Ok(())
    }
}

#[async_trait]
impl<F: PageFetcher> ObservationSource for ObservationEnumerator<F> {
    async fn next_observation(&mut self) -> ClientResult<Option<Observation>> {
        if let Some(limit) = self.limit {
            if self.cursor.observations_seen() >= limit {
                return Ok(None);
            }
        }

        while self.buffer.is_empty() {
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_next_page().await?;
        }

        let obs = self.buffer.pop_front();
        if obs.is_some() && !self.cursor.record_yield(self.limit) {
            // Limit hit: truncate exactly here, even mid-page
            self.buffer.clear();
            self.exhausted = true;
        }
        Ok(obs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::RangeInclusive;
    use std::sync::Mutex;

    fn api_photo(id: u64, url: Option<&str>) -> ApiPhoto {
        ApiPhoto {
            id,
            url: url.map(str::to_string),
        }
    }

    fn page_of(ids: RangeInclusive<u64>) -> ObservationsPage {
        ObservationsPage {
            results: ids
                .map(|id| ApiObservation {
                    id,
                    photos: vec![],
                })
                .collect(),
        }
    }

    /// Serves a scripted sequence of pages and counts the fetches.
    struct ScriptedPages {
        pages: Mutex<VecDeque<ObservationsPage>>,
        fetches: Mutex<u32>,
    }

    impl ScriptedPages {
        fn new(pages: Vec<ObservationsPage>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                fetches: Mutex::new(0),
            }
        }

        fn fetch_count(&self) -> u32 {
            *self.fetches.lock().unwrap()
        }
    }

    #[async_trait]
    impl PageFetcher for &ScriptedPages {
        async fn fetch_page(
            &self,
            _params: &[(&'static str, String)],
        ) -> ClientResult<ObservationsPage> {
            *self.fetches.lock().unwrap() += 1;
            Ok(self
                .pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ObservationsPage { results: vec![] }))
        }
    }

    async fn drain<F: PageFetcher>(mut enumerator: ObservationEnumerator<F>) -> Vec<u64> {
        let mut ids = Vec::new();
        while let Some(obs) = enumerator.next_observation().await.unwrap() {
            ids.push(obs.id);
        }
        ids
    }

    #[test]
    fn test_page_deserialization() {
        let json = r#"{
            "total_results": 2,
            "page": 1,
            "per_page": 200,
            "results": [
                {"id": 101, "photos": [{"id": 7, "url": "https://static.inaturalist.org/photos/7/square.jpg"}]},
                {"id": 102}
            ]
        }"#;
        let page: ObservationsPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[0].id, 101);
        assert_eq!(page.results[0].photos.len(), 1);
        assert!(page.results[1].photos.is_empty());
    }

    #[test]
    fn test_derive_original_url_from_square_thumbnail() {
        let photo = api_photo(
            7,
            Some("https://static.inaturalist.org/photos/7/square.jpg?1234"),
        );
        assert_eq!(
            derive_original_url(&photo).unwrap(),
            "https://static.inaturalist.org/photos/7/original.jpg?1234"
        );
    }

    #[test]
    fn test_derive_original_url_falls_back_to_open_data() {
        let photo = api_photo(99, None);
        assert_eq!(
            derive_original_url(&photo).unwrap(),
            "https://inaturalist-open-data.s3.amazonaws.com/photos/99/original.jpeg"
        );

        // An unexpected URL shape also falls back rather than guessing
        let odd = api_photo(99, Some("https://example.com/thumb.png"));
        assert_eq!(
            derive_original_url(&odd).unwrap(),
            "https://inaturalist-open-data.s3.amazonaws.com/photos/99/original.jpeg"
        );
    }

    #[test]
    fn test_map_observation_preserves_photo_order() {
        let obs = ApiObservation {
            id: 123,
            photos: vec![
                api_photo(1, Some("https://static.inaturalist.org/photos/1/square.jpg")),
                api_photo(2, None),
                api_photo(3, Some("https://static.inaturalist.org/photos/3/square.jpeg")),
            ],
        };
        let mapped = map_observation(&obs);
        assert_eq!(mapped.id, 123);
        let ids: Vec<u64> = mapped.photos.iter().map(|p| p.photo_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(
            mapped.photos[0].display_url,
            "https://www.inaturalist.org/photos/1"
        );
        assert!(mapped.photos.iter().all(|p| p.original_filename.is_none()));
    }

    #[test]
    fn test_cursor_short_page_is_terminal() {
        let mut cursor = FetchCursor::new(200);
        assert!(cursor.record_page(200)); // full page, keep going
        assert_eq!(cursor.page_number(), 2);
        assert!(!cursor.record_page(37)); // short page, end of data
        assert_eq!(cursor.page_number(), 3);
    }

    #[test]
    fn test_cursor_limit_truncates_exactly() {
        let mut cursor = FetchCursor::new(200);
        assert!(cursor.record_yield(Some(3)));
        assert!(cursor.record_yield(Some(3)));
        // Third yield reaches the limit
        assert!(!cursor.record_yield(Some(3)));
        assert_eq!(cursor.observations_seen(), 3);
    }

    #[test]
    fn test_cursor_no_limit_never_truncates() {
        let mut cursor = FetchCursor::new(200);
        for _ in 0..1000 {
            assert!(cursor.record_yield(None));
        }
        assert_eq!(cursor.observations_seen(), 1000);
    }

    #[tokio::test]
    async fn test_enumerator_spans_page_boundary() {
        // A full page of 200 followed by a short page of 30
        let pages = ScriptedPages::new(vec![page_of(1..=200), page_of(201..=230)]);
        let enumerator = ObservationEnumerator::with_fetcher(&pages, "someone", None);

        let ids = drain(enumerator).await;
        assert_eq!(ids.len(), 230);
        assert_eq!(ids.first(), Some(&1));
        assert_eq!(ids.last(), Some(&230));
        assert_eq!(pages.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_enumerator_dedups_overlapping_pages() {
        // Concurrent writes to the account can shift pagination so the
        // second page repeats entries from the first
        let pages = ScriptedPages::new(vec![page_of(1..=200), page_of(198..=210)]);
        let enumerator = ObservationEnumerator::with_fetcher(&pages, "someone", None);

        let ids = drain(enumerator).await;
        assert_eq!(ids.len(), 210);
        let unique: HashSet<u64> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[tokio::test]
    async fn test_enumerator_limit_truncates_mid_page() {
        let pages = ScriptedPages::new(vec![page_of(1..=200), page_of(201..=400)]);
        let enumerator = ObservationEnumerator::with_fetcher(&pages, "someone", Some(150));

        let ids = drain(enumerator).await;
        assert_eq!(ids, (1..=150).collect::<Vec<u64>>());
        // The limit was hit inside page 1, so page 2 is never requested
        assert_eq!(pages.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_enumerator_limit_beyond_total_yields_everything() {
        let pages = ScriptedPages::new(vec![page_of(1..=200), page_of(201..=230)]);
        let enumerator = ObservationEnumerator::with_fetcher(&pages, "someone", Some(500));

        let ids = drain(enumerator).await;
        assert_eq!(ids.len(), 230);
    }
}
