//! Authenticated photo-page scraping
//!
//! The original upload filename is not in the public API; it appears only in
//! the HTML of `www.inaturalist.org/photos/{id}` when viewed with the owning
//! account's session cookie. Extraction is isolated in a pure function over
//! the page text so markup drift is contained to one testable unit, and a
//! failed parse always degrades to "no filename" rather than aborting a run.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::debug;

use crate::client::config::PHOTO_PAGE_BASE_URL;
use crate::client::{ClientResult, SessionClient};

static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr").expect("static selector is valid"));
static HEADER_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("th").expect("static selector is valid"));
static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td").expect("static selector is valid"));
static DATA_ATTR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-original-filename]").expect("static selector is valid"));

/// Result of scraping one photo page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeOutcome {
    /// The original filename, exactly as the page reported it (unsanitized).
    Found(String),
    /// The metadata table exists but carries no filename row; the photo may
    /// have been stripped of metadata or the markup may have drifted.
    NotFound,
    /// No metadata table at all: the page was rendered for a viewer that
    /// does not own the photo.
    NotOwner,
}

/// Extract the original filename from photo-page HTML.
///
/// Two markers are tried in order, mirroring how the page has historically
/// exposed the value:
/// 1. a metadata table row whose `<th>` label is `Filename`
/// 2. any element carrying a `data-original-filename` attribute
pub fn extract_filename(html: &str) -> ScrapeOutcome {
    let document = Html::parse_document(html);

    let mut saw_metadata_table = false;
    for row in document.select(&ROW_SELECTOR) {
        let Some(header) = row.select(&HEADER_SELECTOR).next() else {
            continue;
        };
        saw_metadata_table = true;
        let label = header.text().collect::<String>();
        if label.trim() != "Filename" {
            continue;
        }
        if let Some(cell) = row.select(&CELL_SELECTOR).next() {
            let value = cell.text().collect::<String>().trim().to_string();
            if !value.is_empty() {
                return ScrapeOutcome::Found(value);
            }
        }
    }

    // Backup marker used by older page revisions
    if let Some(el) = document.select(&DATA_ATTR_SELECTOR).next() {
        if let Some(value) = el.value().attr("data-original-filename") {
            let value = value.trim();
            if !value.is_empty() {
                return ScrapeOutcome::Found(value.to_string());
            }
        }
    }

    if saw_metadata_table {
        ScrapeOutcome::NotFound
    } else {
        ScrapeOutcome::NotOwner
    }
}

/// Resolves a photo id to its original filename.
#[async_trait]
pub trait FilenameResolver: Send + Sync {
    /// Fetch and parse the photo page for `photo_id`.
    async fn resolve(&self, photo_id: u64) -> ClientResult<ScrapeOutcome>;
}

/// Scrapes authenticated photo pages through the shared session client.
pub struct PhotoMetadataScraper {
    client: Arc<SessionClient>,
}

impl PhotoMetadataScraper {
    /// Create a scraper using the shared session client.
    pub fn new(client: Arc<SessionClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FilenameResolver for PhotoMetadataScraper {
    async fn resolve(&self, photo_id: u64) -> ClientResult<ScrapeOutcome> {
        let url = format!("{PHOTO_PAGE_BASE_URL}/{photo_id}");
        let html = self.client.get_text(&url).await?;
        let outcome = extract_filename(&html);
        debug!("Scraped photo {}: {:?}", photo_id, outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER_PAGE: &str = r#"
        <html><body>
        <h1>Photo 12345</h1>
        <table class="table">
            <tr><th>Associated observations</th><td>1</td></tr>
            <tr><th>Filename</th><td> IMG_0456.JPG </td></tr>
            <tr><th>Size</th><td>2048x1536</td></tr>
        </table>
        </body></html>"#;

    #[test]
    fn test_filename_from_metadata_table() {
        assert_eq!(
            extract_filename(OWNER_PAGE),
            ScrapeOutcome::Found("IMG_0456.JPG".to_string())
        );
    }

    #[test]
    fn test_filename_from_data_attribute_fallback() {
        let html = r#"
            <html><body>
            <table><tr><th>Size</th><td>2048x1536</td></tr></table>
            <div data-original-filename="DSC00123.jpg">photo</div>
            </body></html>"#;
        assert_eq!(
            extract_filename(html),
            ScrapeOutcome::Found("DSC00123.jpg".to_string())
        );
    }

    #[test]
    fn test_table_without_filename_row_is_not_found() {
        let html = r#"
            <html><body>
            <table>
                <tr><th>Associated observations</th><td>1</td></tr>
                <tr><th>Size</th><td>2048x1536</td></tr>
            </table>
            </body></html>"#;
        assert_eq!(extract_filename(html), ScrapeOutcome::NotFound);
    }

    #[test]
    fn test_page_without_metadata_table_is_not_owner() {
        let html = r#"
            <html><body>
            <h1>Photo 12345</h1>
            <img src="https://static.inaturalist.org/photos/12345/large.jpg">
            </body></html>"#;
        assert_eq!(extract_filename(html), ScrapeOutcome::NotOwner);
    }

    #[test]
    fn test_empty_filename_cell_is_not_found() {
        let html = r#"
            <html><body>
            <table><tr><th>Filename</th><td>   </td></tr></table>
            </body></html>"#;
        assert_eq!(extract_filename(html), ScrapeOutcome::NotFound);
    }

    #[test]
    fn test_malformed_markup_does_not_panic() {
        let html = "<table><tr><th>Filename<td>broken.jpg</table></body>";
        // html5ever recovers the tree; the filename is still reachable
        assert_eq!(
            extract_filename(html),
            ScrapeOutcome::Found("broken.jpg".to_string())
        );
    }

    #[test]
    fn test_completely_unstructured_input() {
        assert_eq!(extract_filename("not html at all"), ScrapeOutcome::NotOwner);
        assert_eq!(extract_filename(""), ScrapeOutcome::NotOwner);
    }
}
