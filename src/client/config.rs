//! Network configuration constants

use std::time::Duration;

/// Base URL of the public observations API.
pub const API_BASE_URL: &str = "https://api.inaturalist.org/v1/observations";

/// Base URL of the authenticated photo pages.
pub const PHOTO_PAGE_BASE_URL: &str = "https://www.inaturalist.org/photos";

/// Open-data bucket holding original-resolution photo bytes. Used as a
/// fallback when an API entry carries no photo URL to derive from.
pub const OPEN_DATA_BASE_URL: &str = "https://inaturalist-open-data.s3.amazonaws.com/photos";

/// Cookie name carrying the session token.
pub const SESSION_COOKIE_NAME: &str = "_inaturalist_session";

/// User-Agent identifying this tool, per iNaturalist API guidelines.
pub const USER_AGENT: &str = concat!("inat-photo-downloader/", env!("CARGO_PKG_VERSION"));

/// Observations fetched per API page.
pub const PER_PAGE: usize = 200;

/// Minimum spacing between outbound requests.
/// iNaturalist guidelines ask for roughly 1 request per second; going faster
/// risks the session being throttled or banned.
pub const REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// Extra pause after each completed image download.
/// A ~5MB image every 4 seconds (3s here + 1s request spacing) stays under
/// the platform's 5GB/hour media guideline.
pub const DOWNLOAD_COOLDOWN: Duration = Duration::from_secs(3);

/// Retry ceiling for a single request. Five retries spans roughly a minute
/// of accumulated backoff, enough to ride out a brief API outage without
/// stalling the run indefinitely.
pub const MAX_RETRIES: u32 = 5;

/// Delay before the first retry, in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Ceiling on any single backoff sleep, in milliseconds. The doubling
/// sequence crosses this between the fifth and sixth retry.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Backoff before retry number `retry_count` (0-based): doubles from
/// [`INITIAL_BACKOFF_MS`], never exceeding [`MAX_BACKOFF_MS`].
pub fn calculate_backoff(retry_count: u32) -> Duration {
    let doubled = INITIAL_BACKOFF_MS.saturating_mul(1u64 << retry_count.min(16));
    Duration::from_millis(doubled.min(MAX_BACKOFF_MS))
}
