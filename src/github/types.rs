// src/github/types.rs
// =============================================================================
// Shared types for the code-host boundary.
//
// Everything the fetch engine knows about the remote service is defined
// here: the CodeHost trait, the per-page result shape, rate-limit metadata,
// and the error taxonomy (primary limit vs secondary limit vs everything
// else — they get very different retry treatment).
//
// Rust concepts:
// - thiserror: derive Display + Error for our error enums
// - async-trait: async methods on a trait so mocks are easy
// =============================================================================

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use thiserror::Error;

/// One code-search result, prior to download. Transient: produced per
/// page, never persisted itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Repository owner login (e.g. "rust-lang")
    pub owner: String,
    /// Repository name (e.g. "rust")
    pub repo: String,
    /// Path of the file within the repository
    pub path: String,
    /// Content hash the host assigned to this blob (may be empty)
    pub sha: String,
    /// Browsable URL, stored alongside the content for provenance
    pub html_url: String,
}

/// Rate-limit metadata the host returns with every search response.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateInfo {
    /// Requests allowed per window
    pub limit: i64,
    /// Requests still available in the current window
    pub remaining: i64,
    /// Requests already spent in the current window
    pub used: i64,
    /// Unix timestamp (seconds) when the window resets
    pub reset: i64,
}

impl RateInfo {
    /// How long until the rate-limit window resets, measured from now.
    /// Zero if the reset time is already in the past.
    pub fn until_reset(&self) -> Duration {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        Duration::from_secs((self.reset - now).max(0) as u64)
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Candidates on this page, in the order the host returned them
    pub candidates: Vec<Candidate>,
    /// Page number to request next; None means this was the last page
    pub next_page: Option<i64>,
    /// Rate-limit snapshot taken from the response headers
    pub rate: RateInfo,
}

/// Failures of the paged search request.
///
/// The two rate-limit shapes are retried on the SAME page; anything else
/// aborts the crawl (the cursor stays at the last advanced page, so a
/// later invocation resumes correctly).
#[derive(Debug, Error)]
pub enum SearchError {
    /// The structured, documented rate limit: wait until `rate.reset`
    #[error("rate limit exhausted ({remaining}/{limit} remaining)", remaining = rate.remaining, limit = rate.limit)]
    RateLimited { rate: RateInfo },

    /// The abuse-detection limit. The host signals this only through
    /// message wording (see `is_secondary_rate_limit`), not a code.
    #[error("secondary rate limit triggered: {message}")]
    SecondaryRateLimit { rate: RateInfo, message: String },

    /// Transport-level failure (DNS, TLS, timeout, ...)
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Any other API rejection — not retried
    #[error("search API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
}

/// Failures of a single candidate download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Content filled the per-file ceiling; skipped silently, never stored
    #[error("code size limit exceeded")]
    SizeLimitExceeded,

    /// The shared cancellation token fired
    #[error("download cancelled")]
    Cancelled,

    /// The host rate-limited the download; the engine pauses the page
    #[error("rate limited during download: {0}")]
    RateLimited(String),

    /// Not-found, transport failure, decode trouble, ...
    #[error("transfer failed: {0}")]
    Transfer(String),
}

/// The host's wording for abuse-detection ("secondary") rate limits.
///
/// Known fragility: this is substring matching on a human-readable
/// message. If GitHub rewords it, secondary limits degrade into plain
/// API errors and the crawl aborts instead of cooling down. Kept in one
/// place so a wording change is a one-line fix.
pub fn is_secondary_rate_limit(message: &str) -> bool {
    message.to_lowercase().contains("secondary rate limit")
}

/// Abstract paged-search + content-retrieval service.
///
/// The production implementation is `GithubClient`; engine tests provide
/// scripted mocks.
#[async_trait]
pub trait CodeHost: Send + Sync {
    /// Requests one page of search results for `query` (the caller has
    /// already appended the language filter fragment).
    async fn search_page(
        &self,
        query: &str,
        page: i64,
        per_page: i64,
    ) -> Result<SearchPage, SearchError>;

    /// Downloads one candidate's content, decoded to UTF-8 text, with the
    /// per-file size ceiling enforced.
    async fn download(&self, candidate: &Candidate) -> Result<String, DownloadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secondary_rate_limit_matches_by_substring() {
        assert!(is_secondary_rate_limit(
            "You have exceeded a secondary rate limit. Please wait."
        ));
        assert!(is_secondary_rate_limit("SECONDARY RATE LIMIT hit"));
        assert!(!is_secondary_rate_limit("API rate limit exceeded"));
        assert!(!is_secondary_rate_limit("Not Found"));
    }

    #[test]
    fn until_reset_is_zero_for_past_timestamps() {
        let rate = RateInfo {
            reset: 0,
            ..RateInfo::default()
        };
        assert_eq!(rate.until_reset(), Duration::ZERO);
    }

    #[test]
    fn until_reset_counts_forward_from_now() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let rate = RateInfo {
            reset: now + 120,
            ..RateInfo::default()
        };
        let wait = rate.until_reset();
        // Allow a little slack for the clock ticking between the two reads
        assert!(wait <= Duration::from_secs(120));
        assert!(wait >= Duration::from_secs(118));
    }
}
