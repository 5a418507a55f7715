// src/github/client.rs
// =============================================================================
// The concrete GitHub REST client behind the CodeHost trait.
//
// Endpoints used:
// - GET /search/code            -> one page of candidates + rate headers
// - GET /repos/{o}/{r}/contents/{path}  (Accept: raw) -> file bytes
//
// Responsibilities beyond plain HTTP:
// - Classify failures into primary rate limit / secondary rate limit /
//   permanent error (they get very different retry treatment upstream)
// - Follow Link-header pagination ("has next page" signal)
// - Enforce the per-file size ceiling while streaming the body
// - Normalize downloaded bytes to UTF-8 text
//
// Rust concepts:
// - Streams: consuming a response body chunk by chunk
// - Free functions for the pure parts (parsing, classifying) so they can
//   be unit tested without a network
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::form_urlencoded;

use super::types::{
    is_secondary_rate_limit, Candidate, CodeHost, DownloadError, RateInfo, SearchError, SearchPage,
};

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("codefetch/", env!("CARGO_PKG_VERSION"));

/// Per-file size ceiling: a single source file larger than this is
/// rejected, never truncated. 0 would mean "no limit".
pub const CODE_SIZE_LIMIT: usize = 256 * 1024;

// Wire shapes of the search API payload. We only deserialize the fields
// we actually use.
#[derive(Debug, Deserialize)]
struct ApiSearchResponse {
    #[serde(default)]
    items: Vec<ApiCodeResult>,
}

#[derive(Debug, Deserialize)]
struct ApiCodeResult {
    path: String,
    #[serde(default)]
    sha: String,
    html_url: String,
    repository: ApiRepository,
}

#[derive(Debug, Deserialize)]
struct ApiRepository {
    name: String,
    owner: ApiOwner,
}

#[derive(Debug, Deserialize)]
struct ApiOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Authenticated GitHub client implementing the CodeHost capability.
pub struct GithubClient {
    http: Client,
    user: String,
    token: String,
    api_base: String,
}

impl GithubClient {
    /// Builds a client using basic authentication (username + personal
    /// access token), which is what the code-search API expects.
    pub fn new(user: &str, token: &str) -> Result<GithubClient, SearchError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(GithubClient {
            http,
            user: user.to_string(),
            token: token.to_string(),
            api_base: API_BASE.to_string(),
        })
    }
}

#[async_trait]
impl CodeHost for GithubClient {
    async fn search_page(
        &self,
        query: &str,
        page: i64,
        per_page: i64,
    ) -> Result<SearchPage, SearchError> {
        let q = encode_query(query);
        let mut url = format!(
            "{}/search/code?q={}&per_page={}",
            self.api_base, q, per_page
        );
        if page > 0 {
            url.push_str(&format!("&page={}", page));
        }

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.user, Some(&self.token))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        let rate = rate_from_headers(response.headers());
        let next_page = response
            .headers()
            .get("link")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_link_next);

        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .map(|body| body.message)
                .unwrap_or_default();
            return Err(classify_search_failure(status.as_u16(), rate, message));
        }

        let body: ApiSearchResponse = response.json().await?;
        let candidates = body
            .items
            .into_iter()
            .map(|item| Candidate {
                owner: item.repository.owner.login,
                repo: item.repository.name,
                path: item.path,
                sha: item.sha,
                html_url: item.html_url,
            })
            .collect();

        Ok(SearchPage {
            candidates,
            next_page,
            rate,
        })
    }

    async fn download(&self, candidate: &Candidate) -> Result<String, DownloadError> {
        // The contents endpoint with the raw media type hands us the file
        // body directly, whatever branch the search result came from
        let url = format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base, candidate.owner, candidate.repo, candidate.path
        );

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.user, Some(&self.token))
            .header("Accept", "application/vnd.github.raw")
            .send()
            .await
            .map_err(|e| DownloadError::Transfer(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .map(|body| body.message)
                .unwrap_or_default();
            if is_secondary_rate_limit(&message)
                || status == StatusCode::FORBIDDEN
                || status == StatusCode::TOO_MANY_REQUESTS
            {
                return Err(DownloadError::RateLimited(message));
            }
            return Err(DownloadError::Transfer(format!(
                "HTTP {} for {}: {}",
                status, candidate.html_url, message
            )));
        }

        let bytes = read_limited(Box::pin(response.bytes_stream()), CODE_SIZE_LIMIT).await?;
        debug!(url = %candidate.html_url, size = bytes.len(), "downloaded");
        Ok(decode_text(&bytes))
    }
}

/// Percent-encodes the search query for the `q=` parameter.
///
/// The search syntax separates terms with '+', and those separators must
/// survive encoding, so the query is encoded term by term. Within a term,
/// form encoding turns spaces into '+' (another separator, which is what
/// the search syntax means by a space) and escapes characters like `&`,
/// `#` and `%` that would otherwise corrupt the request URL.
fn encode_query(query: &str) -> String {
    query
        .split('+')
        .map(|term| form_urlencoded::byte_serialize(term.as_bytes()).collect::<String>())
        .collect::<Vec<_>>()
        .join("+")
}

/// Pulls the standard rate-limit headers out of a response.
/// Missing or malformed headers read as zero.
fn rate_from_headers(headers: &HeaderMap) -> RateInfo {
    let header_i64 = |name: &str| -> i64 {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    };
    RateInfo {
        limit: header_i64("x-ratelimit-limit"),
        remaining: header_i64("x-ratelimit-remaining"),
        used: header_i64("x-ratelimit-used"),
        reset: header_i64("x-ratelimit-reset"),
    }
}

/// Extracts the next page number from a Link header.
///
/// The header looks like:
///   <https://api.github.com/search/code?q=x&page=3>; rel="next",
///   <https://api.github.com/search/code?q=x&page=9>; rel="last"
///
/// Returns None when there is no rel="next" entry — that's the host's
/// "no more pages" signal.
fn parse_link_next(link: &str) -> Option<i64> {
    for part in link.split(',') {
        let mut sections = part.split(';');
        let url = sections.next()?.trim();
        let is_next = sections.any(|s| s.trim() == r#"rel="next""#);
        if !is_next {
            continue;
        }

        // Strip the angle brackets and dig the page parameter out
        let url = url.trim_start_matches('<').trim_end_matches('>');
        let query = url.split('?').nth(1)?;
        for pair in query.split('&') {
            if let Some(value) = pair.strip_prefix("page=") {
                return value.parse().ok();
            }
        }
    }
    None
}

/// Sorts a failed search response into the retry taxonomy.
///
/// - "secondary rate limit" wording -> SecondaryRateLimit (fixed cooldown)
/// - 403/429 with the quota spent   -> RateLimited (sleep until reset)
/// - everything else                -> Api (permanent, aborts the crawl)
fn classify_search_failure(status: u16, rate: RateInfo, message: String) -> SearchError {
    if is_secondary_rate_limit(&message) {
        return SearchError::SecondaryRateLimit { rate, message };
    }
    if (status == 403 || status == 429) && rate.remaining == 0 {
        return SearchError::RateLimited { rate };
    }
    SearchError::Api { status, message }
}

/// Accumulates a byte stream, enforcing the per-file ceiling.
///
/// The moment the accumulated length reaches `limit` the file is rejected:
/// a source file that needs the whole ceiling (or more) is skipped rather
/// than silently truncated.
async fn read_limited<S, E>(mut stream: S, limit: usize) -> Result<Vec<u8>, DownloadError>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DownloadError::Transfer(e.to_string()))?;
        buf.extend_from_slice(&chunk);
        if limit > 0 && buf.len() >= limit {
            return Err(DownloadError::SizeLimitExceeded);
        }
    }
    Ok(buf)
}

/// Decodes raw file bytes to a UTF-8 string.
///
/// Honors a byte-order mark when present (UTF-8/UTF-16 sources show up in
/// the wild); everything else is treated as UTF-8 with lossy replacement
/// of invalid sequences, so one odd byte can't kill a download.
fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = encoding_rs::Encoding::for_bom(bytes) {
        let (text, _, _) = encoding.decode(&bytes[bom_len..]);
        return text.into_owned();
    }
    String::from_utf8_lossy(bytes).into_owned()
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why classify errors by message substring?
//    - GitHub's secondary (abuse) rate limit has no structured error code;
//      the message text is the only signal it gives
//    - The matching lives in one function (types.rs) so a wording change
//      is a one-line fix
//
// 2. What is bytes_stream()?
//    - Instead of buffering the whole body, reqwest hands us chunks as
//      they arrive
//    - That lets us stop reading the moment a file crosses the ceiling
//
// 3. Why lossy UTF-8 decoding?
//    - The archive stores TEXT; an occasional bad byte in some repo's
//      source file shouldn't abort the crawl
// -----------------------------------------------------------------------------
