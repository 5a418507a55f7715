// src/fetch/engine.rs
// =============================================================================
// The resumable crawl state machine.
//
// One invocation of fetch() walks:
//
//   Resuming -> Requesting -> (RateLimited) -> Downloading -> Advancing
//        ^                                                        |
//        +------------------------- loop ------------------------+
//
// until it reaches Done: the query is exhausted, the size budget is
// reached, or the caller cancelled.
//
// Retry policy (see the error taxonomy in github/types.rs):
// - Primary rate limit:   sleep until the quota window resets, same page
// - Secondary rate limit: sleep a fixed 10-minute cooldown, same page
// - Empty result page:    treated as a transient anomaly, same cooldown
// - Anything else:        abort; the cursor is already persisted, so the
//                         next invocation resumes correctly
//
// Every sleep races against the cancellation token, so a Ctrl-C never has
// to wait out a ten-minute cooldown.
//
// Rust concepts:
// - tokio::select!: Racing a sleep against cancellation
// - buffer_unordered: Bounded-concurrency downloads within one page
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::clock::{Sleeper, TokioSleeper};
use crate::github::{Candidate, CodeHost, DownloadError, RateInfo, SearchError};
use crate::language::Language;
use crate::store::{ContentStore, StoreError, PAGE_EXHAUSTED};

/// Fixed cooldown after a secondary rate limit or an empty result page.
const COOLDOWN: Duration = Duration::from_secs(10 * 60);
/// Shorter pause when a rate limit surfaces on a download sub-task.
const PAGE_ERROR_PAUSE: Duration = Duration::from_secs(60);

/// Tunables for one crawl. The defaults match polite single-connection
/// crawling; only the courtesy delay is usually worth changing.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Results requested per search page
    pub per_page: i64,
    /// Courtesy sleep before every search request and every download
    pub request_delay: Duration,
    /// Concurrent downloads within one page. Default 1: the host throttles
    /// aggressively, so serializing is the safe choice.
    pub concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            per_page: 30,
            request_delay: Duration::from_secs(1),
            concurrency: 1,
        }
    }
}

/// Errors that terminate a crawl. Retryable conditions (rate limits,
/// empty pages) never surface here — the engine handles those in place.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The caller's cancellation token fired
    #[error("crawl cancelled")]
    Cancelled,

    /// A permanent search-API failure (not a rate limit)
    #[error(transparent)]
    Search(SearchError),

    /// A storage failure other than a duplicate hash. Data integrity
    /// outranks liveness, so these always abort.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// How a single download sub-task ended. Collected per page; only
// cancellation and storage failures abort the crawl.
enum TaskOutcome {
    Done,
    Cancelled,
    RateLimited(String),
    Failed(DownloadError),
    StoreFailed(StoreError),
}

// What the page as a whole needs from the driver afterwards.
struct PageOutcome {
    rate_limited: bool,
}

/// The resumable, rate-limit-aware fetch loop.
pub struct FetchEngine {
    host: Arc<dyn CodeHost>,
    store: Arc<dyn ContentStore>,
    sleeper: Arc<dyn Sleeper>,
    config: FetchConfig,
}

impl FetchEngine {
    pub fn new(host: Arc<dyn CodeHost>, store: Arc<dyn ContentStore>, config: FetchConfig) -> Self {
        Self::with_sleeper(host, store, config, Arc::new(TokioSleeper))
    }

    /// Like `new`, with the sleep capability injected (used by tests to
    /// skip real cooldowns).
    pub fn with_sleeper(
        host: Arc<dyn CodeHost>,
        store: Arc<dyn ContentStore>,
        config: FetchConfig,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        FetchEngine {
            host,
            store,
            sleeper,
            config,
        }
    }

    /// Crawls search results for `query` restricted to `language`, until
    /// the query is exhausted, the per-language stored size passes
    /// `max_total_size_bytes`, or the token is cancelled.
    ///
    /// Safe to re-invoke: an exhausted pair returns immediately, and a
    /// budget-stopped pair continues from its saved cursor when called
    /// again with a larger budget.
    pub async fn fetch(
        &self,
        language: &Language,
        query: &str,
        max_total_size_bytes: i64,
        token: &CancellationToken,
    ) -> Result<(), FetchError> {
        // Resuming: load the cursor for this (language, query) pair
        let mut page = self.store.get_progress(language, query).await?;
        if page == PAGE_EXHAUSTED {
            info!(
                language = language.name(),
                query, "search already complete, nothing to do"
            );
            return Ok(());
        }
        if page > 0 {
            info!(page, "resuming from saved cursor");
        }

        let full_query = format!("{}+{}", query, language.query_filter());

        loop {
            // Courtesy delay before every search request
            self.pause(self.config.request_delay, token).await?;

            info!(page, per_page = self.config.per_page, "fetching search page");
            let result = self
                .host
                .search_page(&full_query, page, self.config.per_page)
                .await;

            let search_page = match result {
                Ok(p) => p,
                Err(SearchError::RateLimited { rate }) => {
                    // RateLimited: wait out the quota window, retry same page
                    error!("rate limit exhausted");
                    log_rate(&rate);
                    let wait = rate.until_reset();
                    info!(seconds = wait.as_secs(), "sleeping until rate limit resets");
                    self.pause(wait, token).await?;
                    continue;
                }
                Err(SearchError::SecondaryRateLimit { rate, message }) => {
                    error!(message = %message, "secondary rate limit triggered");
                    log_rate(&rate);
                    info!(seconds = COOLDOWN.as_secs(), "cooling down");
                    self.pause(COOLDOWN, token).await?;
                    continue;
                }
                // Everything else is permanent: abort with the cursor at the
                // last successfully-advanced page
                Err(e) => return Err(FetchError::Search(e)),
            };

            // Budget check before touching the page's results. The cursor is
            // left as-is so a later call with a larger budget continues here.
            let total = self.store.total_size_by_language(language).await?;
            if total > max_total_size_bytes {
                info!(
                    language = language.name(),
                    total_bytes = total,
                    "size budget reached"
                );
                return Ok(());
            }

            if search_page.candidates.is_empty() {
                // A populated query suddenly returning nothing is a transient
                // anomaly, not exhaustion: retry the same page after a cooldown
                error!(
                    language = language.name(),
                    query, "no results on page, retrying after cooldown"
                );
                self.pause(COOLDOWN, token).await?;
                continue;
            }

            info!(
                count = search_page.candidates.len(),
                "processing search results"
            );
            let outcome = self
                .download_page(language, &search_page.candidates, token)
                .await?;
            if outcome.rate_limited {
                info!(
                    seconds = PAGE_ERROR_PAUSE.as_secs(),
                    "pausing after download rate limit"
                );
                self.pause(PAGE_ERROR_PAUSE, token).await?;
            }

            // Advancing: persist the cursor only after every download on the
            // page has been attempted
            match search_page.next_page {
                None => {
                    info!(query, "no more pages left");
                    self.store
                        .update_progress(language, query, PAGE_EXHAUSTED)
                        .await?;
                    return Ok(());
                }
                Some(next) => {
                    self.store.update_progress(language, query, next).await?;
                    page = next;
                }
            }
        }
    }

    // Downloading: filter, dedup, then fetch the survivors with bounded
    // concurrency. Returns Err only for cancellation or storage failures.
    async fn download_page(
        &self,
        language: &Language,
        candidates: &[Candidate],
        token: &CancellationToken,
    ) -> Result<PageOutcome, FetchError> {
        // Filter before spending any download on a candidate
        let mut pending: Vec<Candidate> = Vec::new();
        for candidate in candidates {
            if let Err(e) = language.validate_path(&candidate.path) {
                info!(url = %candidate.html_url, "skip: {}", e);
                continue;
            }
            if !candidate.sha.is_empty() && self.store.exists_by_hash(&candidate.sha).await? {
                info!(url = %candidate.html_url, "skip: content already archived");
                continue;
            }
            pending.push(candidate.clone());
        }

        // buffer_unordered caps how many downloads are in flight at once;
        // completion order within the page doesn't matter
        let outcomes: Vec<TaskOutcome> = stream::iter(
            pending
                .iter()
                .map(|candidate| self.download_one(language, candidate, token)),
        )
        .buffer_unordered(self.config.concurrency.max(1))
        .collect()
        .await;

        let mut rate_limited = false;
        for outcome in outcomes {
            match outcome {
                TaskOutcome::Done => {}
                TaskOutcome::Cancelled => return Err(FetchError::Cancelled),
                TaskOutcome::StoreFailed(e) => return Err(e.into()),
                TaskOutcome::RateLimited(message) => {
                    error!(message = %message, "rate limited while downloading");
                    rate_limited = true;
                }
                TaskOutcome::Failed(e) => {
                    // Page-level collection error: logged, never fatal
                    error!("error fetching code: {}", e);
                }
            }
        }

        Ok(PageOutcome { rate_limited })
    }

    // One candidate end to end: courtesy sleep, cancellable download,
    // store. Size-limit rejections are silent skips.
    async fn download_one(
        &self,
        language: &Language,
        candidate: &Candidate,
        token: &CancellationToken,
    ) -> TaskOutcome {
        if self.pause(self.config.request_delay, token).await.is_err() {
            return TaskOutcome::Cancelled;
        }

        let downloaded = tokio::select! {
            _ = token.cancelled() => return TaskOutcome::Cancelled,
            result = self.host.download(candidate) => result,
        };

        match downloaded {
            Ok(content) => {
                match self
                    .store
                    .save(language, &candidate.html_url, &content, &candidate.sha)
                    .await
                {
                    Ok(()) => {
                        info!("OK: {}", candidate.html_url);
                        TaskOutcome::Done
                    }
                    Err(e) => TaskOutcome::StoreFailed(e),
                }
            }
            Err(DownloadError::SizeLimitExceeded) => {
                info!(url = %candidate.html_url, "skip: code size limit exceeded");
                TaskOutcome::Done
            }
            Err(DownloadError::Cancelled) => TaskOutcome::Cancelled,
            Err(DownloadError::RateLimited(message)) => TaskOutcome::RateLimited(message),
            Err(e) => TaskOutcome::Failed(e),
        }
    }

    // A sleep that loses to cancellation: no cooldown may block shutdown.
    async fn pause(&self, duration: Duration, token: &CancellationToken) -> Result<(), FetchError> {
        tokio::select! {
            _ = token.cancelled() => Err(FetchError::Cancelled),
            _ = self.sleeper.sleep(duration) => Ok(()),
        }
    }
}

fn log_rate(rate: &RateInfo) {
    warn!(
        limit = rate.limit,
        remaining = rate.remaining,
        used = rate.used,
        reset_epoch = rate.reset,
        "rate limit status"
    );
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why are pages strictly sequential but downloads concurrent?
//    - The cursor is a single page number, and the host's pagination is
//      stateful, so there's nothing to parallelize across pages
//    - Within a page the candidates are independent, so a bounded pool
//      (buffer_unordered) is safe
//
// 2. Why persist the cursor only after the whole page?
//    - If we advanced mid-page and crashed, the skipped candidates would
//      never be retried — the dedup check can't save us because they were
//      never stored
//
// 3. What does tokio::select! do here?
//    - Runs two futures and takes whichever finishes first
//    - Racing every sleep/download against token.cancelled() is what makes
//      a ten-minute cooldown interruptible
// -----------------------------------------------------------------------------
