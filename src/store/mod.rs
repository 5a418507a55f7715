// src/store/mod.rs
// =============================================================================
// This module persists everything the crawler must not lose.
//
// Two logical relations live here:
// - code:     one row per fetched file, keyed by a UNIQUE content hash
//             (this is where deduplication is actually enforced)
// - progress: one row per (language, query) pair remembering the last
//             page we reached, so an interrupted crawl resumes cleanly
//
// The fetch engine only talks to the ContentStore trait, so the storage
// engine (file-backed SQLite vs in-memory for tests) is swappable without
// touching the crawl logic.
//
// Rust concepts:
// - async-trait: async methods on a trait object
// - Trait objects (dyn ContentStore) as a capability boundary
// =============================================================================

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::language::Language;

/// The cursor value meaning "this (language, query) pair is fully crawled."
///
/// Stored in the progress relation like any other page number; a fetch that
/// resumes onto this value returns immediately without issuing a request.
pub const PAGE_EXHAUSTED: i64 = -1;

/// Errors from the persistence layer.
///
/// Note that a duplicate-hash insert is NOT an error — `save` swallows it
/// on purpose, because two downloads racing on identical content must not
/// fail the crawl.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("could not create database directory: {0}")]
    CreateDir(#[from] std::io::Error),
}

/// Durable record of fetched files and crawl progress.
///
/// Implementations must serialize writes internally (single-writer
/// discipline): concurrent downloads all write through one handle, and a
/// unique-hash conflict must resolve to "already stored, no-op" rather
/// than corruption.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Creates both relations if absent. Safe to call on an
    /// already-initialized store.
    async fn init(&self) -> Result<(), StoreError>;

    /// Fast lookup used to skip re-downloading content we already hold.
    async fn exists_by_hash(&self, hash: &str) -> Result<bool, StoreError>;

    /// Inserts one fetched file.
    ///
    /// If `hash` is empty the store computes a content-addressed hash
    /// itself. A uniqueness violation on the hash column is treated as
    /// success: the content is already archived and the original row
    /// (including its URL) is retained.
    async fn save(
        &self,
        language: &Language,
        url: &str,
        content: &str,
        hash: &str,
    ) -> Result<(), StoreError>;

    /// Total stored bytes for one language; 0 when nothing is stored yet.
    async fn total_size_by_language(&self, language: &Language) -> Result<i64, StoreError>;

    /// Number of archived files across all languages.
    async fn count_files(&self) -> Result<i64, StoreError>;

    /// Last recorded page for the pair, or 0 ("start from the beginning")
    /// when no cursor row exists. A missing row is never an error.
    async fn get_progress(&self, language: &Language, query: &str) -> Result<i64, StoreError>;

    /// Upserts the cursor for the pair — replaces, never appends.
    async fn update_progress(
        &self,
        language: &Language,
        query: &str,
        last_page: i64,
    ) -> Result<(), StoreError>;

    /// Releases underlying resources. Ephemeral (in-memory) instances also
    /// purge their data; file-backed stores never do.
    async fn close(&self) -> Result<(), StoreError>;
}
