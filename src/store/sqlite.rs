// src/store/sqlite.rs
// =============================================================================
// SQLite implementation of the ContentStore capability.
//
// Why SQLite?
// - The crawl produces one growing archive file that's trivial to ship around
// - UNIQUE(hash) gives us content deduplication for free, enforced by the
//   database rather than by racy application checks
// - INSERT OR REPLACE gives us cursor upserts in one statement
//
// Concurrency:
// - The pool is capped at ONE connection. SQLite permits only limited write
//   concurrency; a single connection keeps writes strictly ordered, so a
//   duplicate-hash race between two downloads always resolves to a clean
//   constraint violation we can swallow.
//
// Rust concepts:
// - sqlx: compile-time-agnostic async SQL with bind parameters
// - Builder-style connect options
// =============================================================================

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::debug;

use super::{ContentStore, StoreError};
use crate::language::Language;

// The schema, mirrored by the two logical relations in store/mod.rs.
// Both CREATEs are IF NOT EXISTS so init() is idempotent.
const SQL_CREATE_TABLE_CODE: &str = r#"CREATE TABLE IF NOT EXISTS "code" (
    "id"       INTEGER,
    "language" TEXT NOT NULL,
    "url"      TEXT NOT NULL,
    "content"  TEXT NOT NULL,
    "hash"     TEXT NOT NULL UNIQUE,
    "size"     INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY("id" AUTOINCREMENT)
);"#;
const SQL_CREATE_TABLE_PROGRESS: &str = r#"CREATE TABLE IF NOT EXISTS "progress" (
    "language"  TEXT NOT NULL,
    "query"     TEXT NOT NULL,
    "last_page" INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY("language", "query")
);"#;
const SQL_INSERT_CODE: &str =
    "INSERT INTO code (language, url, content, hash, size) VALUES (?, ?, ?, ?, ?)";
const SQL_COUNT_CODES: &str = "SELECT COUNT(id) FROM code";
const SQL_CODE_SIZE_BY_LANGUAGE: &str =
    "SELECT IFNULL(SUM(size), 0) FROM code WHERE language = ?";
const SQL_CODE_EXISTS: &str = "SELECT COUNT(1) FROM code WHERE hash = ?";
const SQL_GET_PROGRESS: &str = "SELECT last_page FROM progress WHERE language = ? AND query = ?";
const SQL_UPDATE_PROGRESS: &str =
    "INSERT OR REPLACE INTO progress (language, query, last_page) VALUES (?, ?, ?)";
const SQL_DROP_CODE: &str = r#"DROP TABLE IF EXISTS "code""#;
const SQL_DROP_PROGRESS: &str = r#"DROP TABLE IF EXISTS "progress""#;

/// File-backed (or in-memory) SQLite archive.
pub struct SqliteStore {
    pool: SqlitePool,
    // In-memory instances purge their tables on close; file-backed never do.
    ephemeral: bool,
}

impl SqliteStore {
    /// Opens (creating if missing) the archive database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<SqliteStore, StoreError> {
        let path = path.as_ref();

        // Make sure the directory for the database file exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // Prevent transient "database is locked" errors
            .busy_timeout(Duration::from_secs(5));

        let pool = Self::connect(opts).await?;
        Ok(SqliteStore {
            pool,
            ephemeral: false,
        })
    }

    /// Opens a throwaway in-memory store for tests. Its `close()` purges
    /// all data.
    #[cfg(test)]
    pub async fn in_memory() -> Result<SqliteStore, StoreError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:").map_err(sqlx::Error::from)?;
        let pool = Self::connect(opts).await?;
        Ok(SqliteStore {
            pool,
            ephemeral: true,
        })
    }

    async fn connect(opts: SqliteConnectOptions) -> Result<SqlitePool, StoreError> {
        // One connection: keeps writes strictly ordered under the single-writer
        // discipline the fetch engine relies on. The connection must never be
        // recycled, or an in-memory database would vanish mid-test.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        Ok(pool)
    }

    /// Direct pool access for ad-hoc inspection (used by tests).
    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Hex digest used when the remote API supplied no content hash.
    fn content_hash(content: &str) -> String {
        hex::encode(Sha256::digest(content.as_bytes()))
    }
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn init(&self) -> Result<(), StoreError> {
        for sql in [SQL_CREATE_TABLE_CODE, SQL_CREATE_TABLE_PROGRESS] {
            sqlx::query(sql).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn exists_by_hash(&self, hash: &str) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar(SQL_CODE_EXISTS)
            .bind(hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn save(
        &self,
        language: &Language,
        url: &str,
        content: &str,
        hash: &str,
    ) -> Result<(), StoreError> {
        // Content-addressed fallback: no remote hash means we derive one
        // from the bytes themselves
        let hash = if hash.is_empty() {
            Self::content_hash(content)
        } else {
            hash.to_string()
        };

        let result = sqlx::query(SQL_INSERT_CODE)
            .bind(language.name())
            .bind(url)
            .bind(content)
            .bind(&hash)
            .bind(content.len() as i64)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                // Already archived under this hash; the first row wins
                debug!(url, hash = %hash, "duplicate content hash, keeping existing row");
                Ok(())
            }
            Err(e) => {
                debug!(
                    language = language.name(),
                    url,
                    error = %e,
                    "failed to save code file"
                );
                Err(e.into())
            }
        }
    }

    async fn total_size_by_language(&self, language: &Language) -> Result<i64, StoreError> {
        let size: i64 = sqlx::query_scalar(SQL_CODE_SIZE_BY_LANGUAGE)
            .bind(language.name())
            .fetch_one(&self.pool)
            .await?;
        Ok(size)
    }

    async fn count_files(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(SQL_COUNT_CODES)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn get_progress(&self, language: &Language, query: &str) -> Result<i64, StoreError> {
        let row: Option<i64> = sqlx::query_scalar(SQL_GET_PROGRESS)
            .bind(language.name())
            .bind(query)
            .fetch_optional(&self.pool)
            .await?;
        // No cursor row means "start from the beginning"
        Ok(row.unwrap_or(0))
    }

    async fn update_progress(
        &self,
        language: &Language,
        query: &str,
        last_page: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(SQL_UPDATE_PROGRESS)
            .bind(language.name())
            .bind(query)
            .bind(last_page)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.ephemeral {
            // Test-only policy: wipe the throwaway instance
            for sql in [SQL_DROP_CODE, SQL_DROP_PROGRESS] {
                sqlx::query(sql).execute(&self.pool).await?;
            }
        }
        self.pool.close().await;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why swallow the unique-constraint violation in save()?
//    - Two concurrent downloads can fetch identical content
//    - Whoever inserts second hits UNIQUE(hash) — that's the dedup working,
//      not a failure, so the crawl must keep going
//
// 2. What is query_scalar?
//    - Runs a query expected to return a single value (one row, one column)
//    - fetch_optional returns Option<T> so "no row" isn't an error
//
// 3. WAL journal mode?
//    - Write-Ahead Logging lets readers proceed while a write is in flight
//    - A good default for an embedded database written by one process
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    async fn fresh_store() -> SqliteStore {
        let store = SqliteStore::in_memory().await.unwrap();
        store.init().await.unwrap();
        store
    }

    fn python() -> Language {
        Language::parse("python").unwrap()
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let store = fresh_store().await;
        // Second init against already-created tables must not fail
        store.init().await.unwrap();
        assert_eq!(store.count_files().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn save_and_count() {
        let store = fresh_store().await;
        store
            .save(&python(), "https://example.com/a.py", "print('a')", "hash-a")
            .await
            .unwrap();
        store
            .save(&python(), "https://example.com/b.py", "print('b')", "hash-b")
            .await
            .unwrap();
        assert_eq!(store.count_files().await.unwrap(), 2);
        assert!(store.exists_by_hash("hash-a").await.unwrap());
        assert!(!store.exists_by_hash("hash-missing").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_hash_is_a_noop_keeping_first_url() {
        let store = fresh_store().await;
        store
            .save(&python(), "https://first.example/a.py", "content", "dup")
            .await
            .unwrap();
        // Same hash, different URL: silently accepted, not inserted
        store
            .save(&python(), "https://second.example/a.py", "content", "dup")
            .await
            .unwrap();

        assert_eq!(store.count_files().await.unwrap(), 1);
        let url: String = sqlx::query_scalar("SELECT url FROM code WHERE hash = ?")
            .bind("dup")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(url, "https://first.example/a.py");
    }

    #[tokio::test]
    async fn empty_hash_falls_back_to_content_hash() {
        let store = fresh_store().await;
        store
            .save(&python(), "https://example.com/a.py", "print('x')", "")
            .await
            .unwrap();
        // Saving the same content with an empty hash again dedups
        store
            .save(&python(), "https://example.com/copy.py", "print('x')", "")
            .await
            .unwrap();
        assert_eq!(store.count_files().await.unwrap(), 1);

        let expected = SqliteStore::content_hash("print('x')");
        assert!(store.exists_by_hash(&expected).await.unwrap());
    }

    #[tokio::test]
    async fn total_size_sums_only_the_requested_language() {
        let store = fresh_store().await;
        let go = Language::parse("go").unwrap();

        store
            .save(&python(), "u1", "12345", "h1")
            .await
            .unwrap();
        store
            .save(&python(), "u2", "1234567890", "h2")
            .await
            .unwrap();
        store.save(&go, "u3", "123", "h3").await.unwrap();

        assert_eq!(store.total_size_by_language(&python()).await.unwrap(), 15);
        assert_eq!(store.total_size_by_language(&go).await.unwrap(), 3);
        // A language with nothing stored reports 0, not an error
        let java = Language::parse("java").unwrap();
        assert_eq!(store.total_size_by_language(&java).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn progress_defaults_to_zero_and_upserts() {
        let store = fresh_store().await;
        let lang = python();

        assert_eq!(store.get_progress(&lang, "query").await.unwrap(), 0);

        store.update_progress(&lang, "query", 7).await.unwrap();
        assert_eq!(store.get_progress(&lang, "query").await.unwrap(), 7);

        // Upsert replaces the existing cursor instead of appending
        store.update_progress(&lang, "query", 9).await.unwrap();
        assert_eq!(store.get_progress(&lang, "query").await.unwrap(), 9);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM progress")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);

        // A different pair is tracked independently
        assert_eq!(store.get_progress(&lang, "other").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn close_checkpoints_the_wal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.db");

        let store = SqliteStore::open(&path).await.unwrap();
        store.init().await.unwrap();
        store
            .save(&python(), "https://example.com/a.py", "print('a')", "h")
            .await
            .unwrap();
        store.close().await.unwrap();

        // A clean close checkpoints the write-ahead log back into the main
        // database file, leaving no (or an empty) -wal sidecar behind
        let wal = dir.path().join("archive.db-wal");
        let wal_len = std::fs::metadata(&wal).map(|m| m.len()).unwrap_or(0);
        assert_eq!(wal_len, 0);
    }

    #[tokio::test]
    async fn file_backed_store_survives_close_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.db");

        let store = SqliteStore::open(&path).await.unwrap();
        store.init().await.unwrap();
        store
            .save(&python(), "https://example.com/a.py", "print('a')", "keep")
            .await
            .unwrap();
        store.update_progress(&python(), "q", 4).await.unwrap();
        store.close().await.unwrap();

        // File-backed close must NOT purge anything
        let reopened = SqliteStore::open(&path).await.unwrap();
        reopened.init().await.unwrap();
        assert_eq!(reopened.count_files().await.unwrap(), 1);
        assert_eq!(reopened.get_progress(&python(), "q").await.unwrap(), 4);
        reopened.close().await.unwrap();
    }
}
