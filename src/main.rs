// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up structured logging (tracing)
// 3. Wire the store, the GitHub client, and the fetch engine together
// 4. Run the crawl, with Ctrl-C handling for graceful shutdown
// 5. Exit with proper code (0 = success, 1 = error, 130 = interrupted)
//
// Rust concepts used:
// - async/await: The whole crawl is async network + database I/O
// - Arc<dyn Trait>: The engine holds its collaborators as capabilities
// - Result<T, E>: For error handling with the ? operator
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli; // src/cli.rs - command-line parsing
mod fetch; // src/fetch/ - the resumable crawl engine
mod github; // src/github/ - code host client (search + download)
mod language; // src/language/ - language filter table
mod store; // src/store/ - SQLite content archive

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser; // Parser trait enables the parse() method
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use fetch::{FetchConfig, FetchEngine, FetchError};
use github::GithubClient;
use language::Language;
use store::{ContentStore, SqliteStore};

// The #[tokio::main] attribute transforms our async main into a real main
// function: it creates a tokio runtime and runs our async code inside it
#[tokio::main]
async fn main() {
    // RUST_LOG overrides the default level, e.g. RUST_LOG=codefetch=debug
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // If an unexpected error occurred, print it and exit non-zero
            eprintln!("Error: {:#}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

// The main application logic
// Returns:
//   Ok(0)   = crawl completed (budget reached or query exhausted)
//   Ok(130) = interrupted by Ctrl-C after a clean unwind
//   Err     = configuration or crawl error
async fn run() -> Result<i32> {
    // Parse command-line arguments into our Cli struct
    // This will automatically handle --help, --version, etc.
    let cli = Cli::parse();

    // Configuration errors fail fast, before any crawl state is touched
    let language = Language::parse(&cli.language)?;

    info!(
        language = language.name(),
        query = %cli.query,
        db = %cli.db,
        "starting crawl"
    );

    // Open (or create) the archive database and make sure the schema exists
    let store = Arc::new(
        SqliteStore::open(&cli.db)
            .await
            .with_context(|| format!("opening database {}", cli.db))?,
    );
    store.init().await.context("initializing database schema")?;

    let host = Arc::new(GithubClient::new(&cli.user, &cli.token)?);

    let config = FetchConfig {
        request_delay: Duration::from_millis(cli.request_delay_ms),
        concurrency: cli.concurrency,
        ..FetchConfig::default()
    };
    let engine = FetchEngine::new(host, Arc::clone(&store) as Arc<dyn ContentStore>, config);

    // First Ctrl-C cancels the token so in-flight work unwinds cleanly;
    // a second Ctrl-C force-quits immediately
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupt received - finishing in-flight work (Ctrl-C again to force quit)");
            signal_token.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    // Run the crawl itself
    let result = engine
        .fetch(&language, &cli.query, cli.max_total_size, &token)
        .await;

    let outcome: Result<i32> = match result {
        Ok(()) => {
            let count = store.count_files().await?;
            let bytes = store.total_size_by_language(&language).await?;
            info!(
                files = count,
                language_bytes = bytes,
                "crawl finished"
            );
            Ok(0)
        }
        Err(FetchError::Cancelled) => {
            // The cursor was persisted per page, so the next run resumes
            warn!("crawl cancelled; progress is saved");
            Ok(130)
        }
        Err(e) => Err(anyhow::Error::from(e).context("crawl failed")),
    };

    // Closed on every exit path: the WAL checkpoint must run even when
    // the crawl itself failed
    store.close().await.context("closing database")?;
    outcome
}
