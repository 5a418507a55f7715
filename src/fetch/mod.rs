// src/fetch/mod.rs
// =============================================================================
// This module is the heart of the crawler: the resumable fetch loop.
//
// The engine walks the host's paginated search results page by page,
// downloads new files with bounded concurrency, writes them to the
// content store, and persists the page cursor after every transition so
// an interrupted crawl picks up exactly where it stopped.
//
// Submodules:
// - engine: The state machine itself
// - clock:  Injectable sleep capability so tests don't wait out cooldowns
//
// Rust concepts:
// - Modules: Organize code into namespaces
// - pub use: Re-export items to simplify imports for users of this module
// =============================================================================

mod clock;
mod engine;

// Re-export the public API
pub use clock::{Sleeper, TokioSleeper};
pub use engine::{FetchConfig, FetchEngine, FetchError};
