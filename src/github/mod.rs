// src/github/mod.rs
// =============================================================================
// This module talks to the code host (GitHub).
//
// Two external services live behind one trait:
// - The paged code-search API: query in, a page of candidates out, plus
//   rate-limit metadata and a "has next page" signal
// - Content retrieval: candidate in, decoded file text out (with a hard
//   per-file size ceiling)
//
// The fetch engine only sees the CodeHost trait, so tests swap in a mock
// host and never touch the network.
//
// Rust concepts:
// - Traits as interface boundaries to external collaborators
// - pub use: Re-export items to simplify imports for users of this module
// =============================================================================

mod client;
mod types;

// Re-export the public API
pub use client::GithubClient;
pub use types::{Candidate, CodeHost, DownloadError, RateInfo, SearchError, SearchPage};
