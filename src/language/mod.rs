// src/language/mod.rs
// =============================================================================
// This module defines which programming languages we can crawl.
//
// A Language bundles three things:
// - The canonical name GitHub uses in search queries (e.g. "Python")
// - The set of file extensions we accept for that language
// - The query-filter fragment appended to every search
//
// The enumeration is fixed at compile time; user input is matched against
// a list of case-insensitive aliases ("py", "python3", "golang", ...).
//
// Rust concepts:
// - Modules: Organize code into namespaces
// - pub use: Re-export items to simplify imports for users of this module
// =============================================================================

mod filter;

// Re-export the public API so callers write `language::Language`
// instead of `language::filter::Language`
pub use filter::Language;
