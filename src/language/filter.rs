// src/language/filter.rs
// =============================================================================
// This module maps user-supplied language names to search filters.
//
// Responsibilities:
// - Parse a name like "py3" or "C#" into a Language (or fail fast)
// - Build the `extension:py+extension:py3+language:Python` query fragment
// - Validate that a search-result path actually carries an accepted extension
//   (GitHub code search sometimes returns files outside the requested set)
//
// Rust concepts:
// - Enums as fixed configuration tables (no mutable globals)
// - String slices (&str) vs owned Strings
// - Result for validation that can fail
// =============================================================================

use thiserror::Error;

/// Errors produced while resolving or applying a language filter.
///
/// These are configuration-class errors: they happen before any crawl
/// state is touched and are never retried.
#[derive(Debug, Error, PartialEq)]
pub enum LanguageError {
    /// The user asked for a language we don't have in the table
    #[error("unknown language: {0} (available: {1})")]
    Unknown(String, String),

    /// A search result path had no `.`-delimited extension at all
    #[error("file {0} has no extension")]
    NoExtension(String),

    /// A search result path had an extension outside the accepted set
    #[error("file {0} has invalid extension for language {1}")]
    ExtensionMismatch(String, String),
}

// The fixed language table: (canonical GitHub name, aliases, extensions).
// Order matters only for deterministic query strings within one run.
const LANGUAGE_TABLE: &[(&str, &[&str], &[&str])] = &[
    ("Python", &["python", "python3", "py", "py3"], &["py", "py3"]),
    ("Go", &["go", "golang"], &["go"]),
    ("C#", &["c#", "csharp"], &["cs"]),
    (
        "C++",
        &["c++", "cpp"],
        // Uppercase .C/.H are a long-standing C++ convention, and the
        // extension check is case-sensitive
        &["cpp", "hpp", "cxx", "hxx", "cc", "hh", "c", "h", "C", "H"],
    ),
    ("C", &["c"], &["c", "h"]),
    ("Java", &["java"], &["java"]),
    ("JavaScript", &["javascript", "js"], &["js"]),
    ("Kotlin", &["kotlin", "kt"], &["kt"]),
];

/// A crawl target language: canonical name plus accepted file extensions.
///
/// Immutable once parsed. Cloning is cheap because everything points at
/// the static table.
#[derive(Debug, Clone, PartialEq)]
pub struct Language {
    name: &'static str,
    extensions: &'static [&'static str],
}

impl Language {
    /// Resolves a user-supplied name into a Language.
    ///
    /// Matching is case-insensitive against the alias list, so "PY3",
    /// "Python" and "py" all resolve to the same entry. Unknown names
    /// fail with a list of what is available.
    pub fn parse(name: &str) -> Result<Language, LanguageError> {
        let lowered = name.to_lowercase();
        for (canonical, aliases, extensions) in LANGUAGE_TABLE {
            if aliases.contains(&lowered.as_str()) {
                return Ok(Language {
                    name: canonical,
                    extensions,
                });
            }
        }
        Err(LanguageError::Unknown(name.to_string(), Self::all_names()))
    }

    /// Canonical name as GitHub spells it ("Python", "C#", ...).
    pub fn name(&self) -> &str {
        self.name
    }

    /// Comma-separated list of canonical names, for CLI help and errors.
    pub fn all_names() -> String {
        LANGUAGE_TABLE
            .iter()
            .map(|(name, _, _)| *name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Builds the filter fragment appended to every search query.
    ///
    /// For Python this produces:
    ///   extension:py+extension:py3+language:Python
    ///
    /// The order follows the table, so queries are reproducible within
    /// a single run.
    pub fn query_filter(&self) -> String {
        let mut parts: Vec<String> = self
            .extensions
            .iter()
            .map(|ext| format!("extension:{}", ext))
            .collect();
        parts.push(format!("language:{}", self.name));
        parts.join("+")
    }

    /// Checks that a result path carries one of our accepted extensions.
    ///
    /// The extension is whatever follows the LAST dot in the path, so
    /// "/.hidden/main.py" is fine (extension "py") while "Makefile"
    /// fails outright (no dot at all).
    pub fn validate_path(&self, path: &str) -> Result<(), LanguageError> {
        let dot = path
            .rfind('.')
            .ok_or_else(|| LanguageError::NoExtension(path.to_string()))?;

        let extension = &path[dot + 1..];
        if self.extensions.contains(&extension) {
            return Ok(());
        }

        Err(LanguageError::ExtensionMismatch(
            path.to_string(),
            self.name.to_string(),
        ))
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why a const table instead of a global mutable registry?
//    - The set of languages never changes at runtime
//    - A &'static table costs nothing and needs no locking
//    - Each Language just borrows from it, so Clone is trivially cheap
//
// 2. What is rfind('.')?
//    - Searches from the END of the string for the last dot
//    - "archive.tar.gz" -> extension "gz", not "tar.gz"
//    - Returns Option<usize>: None means there's no dot at all
//
// 3. Why does validate_path exist if the query already filters?
//    - GitHub code search occasionally returns near-miss paths
//    - Checking locally keeps junk files out of the archive
// -----------------------------------------------------------------------------
