// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// clap is a popular Rust library for parsing command-line arguments.
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things).
//
// The core engine never sees any of this: by the time fetch() runs, the
// language is parsed, credentials are present, and the budget is a number.
//
// Rust concepts:
// - Structs: Custom data types that group related data
// - Derive macros: Automatically generate code for our types
// =============================================================================

use clap::Parser;

// This struct represents our entire CLI application
//
// #[derive(Parser)] tells clap to automatically generate parsing code
// The #[command(...)] attributes configure how the CLI behaves
#[derive(Parser, Debug)]
#[command(
    name = "codefetch",
    version,
    about = "Crawls GitHub code search and archives source files per language",
    long_about = "codefetch walks GitHub code-search results for a language and query, \
                  downloads matching files, deduplicates them by content hash, and stores \
                  them in a SQLite archive. Progress is saved per (language, query) pair, \
                  so an interrupted crawl resumes where it left off."
)]
pub struct Cli {
    /// Language to crawl (e.g. python, go, c++, java)
    ///
    /// This is a positional argument (required, no flag needed).
    /// Aliases like "py3" or "golang" work too.
    pub language: String,

    /// Free-text search query the language filter is appended to
    ///
    /// Example: codefetch python "machine learning"
    pub query: String,

    /// Path of the SQLite archive database
    #[arg(long, default_value = "codefetch.db")]
    pub db: String,

    /// GitHub username for basic authentication
    #[arg(long, env = "GITHUB_USER")]
    pub user: String,

    /// GitHub personal access token
    ///
    /// Prefer the environment variable so the token stays out of shell
    /// history.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Stop once this many bytes are stored for the language
    ///
    /// The cursor is left in place, so re-running with a larger budget
    /// continues the same crawl.
    #[arg(long, default_value_t = 512 * 1024 * 1024)]
    pub max_total_size: i64,

    /// Courtesy delay in milliseconds before every request
    ///
    /// Raising this is the polite way to stay under the rate limit.
    #[arg(long, default_value_t = 1000)]
    pub request_delay_ms: u64,

    /// Concurrent downloads within one result page
    ///
    /// The default of 1 serializes downloads, which avoids tripping the
    /// host's secondary rate limit.
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Positional vs flag arguments?
//    - Fields without #[arg(long)] become positional (required, in order)
//    - #[arg(long)] turns a field into a --flag-name option
//
// 2. What does env = "GITHUB_TOKEN" do?
//    - clap falls back to the environment variable when the flag is absent
//    - hide_env_values keeps the secret out of --help output
//
// 3. Why is the budget an i64 and not a usize?
//    - It's compared against a SUM() from SQLite, which hands back i64
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_invocation() {
        let cli = Cli::parse_from([
            "codefetch",
            "python",
            "machine learning",
            "--user",
            "octocat",
            "--token",
            "secret",
        ]);
        assert_eq!(cli.language, "python");
        assert_eq!(cli.query, "machine learning");
        assert_eq!(cli.db, "codefetch.db");
        assert_eq!(cli.concurrency, 1);
        assert_eq!(cli.request_delay_ms, 1000);
    }

    #[test]
    fn missing_credentials_fail_fast() {
        // No --user/--token flags; only passes if the env fallback is unset
        if std::env::var("GITHUB_USER").is_err() && std::env::var("GITHUB_TOKEN").is_err() {
            let result = Cli::try_parse_from(["codefetch", "python", "q"]);
            assert!(result.is_err());
        }
    }

    #[test]
    fn overrides_are_honored() {
        let cli = Cli::parse_from([
            "codefetch",
            "go",
            "*",
            "--user",
            "octocat",
            "--token",
            "secret",
            "--db",
            "/tmp/archive.db",
            "--max-total-size",
            "1024",
            "--request-delay-ms",
            "250",
            "--concurrency",
            "4",
        ]);
        assert_eq!(cli.db, "/tmp/archive.db");
        assert_eq!(cli.max_total_size, 1024);
        assert_eq!(cli.request_delay_ms, 250);
        assert_eq!(cli.concurrency, 4);
    }
}
