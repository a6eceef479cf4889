//! Error types for path matchers.

use thiserror::Error;

/// Result type alias for matcher construction.
pub type MatchResult<T> = Result<T, MatchError>;

/// Error variants for matcher construction.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The selector had no `syntax:` prefix.
    #[error("Missing syntax in selector '{selector}' (expected 'syntax:pattern')")]
    MissingSyntax {
        /// The rejected selector.
        selector: String,
    },

    /// No constructor is registered for the syntax tag.
    #[error("Unknown matcher syntax: {syntax}")]
    UnknownSyntax {
        /// The unrecognized tag.
        syntax: String,
    },

    /// Invalid glob pattern.
    #[error("Glob error: {0}")]
    Glob(#[from] globset::Error),

    /// Invalid regular expression.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}
