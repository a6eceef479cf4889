#![warn(missing_docs)]

//! fsbase path matching: glob and regex matchers selected by syntax tag
//!
//! A [`MatcherRegistry`] turns `syntax:pattern` selectors such as
//! `glob:**/*.txt` or `regex:.*\.log` into boxed [`PathMatcher`]s. Backends
//! can register their own syntaxes alongside the built-in ones.

pub mod error;
pub mod matcher;

pub use error::{MatchError, MatchResult};
pub use matcher::{
    GlobMatcher, MatcherCtor, MatcherRegistry, PathMatcher, RegexMatcher, GLOB_SYNTAX,
    REGEX_SYNTAX,
};
