//! Path matchers and the syntax-tag registry that builds them.

use globset::{Glob, GlobBuilder};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;

use crate::error::{MatchError, MatchResult};

/// Tag for glob patterns.
pub const GLOB_SYNTAX: &str = "glob";
/// Tag for regular expressions.
pub const REGEX_SYNTAX: &str = "regex";

/// Decides whether a path string matches.
pub trait PathMatcher: Send + Sync + fmt::Debug {
    /// Returns true if `path` matches in full.
    fn matches(&self, path: &str) -> bool;
}

/// Glob matcher; `*` and `?` never cross a `/`, `**` does.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    glob: Glob,
    matcher: globset::GlobMatcher,
}

impl GlobMatcher {
    /// Compiles a glob pattern.
    pub fn new(pattern: &str) -> MatchResult<Self> {
        let glob = GlobBuilder::new(pattern).literal_separator(true).build()?;
        let matcher = glob.compile_matcher();
        Ok(Self { glob, matcher })
    }

    /// Returns the source pattern.
    pub fn pattern(&self) -> &str {
        self.glob.glob()
    }
}

impl PathMatcher for GlobMatcher {
    fn matches(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }
}

/// Regular-expression matcher, anchored at both ends.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    source: String,
    regex: Regex,
}

impl RegexMatcher {
    /// Compiles a regular expression that must match the whole path.
    pub fn new(pattern: &str) -> MatchResult<Self> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Returns the source pattern.
    pub fn pattern(&self) -> &str {
        &self.source
    }
}

impl PathMatcher for RegexMatcher {
    fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Builds a matcher from a pattern.
pub type MatcherCtor = fn(&str) -> MatchResult<Box<dyn PathMatcher>>;

fn glob_ctor(pattern: &str) -> MatchResult<Box<dyn PathMatcher>> {
    Ok(Box::new(GlobMatcher::new(pattern)?))
}

fn regex_ctor(pattern: &str) -> MatchResult<Box<dyn PathMatcher>> {
    Ok(Box::new(RegexMatcher::new(pattern)?))
}

/// Maps a syntax tag to a matcher constructor.
///
/// Selectors take the form `syntax:pattern`; tags compare case-insensitively.
#[derive(Clone)]
pub struct MatcherRegistry {
    ctors: HashMap<String, MatcherCtor>,
}

impl fmt::Debug for MatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatcherRegistry")
            .field("syntaxes", &self.syntaxes())
            .finish()
    }
}

impl MatcherRegistry {
    /// Creates a registry with no syntaxes.
    pub fn empty() -> Self {
        Self {
            ctors: HashMap::new(),
        }
    }

    /// Creates a registry knowing `glob` and `regex`.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(GLOB_SYNTAX, glob_ctor);
        registry.register(REGEX_SYNTAX, regex_ctor);
        registry
    }

    /// Adds or replaces the constructor for `syntax`.
    pub fn register(&mut self, syntax: &str, ctor: MatcherCtor) -> Option<MatcherCtor> {
        tracing::debug!("Registering path matcher syntax '{}'", syntax);
        self.ctors.insert(syntax.to_ascii_lowercase(), ctor)
    }

    /// Returns true if a constructor exists for `syntax`.
    pub fn supports(&self, syntax: &str) -> bool {
        self.ctors.contains_key(&syntax.to_ascii_lowercase())
    }

    /// Returns the registered tags, sorted.
    pub fn syntaxes(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.ctors.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Builds a matcher from an explicit syntax tag and pattern.
    pub fn build(&self, syntax: &str, pattern: &str) -> MatchResult<Box<dyn PathMatcher>> {
        let ctor = self
            .ctors
            .get(&syntax.to_ascii_lowercase())
            .ok_or_else(|| MatchError::UnknownSyntax {
                syntax: syntax.to_string(),
            })?;
        ctor(pattern)
    }

    /// Builds a matcher from a `syntax:pattern` selector.
    pub fn compile(&self, selector: &str) -> MatchResult<Box<dyn PathMatcher>> {
        let (syntax, pattern) =
            selector
                .split_once(':')
                .ok_or_else(|| MatchError::MissingSyntax {
                    selector: selector.to_string(),
                })?;
        self.build(syntax, pattern)
    }
}

impl Default for MatcherRegistry {
    fn default() -> Self {
        Self::new()
    }
}
