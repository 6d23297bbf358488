//! Glob-style tool name patterns
//!
//! `*` matches any run of characters (including none); everything else is
//! literal. Matching is case-insensitive and anchored at both ends.

use regex::{Regex, RegexBuilder};
use tracing::warn;

/// Separator between backend and tool in a qualified tool name
pub const QUALIFIED_SEPARATOR: &str = "__";

/// Build the qualified `backend__tool` name patterns are applied to
pub fn qualified_name(backend: &str, tool: &str) -> String {
    format!("{}{}{}", backend, QUALIFIED_SEPARATOR, tool)
}

/// Compile one glob into an anchored, case-insensitive regex
fn compile(pattern: &str) -> Option<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");

    match RegexBuilder::new(&format!("^{}$", body))
        .case_insensitive(true)
        .build()
    {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Ignoring unusable pattern '{}': {}", pattern, e);
            None
        }
    }
}

/// True if `candidate` fully matches any of `patterns`
pub fn matches<S: AsRef<str>>(candidate: &str, patterns: &[S]) -> bool {
    patterns
        .iter()
        .filter_map(|p| compile(p.as_ref()))
        .any(|re| re.is_match(candidate))
}

/// A pre-compiled, ordered set of glob patterns
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<String>,
    compiled: Vec<Regex>,
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            compiled: patterns.iter().filter_map(|p| compile(p.as_ref())).collect(),
        }
    }

    /// True if `candidate` fully matches any pattern in the set
    pub fn matches(&self, candidate: &str) -> bool {
        self.compiled.iter().any(|re| re.is_match(candidate))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
