//! # Filter Engine
//!
//! Exact-name and regular-expression lists used to include or exclude
//! namespaces. Patterns are compiled once when the filter is built, so a
//! malformed pattern surfaces as a configuration error and never at match
//! time.
//!
//! An empty filter (no exact names, no patterns) matches nothing when used
//! for exclusion and everything when used for inclusion.

use crate::error::{Error, Result};
use regex::Regex;

/// A union of exact names and compiled regular expressions
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    exact: Vec<String>,
    patterns: Vec<Regex>,
}

impl NameFilter {
    /// Build a filter, compiling every pattern up front
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for the first pattern that fails to compile.
    pub fn new<E, P>(exact: E, patterns: P) -> Result<Self>
    where
        E: IntoIterator,
        E::Item: Into<String>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|source| Error::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            exact: exact.into_iter().map(Into::into).collect(),
            patterns,
        })
    }

    /// True when neither exact names nor patterns are configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.patterns.is_empty()
    }

    /// True when `name` equals an exact entry or matches any pattern
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.exact.iter().any(|exact| exact == name)
            || self.patterns.iter().any(|pattern| pattern.is_match(name))
    }

    /// Blacklist semantics: an empty filter excludes nothing
    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        !self.is_empty() && self.matches(name)
    }

    /// Whitelist semantics: an empty filter includes everything
    #[must_use]
    pub fn is_included(&self, name: &str) -> bool {
        self.is_empty() || self.matches(name)
    }
}

/// Whether `name` is excluded by `filter`
#[must_use]
pub fn is_excluded(name: &str, filter: &NameFilter) -> bool {
    filter.is_excluded(name)
}

/// Whether `name` is included by `filter`
#[must_use]
pub fn is_included(name: &str, filter: &NameFilter) -> bool {
    filter.is_included(name)
}
