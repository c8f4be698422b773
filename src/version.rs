//! Version ordering for stage artifacts.
//!
//! Versions are dotted strings with optional `-` separated pre-release tokens and
//! `+` build metadata. Build metadata never affects ordering.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Compare two version strings.
///
/// Both inputs are truncated at the first `+`, `-` is treated like `.`, and the
/// resulting components are compared pairwise (missing components count as `0`).
/// Numeric components compare numerically, other components lexicographically,
/// and a numeric component always beats a non-numeric one, so `1.2.3` sorts
/// after `1.2.3-rc.1`.
pub fn compare(a: &str, b: &str) -> Ordering {
    let a_parts = components(a);
    let b_parts = components(b);

    for i in 0..a_parts.len().max(b_parts.len()) {
        let a_part = a_parts.get(i).map(String::as_str).unwrap_or("0");
        let b_part = b_parts.get(i).map(String::as_str).unwrap_or("0");

        let ordering = match (parse_numeric(a_part), parse_numeric(b_part)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (None, None) => a_part.cmp(b_part),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

fn components(version: &str) -> Vec<String> {
    let release = match version.find('+') {
        Some(idx) => &version[..idx],
        None => version,
    };
    let mut parts: Vec<String> = release.replace('-', ".").split('.').map(str::to_string).collect();
    // "1." and "1-" read as "1"; interior empties stay
    while parts.len() > 1 && parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}

// Components are 32-bit signed; anything outside that range is a string token.
fn parse_numeric(part: &str) -> Option<i32> {
    part.parse::<i32>().ok()
}

/// A version string ordered by [`compare`].
///
/// Equality follows the ordering, so `Version::new("1")` equals `Version::new("1.0.0+b")`.
/// Use [`Version::as_str`] when the exact text matters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build metadata after the first `+`, if any.
    pub fn build_metadata(&self) -> Option<&str> {
        self.0.find('+').map(|idx| &self.0[idx + 1..])
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Version {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        compare(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(&self.0, &other.0)
    }
}
