use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use semver::{BuildMetadata, Prerelease};

use crate::error::ParseError;

/// Semantic version as stored by every backend.
///
/// Wraps [`semver::Version`] but leaves build metadata out of equality,
/// hashing and ordering: `1.0.0+a == 1.0.0+b`.
#[derive(Debug, Clone)]
pub struct SemanticVersion(semver::Version);

impl SemanticVersion {
    /// Create a release version with no prerelease or build metadata
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        SemanticVersion(semver::Version::new(major, minor, patch))
    }

    /// Parse `major.minor.patch[-prerelease][+build]`.
    ///
    /// Surrounding whitespace is ignored so that files written with a
    /// trailing newline read back cleanly.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ParseError::new(text, "empty version"));
        }

        semver::Version::parse(trimmed)
            .map(SemanticVersion)
            .map_err(|e| ParseError::new(trimmed, e.to_string()))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    /// Dot-separated prerelease identifiers, empty for a release
    pub fn prerelease(&self) -> Vec<&str> {
        if self.0.pre.is_empty() {
            Vec::new()
        } else {
            self.0.pre.as_str().split('.').collect()
        }
    }

    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    pub fn build(&self) -> Option<&str> {
        if self.0.build.is_empty() {
            None
        } else {
            Some(self.0.build.as_str())
        }
    }

    /// Copy with the given prerelease identifiers and no build metadata
    pub(crate) fn with_prerelease(&self, identifiers: &[String]) -> Result<Self, ParseError> {
        let joined = identifiers.join(".");
        let pre = if joined.is_empty() {
            Prerelease::EMPTY
        } else {
            Prerelease::new(&joined)
                .map_err(|e| ParseError::new(joined.clone(), e.to_string()))?
        };

        let mut inner = semver::Version::new(self.0.major, self.0.minor, self.0.patch);
        inner.pre = pre;
        inner.build = BuildMetadata::EMPTY;
        Ok(SemanticVersion(inner))
    }

    fn precedence_key(&self) -> (u64, u64, u64, &Prerelease) {
        (self.0.major, self.0.minor, self.0.patch, &self.0.pre)
    }
}

impl Default for SemanticVersion {
    fn default() -> Self {
        SemanticVersion::new(0, 0, 0)
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.precedence_key() == other.precedence_key()
    }
}

impl Eq for SemanticVersion {}

impl Hash for SemanticVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.precedence_key().hash(state);
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemanticVersion {
    // semver::Prerelease already orders "no prerelease" above any prerelease
    // and compares identifiers numerically or lexically as appropriate.
    fn cmp(&self, other: &Self) -> Ordering {
        self.precedence_key().cmp(&other.precedence_key())
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SemanticVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SemanticVersion::parse(s)
    }
}
