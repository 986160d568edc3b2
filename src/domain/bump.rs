//! Version bumps
//!
//! A [`BumpSpec`] is a pure description of how to advance a version; it
//! never touches storage. Stores call [`BumpSpec::apply`] inside their
//! compare-and-set loop, once per attempt, against whatever they just read.

use std::fmt;
use std::str::FromStr;

use crate::domain::version::SemanticVersion;
use crate::error::ParseError;

/// How to advance a [`SemanticVersion`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BumpSpec {
    /// `1.2.3` -> `2.0.0`
    Major,
    /// `1.2.3` -> `1.3.0`
    Minor,
    /// `1.2.3` -> `1.2.4`
    Patch,
    /// `1.2.3-rc.1` -> `1.2.3`
    Final,
    /// `1.2.3` -> `1.2.3-rc.1`, `1.2.3-rc.1` -> `1.2.3-rc.2`
    Prerelease(String),
    /// `1.2.3` -> `1.2.3-alpha`, no counter
    PrereleaseWithoutVersion(String),
    /// Apply each bump in order
    Chain(Vec<BumpSpec>),
}

impl BumpSpec {
    /// Build a bump from pipeline-style parameters.
    ///
    /// `bump` names the numeric part (`major`, `minor`, `patch`, `final`)
    /// and `pre` an optional prerelease applied after it, so
    /// `("patch", "rc")` on `1.2.3` yields `1.2.4-rc.1`.
    pub fn from_params(
        bump: Option<&str>,
        pre: Option<&str>,
        pre_without_version: bool,
    ) -> Result<BumpSpec, ParseError> {
        let mut steps = Vec::new();

        if let Some(name) = bump.filter(|s| !s.is_empty()) {
            steps.push(name.parse::<BumpSpec>()?);
        }

        if let Some(identifier) = pre.filter(|s| !s.is_empty()) {
            validate_identifier(identifier)?;
            if pre_without_version {
                steps.push(BumpSpec::PrereleaseWithoutVersion(identifier.to_string()));
            } else {
                steps.push(BumpSpec::Prerelease(identifier.to_string()));
            }
        }

        match steps.len() {
            0 => Err(ParseError::new(
                "",
                "a bump or a prerelease identifier is required",
            )),
            1 => Ok(steps.remove(0)),
            _ => Ok(BumpSpec::Chain(steps)),
        }
    }

    /// Compute the successor of `current`.
    ///
    /// Every bump drops build metadata. Fails only on an invalid
    /// prerelease identifier or numeric overflow.
    pub fn apply(&self, current: &SemanticVersion) -> Result<SemanticVersion, ParseError> {
        match self {
            BumpSpec::Major => Ok(SemanticVersion::new(increment(current.major(), current)?, 0, 0)),
            BumpSpec::Minor => Ok(SemanticVersion::new(
                current.major(),
                increment(current.minor(), current)?,
                0,
            )),
            BumpSpec::Patch => Ok(SemanticVersion::new(
                current.major(),
                current.minor(),
                increment(current.patch(), current)?,
            )),
            BumpSpec::Final => current.with_prerelease(&[]),
            BumpSpec::Prerelease(identifier) => {
                validate_identifier(identifier)?;
                let pre = current.prerelease();
                let next = match pre.as_slice() {
                    [id, n] if *id == identifier.as_str() && is_counter(n) => n
                        .parse::<u64>()
                        .ok()
                        .and_then(|n| n.checked_add(1))
                        .ok_or_else(|| {
                            ParseError::new(current.to_string(), "prerelease counter overflow")
                        })?,
                    _ => 1,
                };
                current.with_prerelease(&[identifier.clone(), next.to_string()])
            }
            BumpSpec::PrereleaseWithoutVersion(identifier) => {
                validate_identifier(identifier)?;
                current.with_prerelease(&[identifier.clone()])
            }
            BumpSpec::Chain(steps) => steps
                .iter()
                .try_fold(current.clone(), |version, step| step.apply(&version)),
        }
    }
}

fn increment(field: u64, current: &SemanticVersion) -> Result<u64, ParseError> {
    field
        .checked_add(1)
        .ok_or_else(|| ParseError::new(current.to_string(), "version field overflow"))
}

fn is_counter(identifier: &str) -> bool {
    !identifier.is_empty() && identifier.bytes().all(|b| b.is_ascii_digit())
}

fn validate_identifier(identifier: &str) -> Result<(), ParseError> {
    if identifier.is_empty() {
        return Err(ParseError::new(identifier, "empty prerelease identifier"));
    }

    if !identifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(ParseError::new(
            identifier,
            "prerelease identifier may only contain ASCII letters, digits and '-'",
        ));
    }

    Ok(())
}

impl FromStr for BumpSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "major" => Ok(BumpSpec::Major),
            "minor" => Ok(BumpSpec::Minor),
            "patch" => Ok(BumpSpec::Patch),
            "final" => Ok(BumpSpec::Final),
            _ => Err(ParseError::new(
                s,
                "unknown bump, expected major, minor, patch or final",
            )),
        }
    }
}

impl fmt::Display for BumpSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BumpSpec::Major => write!(f, "major"),
            BumpSpec::Minor => write!(f, "minor"),
            BumpSpec::Patch => write!(f, "patch"),
            BumpSpec::Final => write!(f, "final"),
            BumpSpec::Prerelease(id) => write!(f, "pre {}", id),
            BumpSpec::PrereleaseWithoutVersion(id) => write!(f, "pre {} (no counter)", id),
            BumpSpec::Chain(steps) => {
                for (i, step) in steps.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    write!(f, "{}", step)?;
                }
                Ok(())
            }
        }
    }
}
