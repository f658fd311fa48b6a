//! Pre-release identifiers for semantic versions
//!
//! A pre-release is a label with an optional iteration number, e.g. `alpha`, `beta.2`, `rc.1`.
//! Precedence follows semver.org item 11: numeric identifiers compare numerically and sort
//! before alphanumeric ones, alphanumeric identifiers compare in ASCII order, and a pre-release
//! with fewer fields has lower precedence.

use crate::error::{MonorelError, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Label used when a pre-release line has to be started without an explicit label
pub const DEFAULT_PRE_RELEASE_LABEL: &str = "alpha";

/// Literal accepted in place of a label to force a stable release
pub const STABLE_MARKER: &str = "stable";

/// Pre-release identifier type (alpha, beta, rc, or custom)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PreReleaseType {
    Alpha,
    Beta,
    ReleaseCandidate,
    Custom(String),
}

impl PreReleaseType {
    pub fn parse(s: &str) -> Result<Self> {
        s.parse()
    }

    pub fn as_str(&self) -> &str {
        match self {
            PreReleaseType::Alpha => "alpha",
            PreReleaseType::Beta => "beta",
            PreReleaseType::ReleaseCandidate => "rc",
            PreReleaseType::Custom(s) => s,
        }
    }

    /// Label used to start a pre-release line when none can be inherited
    pub fn default_label() -> Self {
        PreReleaseType::parse(DEFAULT_PRE_RELEASE_LABEL).unwrap_or(PreReleaseType::Alpha)
    }

    /// Purely numeric identifiers (`1.0.0-3`) cannot name a pre-release line
    pub fn is_numeric(&self) -> bool {
        let s = self.as_str();
        !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
    }
}

impl FromStr for PreReleaseType {
    type Err = MonorelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "alpha" => Ok(PreReleaseType::Alpha),
            "beta" => Ok(PreReleaseType::Beta),
            "rc" => Ok(PreReleaseType::ReleaseCandidate),
            "" => Err(MonorelError::version("Empty pre-release identifier")),
            other => {
                if other.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                    Ok(PreReleaseType::Custom(other.to_string()))
                } else {
                    Err(MonorelError::version(format!(
                        "Invalid pre-release identifier: '{}'",
                        s
                    )))
                }
            }
        }
    }
}

impl fmt::Display for PreReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Ord for PreReleaseType {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.as_str(), other.as_str());
        match (self.is_numeric(), other.is_numeric()) {
            (true, true) => a
                .parse::<u64>()
                .unwrap_or(u64::MAX)
                .cmp(&b.parse::<u64>().unwrap_or(u64::MAX)),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => a.cmp(b),
        }
    }
}

impl PartialOrd for PreReleaseType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pre-release version with optional iteration number
///
/// # Examples
/// - "alpha" -> PreRelease { identifier: Alpha, iteration: None }
/// - "beta.1" -> PreRelease { identifier: Beta, iteration: Some(1) }
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreRelease {
    pub identifier: PreReleaseType,
    pub iteration: Option<u64>,
}

impl PreRelease {
    pub fn new(identifier: PreReleaseType, iteration: Option<u64>) -> Self {
        PreRelease {
            identifier,
            iteration,
        }
    }

    /// First iteration of a new pre-release line (`label.1`)
    pub fn first(identifier: PreReleaseType) -> Self {
        PreRelease::new(identifier, Some(1))
    }

    /// Parse a pre-release from its dotted form ("beta", "beta.1")
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(MonorelError::version("Empty pre-release identifier"));
        }

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() > 2 {
            return Err(MonorelError::version(format!(
                "Unsupported pre-release format: '{}' - expected label[.N]",
                s
            )));
        }

        let identifier = PreReleaseType::parse(parts[0])?;

        let iteration = if parts.len() > 1 {
            Some(parts[1].parse::<u64>().map_err(|_| {
                MonorelError::version(format!("Invalid iteration number: '{}'", parts[1]))
            })?)
        } else {
            None
        };

        Ok(PreRelease {
            identifier,
            iteration,
        })
    }

    /// Next iteration of the same pre-release line; `None` becomes `1`
    pub fn increment_iteration(&self) -> Self {
        PreRelease {
            identifier: self.identifier.clone(),
            iteration: Some(self.iteration.map_or(1, |n| n + 1)),
        }
    }
}

impl Ord for PreRelease {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identifier
            .cmp(&other.identifier)
            .then_with(|| self.iteration.cmp(&other.iteration))
    }
}

impl PartialOrd for PreRelease {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PreRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier)?;
        if let Some(iter) = self.iteration {
            write!(f, ".{}", iter)?;
        }
        Ok(())
    }
}

/// How the next version should treat pre-release labels
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PreReleaseLabel {
    /// Produce a stable version, promoting a pre-release if needed
    Stable,
    /// Continue the previous release's pre-release line, or stay stable
    #[default]
    Default,
    /// Produce a pre-release with this label
    Named(PreReleaseType),
}

impl PreReleaseLabel {
    /// Map an optional operator-supplied label, where the literal `stable` forces a stable release
    pub fn from_option(label: Option<&str>) -> Result<Self> {
        match label {
            None => Ok(PreReleaseLabel::Default),
            Some(label) => label.parse(),
        }
    }

    pub fn is_stable(&self) -> bool {
        matches!(self, PreReleaseLabel::Stable)
    }
}

impl FromStr for PreReleaseLabel {
    type Err = MonorelError;

    fn from_str(s: &str) -> Result<Self> {
        if s == STABLE_MARKER {
            Ok(PreReleaseLabel::Stable)
        } else {
            Ok(PreReleaseLabel::Named(PreReleaseType::parse(s)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prerelease_type_parse_known() {
        assert_eq!(PreReleaseType::parse("alpha").unwrap(), PreReleaseType::Alpha);
        assert_eq!(PreReleaseType::parse("beta").unwrap(), PreReleaseType::Beta);
        assert_eq!(
            PreReleaseType::parse("rc").unwrap(),
            PreReleaseType::ReleaseCandidate
        );
    }

    #[test]
    fn test_prerelease_type_parse_custom() {
        let pr = PreReleaseType::parse("nightly-build").unwrap();
        assert_eq!(pr, PreReleaseType::Custom("nightly-build".to_string()));
    }

    #[test]
    fn test_prerelease_type_parse_invalid() {
        assert!(PreReleaseType::parse("invalid!name").is_err());
        assert!(PreReleaseType::parse("invalid.name").is_err());
        assert!(PreReleaseType::parse("").is_err());
    }

    #[test]
    fn test_prerelease_parse_with_iteration() {
        let pr = PreRelease::parse("beta.1").unwrap();
        assert_eq!(pr.identifier, PreReleaseType::Beta);
        assert_eq!(pr.iteration, Some(1));
        assert_eq!(pr.to_string(), "beta.1");
    }

    #[test]
    fn test_prerelease_parse_rejects_extra_fields() {
        assert!(PreRelease::parse("beta.1.2").is_err());
        assert!(PreRelease::parse("beta.abc").is_err());
    }

    #[test]
    fn test_prerelease_increment() {
        let pr = PreRelease::parse("rc.99").unwrap();
        assert_eq!(pr.increment_iteration().iteration, Some(100));

        let bare = PreRelease::new(PreReleaseType::Alpha, None);
        assert_eq!(bare.increment_iteration().to_string(), "alpha.1");
    }

    #[test]
    fn test_prerelease_precedence() {
        let alpha1 = PreRelease::parse("alpha.1").unwrap();
        let alpha2 = PreRelease::parse("alpha.2").unwrap();
        let alpha = PreRelease::parse("alpha").unwrap();
        let beta1 = PreRelease::parse("beta.1").unwrap();
        let rc1 = PreRelease::parse("rc.1").unwrap();

        assert!(alpha < alpha1);
        assert!(alpha1 < alpha2);
        assert!(alpha2 < beta1);
        assert!(beta1 < rc1);
    }

    #[test]
    fn test_numeric_identifiers_sort_first() {
        let numeric = PreRelease::parse("3").unwrap();
        let named = PreRelease::parse("alpha").unwrap();
        assert!(numeric.identifier.is_numeric());
        assert!(numeric < named);
        assert!(PreRelease::parse("2").unwrap() < PreRelease::parse("10").unwrap());
    }

    #[test]
    fn test_label_stable_marker() {
        assert_eq!(
            PreReleaseLabel::from_option(Some("stable")).unwrap(),
            PreReleaseLabel::Stable
        );
        assert_eq!(
            PreReleaseLabel::from_option(None).unwrap(),
            PreReleaseLabel::Default
        );
        assert_eq!(
            PreReleaseLabel::from_option(Some("beta")).unwrap(),
            PreReleaseLabel::Named(PreReleaseType::Beta)
        );
    }
}
