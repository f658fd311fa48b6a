use crate::domain::prerelease::{PreRelease, PreReleaseLabel, PreReleaseType};
use crate::error::{MonorelError, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Semantic version representation
///
/// Ordering is semver precedence: the numeric core first, then a stable version ranks above
/// any pre-release sharing its core.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<PreRelease>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
            pre: None,
        }
    }

    pub fn with_pre(mut self, pre: PreRelease) -> Self {
        self.pre = Some(pre);
        self
    }

    /// The `0.0.0` sentinel that precedes every real release
    pub fn initial() -> Self {
        Version::new(0, 0, 0)
    }

    pub fn is_initial(&self) -> bool {
        *self == Version::initial()
    }

    pub fn is_stable(&self) -> bool {
        self.pre.is_none()
    }

    pub fn is_pre_release(&self) -> bool {
        self.pre.is_some()
    }

    /// `x.0.0` style version that opens a new major line
    pub fn is_major(&self) -> bool {
        self.minor == 0 && self.patch == 0
    }

    /// The version without its pre-release part
    pub fn core(&self) -> Version {
        Version::new(self.major, self.minor, self.patch)
    }

    /// Tag name of this release (`v1.2.3`, `v2.0.0-rc.1`)
    pub fn tag_name(&self) -> String {
        format!("v{}", self)
    }

    /// Parse version from a tag or version string ("v1.2.3-beta.1", "1.2.3")
    pub fn parse(tag: &str) -> Result<Self> {
        let clean_tag = tag.strip_prefix('v').unwrap_or(tag);

        let parsed = semver::Version::parse(clean_tag).map_err(|e| {
            MonorelError::version(format!("Invalid version format: '{}' - {}", tag, e))
        })?;

        if !parsed.build.is_empty() {
            return Err(MonorelError::version(format!(
                "Build metadata is not supported in release versions: '{}'",
                tag
            )));
        }

        let pre = if parsed.pre.is_empty() {
            None
        } else {
            Some(PreRelease::parse(parsed.pre.as_str())?)
        };

        Ok(Version {
            major: parsed.major,
            minor: parsed.minor,
            patch: parsed.patch,
            pre,
        })
    }

    /// Bump the numeric core, dropping any pre-release part
    pub fn bump(&self, bump_type: &VersionBump) -> Self {
        match bump_type {
            VersionBump::Major => Version::new(self.major + 1, 0, 0),
            VersionBump::Minor => Version::new(self.major, self.minor + 1, 0),
            VersionBump::Patch => Version::new(self.major, self.minor, self.patch + 1),
        }
    }

    /// Whether this pre-release's core already represents the requested bump,
    /// e.g. `2.0.0-rc.1` already carries a major bump.
    fn core_covers(&self, bump_type: &VersionBump) -> bool {
        if self.is_stable() {
            return false;
        }
        match bump_type {
            VersionBump::Major => self.minor == 0 && self.patch == 0,
            VersionBump::Minor => self.patch == 0,
            VersionBump::Patch => true,
        }
    }

    /// Compute the next version for a bump type and pre-release label
    ///
    /// A pre-release whose core covers the bump is promoted (stable) or advanced
    /// (same label gets the next iteration, another label starts at `.1`); otherwise the core is
    /// bumped and `label.1` is appended. Fails if the result would not be greater than `self`.
    pub fn increment(&self, bump_type: &VersionBump, label: &PreReleaseLabel) -> Result<Version> {
        let target_label = match label {
            PreReleaseLabel::Stable => None,
            PreReleaseLabel::Named(label) => Some(label.clone()),
            PreReleaseLabel::Default => self.pre.as_ref().map(|pre| {
                if pre.identifier.is_numeric() {
                    PreReleaseType::default_label()
                } else {
                    pre.identifier.clone()
                }
            }),
        };

        let next = match (target_label, self.core_covers(bump_type)) {
            (None, true) => self.core(),
            (None, false) => self.bump(bump_type),
            (Some(label), true) => {
                let current = self.pre.as_ref().map(|pre| &pre.identifier);
                let pre = match self.pre.as_ref() {
                    Some(pre) if current == Some(&label) => pre.increment_iteration(),
                    _ => PreRelease::first(label),
                };
                self.core().with_pre(pre)
            }
            (Some(label), false) => self.bump(bump_type).with_pre(PreRelease::first(label)),
        };

        if next <= *self {
            return Err(MonorelError::version(format!(
                "Version {} is not greater than {}",
                next, self
            )));
        }

        Ok(next)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = MonorelError;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

/// Version bump type decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionBump {
    Major,
    Minor,
    Patch,
}

impl fmt::Display for VersionBump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionBump::Major => f.write_str("major"),
            VersionBump::Minor => f.write_str("minor"),
            VersionBump::Patch => f.write_str("patch"),
        }
    }
}
