use crate::domain::version::Version;
use crate::error::{MonorelError, Result};
use regex::Regex;
use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

fn major_tag_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^v(0|[1-9]\d*)(?:\.(latest|next))?$").ok())
        .as_ref()
}

/// Immutable release tag such as `v1.2.3` or `v2.0.0-rc.1`
pub fn is_release_tag(name: &str) -> bool {
    name.starts_with('v') && Version::parse(name).is_ok()
}

/// A tag as observed in the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    pub name: String,
    /// Hash of the commit the tag points at
    pub commit: String,
    /// Release version of that commit, if the commit is a release
    pub release: Option<Version>,
}

impl TagRef {
    pub fn new(name: impl Into<String>, commit: impl Into<String>, release: Option<Version>) -> Self {
        TagRef {
            name: name.into(),
            commit: commit.into(),
            release,
        }
    }
}

/// Mutable pointer tag whose target moves between releases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatingTag {
    /// Highest stable release
    Latest,
    /// Highest release of any stability
    Next,
    /// Bare major tag `vN`, mirrors `vN.latest`
    Major(u64),
    /// `vN.latest`
    MajorLatest(u64),
    /// `vN.next`
    MajorNext(u64),
}

impl FloatingTag {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "latest" => return Ok(FloatingTag::Latest),
            "next" => return Ok(FloatingTag::Next),
            _ => {}
        }

        let captures = major_tag_pattern()
            .and_then(|re| re.captures(name))
            .ok_or_else(|| MonorelError::tag(format!("Not a floating tag: '{}'", name)))?;

        let major = captures
            .get(1)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .ok_or_else(|| MonorelError::tag(format!("Invalid major number in tag '{}'", name)))?;

        Ok(match captures.get(2).map(|m| m.as_str()) {
            Some("latest") => FloatingTag::MajorLatest(major),
            Some(_) => FloatingTag::MajorNext(major),
            None => FloatingTag::Major(major),
        })
    }

    /// Major number for per-major tags, `None` for the global ones
    pub fn major(&self) -> Option<u64> {
        match self {
            FloatingTag::Latest | FloatingTag::Next => None,
            FloatingTag::Major(n) | FloatingTag::MajorLatest(n) | FloatingTag::MajorNext(n) => {
                Some(*n)
            }
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            FloatingTag::Major(_) => "",
            FloatingTag::Latest | FloatingTag::MajorLatest(_) => "latest",
            FloatingTag::Next | FloatingTag::MajorNext(_) => "next",
        }
    }

    /// Bare `vN` tag, gated by configuration
    pub fn is_major_tag(&self) -> bool {
        matches!(self, FloatingTag::Major(_))
    }

    fn sort_key(&self) -> (Reverse<u64>, &'static str) {
        (Reverse(self.major().unwrap_or(u64::MAX)), self.suffix())
    }
}

impl Ord for FloatingTag {
    /// Global tags first, then major descending, then suffix (`""` < `latest` < `next`)
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for FloatingTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for FloatingTag {
    type Err = MonorelError;

    fn from_str(s: &str) -> Result<Self> {
        FloatingTag::parse(s)
    }
}

impl fmt::Display for FloatingTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FloatingTag::Latest => f.write_str("latest"),
            FloatingTag::Next => f.write_str("next"),
            FloatingTag::Major(n) => write!(f, "v{}", n),
            FloatingTag::MajorLatest(n) => write!(f, "v{}.latest", n),
            FloatingTag::MajorNext(n) => write!(f, "v{}.next", n),
        }
    }
}
