use crate::domain::version::Version;
use crate::error::{MonorelError, Result};
use chrono::{DateTime, Utc};

/// One published release point: a version tag on a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub version: Version,
    pub commit: String,
    pub date: DateTime<Utc>,
}

impl Release {
    pub fn new(version: Version, commit: impl Into<String>, date: DateTime<Utc>) -> Self {
        Release {
            version,
            commit: commit.into(),
            date,
        }
    }

    /// Release date as `YYYY-MM-DD`
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// All known releases of a repository, sorted ascending by version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Releases {
    versions: Vec<Version>,
}

impl Releases {
    pub fn new(mut versions: Vec<Version>) -> Self {
        versions.sort();
        versions.dedup();
        Releases { versions }
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.versions.binary_search(version).is_ok()
    }

    /// Highest release of any stability
    pub fn last_release(&self) -> Option<&Version> {
        self.versions.last()
    }

    /// Highest stable release
    pub fn last_stable_release(&self) -> Option<&Version> {
        self.versions.iter().rev().find(|v| v.is_stable())
    }

    /// Highest release sharing `major`
    pub fn last_major_release(&self, major: u64) -> Option<&Version> {
        self.versions.iter().rev().find(|v| v.major == major)
    }

    /// Highest stable release sharing `major`
    pub fn last_major_stable_release(&self, major: u64) -> Option<&Version> {
        self.versions
            .iter()
            .rev()
            .find(|v| v.major == major && v.is_stable())
    }

    /// Check that `version` may be released: it must be new and above every release of its major line
    pub fn can_release(&self, version: &Version) -> Result<()> {
        if self.contains(version) {
            return Err(MonorelError::validation(format!(
                "Version {} is already released",
                version
            )));
        }

        if let Some(last) = self.last_major_release(version.major) {
            if version < last {
                return Err(MonorelError::validation(format!(
                    "Version {} is lower than the existing release {} of the same major line",
                    version, last
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn releases(list: &[&str]) -> Releases {
        Releases::new(list.iter().map(|s| Version::parse(s).unwrap()).collect())
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_last_releases() {
        let releases = releases(&["1.0.0", "2.0.0-beta.1", "1.1.0", "1.2.0-rc.1"]);
        assert_eq!(releases.last_release(), Some(&v("2.0.0-beta.1")));
        assert_eq!(releases.last_stable_release(), Some(&v("1.1.0")));
        assert_eq!(releases.last_major_release(1), Some(&v("1.2.0-rc.1")));
        assert_eq!(releases.last_major_stable_release(1), Some(&v("1.1.0")));
        assert_eq!(releases.last_major_stable_release(2), None);
    }

    #[test]
    fn test_can_release() {
        let releases = releases(&["1.0.0", "1.4.2", "2.0.0"]);
        assert!(releases.can_release(&v("1.4.3")).is_ok());
        assert!(releases.can_release(&v("3.0.0")).is_ok());
        assert!(releases.can_release(&v("1.4.2")).is_err());
        assert!(releases.can_release(&v("1.3.0")).is_err());
    }

    #[test]
    fn test_date_string() {
        let date = DateTime::parse_from_rfc3339("2024-03-05T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let release = Release::new(v("1.0.0"), "abc", date);
        assert_eq!(release.date_string(), "2024-03-05");
    }
}
