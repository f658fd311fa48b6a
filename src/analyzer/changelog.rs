//! Commit classification and next-version decision

use crate::domain::{ChangeSet, Commit, PreReleaseLabel, Release, Version, VersionBump};
use crate::error::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const BREAKING_CHANGES_GROUP: &str = "Breaking changes";
pub const OTHER_CHANGES_GROUP: &str = "Other changes";
pub const INCLUDED_PRE_RELEASES_GROUP: &str = "Included pre-releases";

/// Classification of one commit type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitTypeConfig {
    /// Group title, defaults to a well-known title or the capitalized type
    pub title: Option<String>,
    /// Commits of this type get their own changelog group
    pub production: bool,
    /// Commits of this type count as notable changes
    pub notable: bool,
}

impl CommitTypeConfig {
    pub fn production_and_notable() -> Self {
        CommitTypeConfig {
            title: None,
            production: true,
            notable: true,
        }
    }
}

/// Ordered commit type table; order defines group order in the changelog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitTypes(IndexMap<String, CommitTypeConfig>);

impl Default for CommitTypes {
    fn default() -> Self {
        let mut types = IndexMap::new();
        types.insert("feat".to_string(), CommitTypeConfig::production_and_notable());
        types.insert("fix".to_string(), CommitTypeConfig::production_and_notable());
        CommitTypes(types)
    }
}

impl CommitTypes {
    pub fn new(types: IndexMap<String, CommitTypeConfig>) -> Self {
        CommitTypes(types)
    }

    pub fn get(&self, commit_type: &str) -> Option<&CommitTypeConfig> {
        self.0.get(commit_type)
    }

    pub fn is_production(&self, commit_type: &str) -> bool {
        self.get(commit_type).is_some_and(|config| config.production)
    }

    pub fn is_notable(&self, commit_type: &str) -> bool {
        self.get(commit_type).is_some_and(|config| config.notable)
    }

    /// Production types with their group titles, in table order
    pub fn production_types(&self) -> impl Iterator<Item = (&str, String)> {
        self.0
            .iter()
            .filter(|(_, config)| config.production)
            .map(|(name, config)| {
                let title = config
                    .title
                    .clone()
                    .unwrap_or_else(|| default_type_title(name));
                (name.as_str(), title)
            })
    }
}

/// Well-known group title for a commit type
pub fn default_type_title(commit_type: &str) -> String {
    match commit_type {
        "feat" => "New features".to_string(),
        "fix" => "Bug fixes".to_string(),
        "refactor" => "Code refactoring".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

/// Which bucket a changelog group represents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKind {
    Breaking,
    Production(String),
    Other,
    IncludedPreReleases,
}

/// One classification bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogGroup {
    pub name: String,
    pub kind: GroupKind,
    pub commits: Vec<Commit>,
}

impl ChangelogGroup {
    fn new(name: impl Into<String>, kind: GroupKind) -> Self {
        ChangelogGroup {
            name: name.into(),
            kind,
            commits: Vec::new(),
        }
    }

    /// Production groups feed the version decision and show commit annotations
    pub fn is_production(&self) -> bool {
        matches!(self.kind, GroupKind::Breaking | GroupKind::Production(_))
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

/// Builds a classified changelog from a change set
#[derive(Debug, Clone, Default)]
pub struct ChangelogBuilder {
    commit_types: CommitTypes,
}

impl ChangelogBuilder {
    pub fn new(commit_types: CommitTypes) -> Self {
        ChangelogBuilder { commit_types }
    }

    pub fn commit_types(&self) -> &CommitTypes {
        &self.commit_types
    }

    /// Classify `changes` made since `previous` release
    pub fn build(&self, changes: ChangeSet, previous: Option<Release>) -> Changelog {
        let mut breaking = ChangelogGroup::new(BREAKING_CHANGES_GROUP, GroupKind::Breaking);
        let mut production: Vec<ChangelogGroup> = self
            .commit_types
            .production_types()
            .map(|(name, title)| ChangelogGroup::new(title, GroupKind::Production(name.to_string())))
            .collect();
        let mut other = ChangelogGroup::new(OTHER_CHANGES_GROUP, GroupKind::Other);
        let mut pre_releases =
            ChangelogGroup::new(INCLUDED_PRE_RELEASES_GROUP, GroupKind::IncludedPreReleases);

        let mut notable_changes = 0;

        for commit in changes.iter() {
            if commit.is_breaking() || self.commit_types.is_notable(commit.commit_type()) {
                notable_changes += 1;
            }

            let production_group = production.iter_mut().find(
                |group| matches!(&group.kind, GroupKind::Production(t) if t == commit.commit_type()),
            );

            let group = if commit.is_breaking() {
                &mut breaking
            } else if let Some(group) = production_group {
                group
            } else if commit.is_release_marker() {
                &mut pre_releases
            } else {
                &mut other
            };
            group.commits.push(commit.clone());
        }

        let mut groups = vec![breaking];
        groups.extend(production);
        groups.push(other);
        groups.push(pre_releases);

        Changelog {
            changes,
            previous,
            groups,
            notable_changes,
        }
    }
}

/// Classified changes since a previous release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changelog {
    changes: ChangeSet,
    previous: Option<Release>,
    groups: Vec<ChangelogGroup>,
    notable_changes: usize,
}

impl Changelog {
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn previous_release(&self) -> Option<&Release> {
        self.previous.as_ref()
    }

    /// All groups in display order, including empty ones
    pub fn groups(&self) -> &[ChangelogGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&ChangelogGroup> {
        self.groups.iter().find(|group| group.name == name)
    }

    pub fn non_empty_groups(&self) -> impl Iterator<Item = &ChangelogGroup> {
        self.groups.iter().filter(|group| !group.is_empty())
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn notable_changes(&self) -> usize {
        self.notable_changes
    }

    pub fn has_notable_changes(&self) -> bool {
        self.notable_changes > 0
    }

    pub fn has_breaking_changes(&self) -> bool {
        self.changes.has_breaking_changes()
    }

    /// Bump implied by the changes relative to the previous release
    pub fn version_bump(&self) -> VersionBump {
        let initial = self
            .previous
            .as_ref()
            .map_or(true, |release| release.version.is_initial());

        if initial {
            VersionBump::Patch
        } else if self.changes.has_breaking_changes() {
            VersionBump::Major
        } else if self.changes.has_feature_changes() {
            VersionBump::Minor
        } else {
            VersionBump::Patch
        }
    }

    /// Next version after the previous release (or the initial version)
    pub fn create_next_version(&self, label: &PreReleaseLabel) -> Result<Version> {
        let base = self
            .previous
            .as_ref()
            .map(|release| release.version.clone())
            .unwrap_or_else(Version::initial);

        base.increment(&self.version_bump(), label)
    }

    /// Aligned summary of change counts
    pub fn report(&self) -> String {
        let mut rows: Vec<(&str, usize)> = vec![("Total changes", self.changes.len())];
        if self.notable_changes > 0 {
            rows.push(("Notable changes", self.notable_changes));
        }
        rows.extend(self.non_empty_groups().map(|group| (group.name.as_str(), group.len())));

        let width = rows.iter().map(|(title, _)| title.len()).max().unwrap_or(0) + 1;

        rows.iter()
            .map(|(title, count)| {
                let count = if *count == 0 {
                    "-".to_string()
                } else {
                    count.to_string()
                };
                format!("{:<width$} {}", format!("{}:", title), count, width = width)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn commit(message: &str) -> Commit {
        Commit::new(format!("{:x}", message.len() * 7919), message, Utc::now())
    }

    fn previous(version: &str) -> Option<Release> {
        Some(Release::new(Version::parse(version).unwrap(), "prev", Utc::now()))
    }

    fn changes(messages: &[&str]) -> ChangeSet {
        ChangeSet::new(messages.iter().map(|m| commit(m)).collect())
    }

    #[test]
    fn test_fix_after_stable_release() {
        let changelog = ChangelogBuilder::default().build(changes(&["fix: crash"]), previous("1.4.2"));

        assert_eq!(
            changelog.create_next_version(&PreReleaseLabel::Default).unwrap(),
            Version::parse("1.4.3").unwrap()
        );
        assert_eq!(changelog.group("Bug fixes").unwrap().len(), 1);
        assert_eq!(changelog.notable_changes(), 1);
    }

    #[test]
    fn test_breaking_change_bumps_major() {
        let changelog =
            ChangelogBuilder::default().build(changes(&["feat!: new api", "fix: x"]), previous("2.0.0"));

        assert_eq!(changelog.version_bump(), VersionBump::Major);
        assert_eq!(
            changelog.create_next_version(&PreReleaseLabel::Default).unwrap(),
            Version::parse("3.0.0").unwrap()
        );
        assert_eq!(changelog.group(BREAKING_CHANGES_GROUP).unwrap().len(), 1);
        assert_eq!(changelog.group("New features").unwrap().len(), 0);
    }

    #[test]
    fn test_feature_bumps_minor() {
        let changelog = ChangelogBuilder::default().build(changes(&["feat: x"]), previous("1.0.0"));
        assert_eq!(changelog.version_bump(), VersionBump::Minor);
    }

    #[test]
    fn test_first_release_is_patch() {
        let changelog = ChangelogBuilder::default().build(changes(&["feat!: everything"]), None);

        assert_eq!(changelog.version_bump(), VersionBump::Patch);
        assert_eq!(
            changelog.create_next_version(&PreReleaseLabel::Default).unwrap(),
            Version::parse("0.0.1").unwrap()
        );
    }

    #[test]
    fn test_classification_partitions_changes() {
        let messages = [
            "feat!: breaking",
            "feat: feature",
            "fix: bug",
            "docs: readme",
            "build(release): release v1.1.0-beta.1",
            "random text",
        ];
        let changelog = ChangelogBuilder::default().build(changes(&messages), previous("1.0.0"));

        let total: usize = changelog.groups().iter().map(ChangelogGroup::len).sum();
        assert_eq!(total, messages.len());

        let names: Vec<&str> = changelog.non_empty_groups().map(|g| g.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Breaking changes",
                "New features",
                "Bug fixes",
                "Other changes",
                "Included pre-releases"
            ]
        );
        assert_eq!(changelog.group(OTHER_CHANGES_GROUP).unwrap().len(), 2);
        assert_eq!(changelog.notable_changes(), 3);
    }

    #[test]
    fn test_custom_commit_types() {
        let mut types = IndexMap::new();
        types.insert(
            "perf".to_string(),
            CommitTypeConfig {
                title: None,
                production: true,
                notable: false,
            },
        );
        types.insert("fix".to_string(), CommitTypeConfig::production_and_notable());

        let changelog = ChangelogBuilder::new(CommitTypes::new(types))
            .build(changes(&["perf: faster", "feat: ignored type"]), previous("1.0.0"));

        assert_eq!(changelog.group("Perf").unwrap().len(), 1);
        assert!(changelog.group("New features").is_none());
        assert!(!changelog.has_notable_changes());
        // feature commits still drive the minor bump
        assert_eq!(changelog.version_bump(), VersionBump::Minor);
    }

    #[test]
    fn test_no_changes() {
        let changelog = ChangelogBuilder::default().build(ChangeSet::default(), previous("1.0.0"));
        assert!(!changelog.has_changes());
        assert!(!changelog.has_notable_changes());
        assert_eq!(changelog.report(), "Total changes: -");
    }

    #[test]
    fn test_report_alignment() {
        let changelog =
            ChangelogBuilder::default().build(changes(&["fix: a", "chore: b"]), previous("1.0.0"));

        assert_eq!(
            changelog.report(),
            "Total changes:   2\nNotable changes: 1\nBug fixes:       1\nOther changes:   1"
        );
    }

    #[test]
    fn test_default_type_titles() {
        assert_eq!(default_type_title("refactor"), "Code refactoring");
        assert_eq!(default_type_title("perf"), "Perf");
    }

    #[test]
    fn test_pre_release_label_is_applied() {
        let changelog = ChangelogBuilder::default().build(changes(&["feat: x"]), previous("1.4.2"));
        let label: PreReleaseLabel = "beta".parse().unwrap();

        assert_eq!(
            changelog.create_next_version(&label).unwrap(),
            Version::parse("1.5.0-beta.1").unwrap()
        );
    }
}
