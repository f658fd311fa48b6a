use crate::domain::tag::is_release_tag;
use crate::domain::version::Version;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Subject prefix of the commit created for every release
pub const RELEASE_COMMIT_PREFIX: &str = "build(release): release ";

fn conventional_header() -> Option<&'static Regex> {
    static HEADER: OnceLock<Option<Regex>> = OnceLock::new();
    HEADER
        .get_or_init(|| Regex::new(r"^([a-z][a-z0-9-]*)(?:\(([^)]+)\))?(!?):\s*(.*)$").ok())
        .as_ref()
}

/// Parsed representation of a conventional commit message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommit {
    /// Commit type, empty for non-conventional messages
    pub r#type: String,
    pub scope: Option<String>,
    pub description: String,
    pub is_breaking_change: bool,
}

impl ParsedCommit {
    /// Parse a commit message according to conventional commits spec
    /// Supports formats:
    /// - type(scope)!: description
    /// - type(scope): description
    /// - type!: description
    /// - type: description
    /// - non-conventional text
    ///
    /// A `BREAKING CHANGE:` or `BREAKING-CHANGE:` footer also marks the commit as breaking.
    pub fn parse(message: &str) -> Self {
        let subject = message.lines().next().unwrap_or_default().trim();
        let has_breaking_footer = message
            .lines()
            .skip(1)
            .any(|line| line.starts_with("BREAKING CHANGE:") || line.starts_with("BREAKING-CHANGE:"));

        if let Some(captures) = conventional_header().and_then(|re| re.captures(subject)) {
            let r#type = captures
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            let scope = captures.get(2).map(|m| m.as_str().to_string());
            let has_exclamation = captures.get(3).map(|m| m.as_str()) == Some("!");
            let description = captures
                .get(4)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();

            return ParsedCommit {
                r#type,
                scope,
                description,
                is_breaking_change: has_exclamation || has_breaking_footer,
            };
        }

        // Default: non-conventional commit
        ParsedCommit {
            r#type: String::new(),
            scope: None,
            description: subject.to_string(),
            is_breaking_change: has_breaking_footer,
        }
    }
}

/// One history entry with the refs pointing at it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub hash: String,
    pub message: String,
    pub date: DateTime<Utc>,
    /// Tag names pointing at this commit
    pub tags: BTreeSet<String>,
    /// Local branch names whose head is this commit
    pub branches: BTreeSet<String>,
    parsed: ParsedCommit,
}

impl Commit {
    pub fn new(hash: impl Into<String>, message: impl Into<String>, date: DateTime<Utc>) -> Self {
        let message = message.into();
        let parsed = ParsedCommit::parse(&message);
        Commit {
            hash: hash.into(),
            message,
            date,
            tags: BTreeSet::new(),
            branches: BTreeSet::new(),
            parsed,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_branches<I, S>(mut self, branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.branches.extend(branches.into_iter().map(Into::into));
        self
    }

    pub fn short_hash(&self) -> &str {
        let end = self.hash.len().min(7);
        &self.hash[..end]
    }

    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }

    pub fn commit_type(&self) -> &str {
        &self.parsed.r#type
    }

    pub fn scope(&self) -> Option<&str> {
        self.parsed.scope.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.parsed.description
    }

    pub fn is_breaking(&self) -> bool {
        self.parsed.is_breaking_change
    }

    /// Commit created by a previous release run
    pub fn is_release_marker(&self) -> bool {
        self.subject().starts_with(RELEASE_COMMIT_PREFIX)
    }

    /// Versions of all release tags on this commit
    pub fn release_versions(&self) -> Vec<Version> {
        self.tags
            .iter()
            .filter(|tag| is_release_tag(tag))
            .filter_map(|tag| Version::parse(tag).ok())
            .collect()
    }

    /// The release this commit represents; a commit is a release only with exactly one release tag
    pub fn release_version(&self) -> Option<Version> {
        let mut versions = self.release_versions();
        if versions.len() == 1 {
            versions.pop()
        } else {
            None
        }
    }

    pub fn is_release(&self) -> bool {
        self.release_version().is_some()
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.contains(name)
    }
}

/// Chronologically ordered commits between two refs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    commits: Vec<Commit>,
}

impl ChangeSet {
    /// Build from commits in chronological order (oldest first)
    pub fn new(commits: Vec<Commit>) -> Self {
        ChangeSet { commits }
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Commit> {
        self.commits.iter()
    }

    pub fn first(&self) -> Option<&Commit> {
        self.commits.first()
    }

    pub fn last(&self) -> Option<&Commit> {
        self.commits.last()
    }

    pub fn has_breaking_changes(&self) -> bool {
        self.commits.iter().any(Commit::is_breaking)
    }

    /// Non-breaking feature commits
    pub fn has_feature_changes(&self) -> bool {
        self.commits
            .iter()
            .any(|commit| !commit.is_breaking() && commit.commit_type() == "feat")
    }
}
