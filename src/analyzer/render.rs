//! Changelog rendering to markdown and plain text

use crate::analyzer::changelog::{Changelog, ChangelogGroup, GroupKind};
use crate::domain::{Commit, Release, RELEASE_COMMIT_PREFIX};
use crate::git::Upstream;
use regex::Regex;
use std::sync::OnceLock;

fn markdown_link() -> Option<&'static Regex> {
    static LINK: OnceLock<Option<Regex>> = OnceLock::new();
    LINK.get_or_init(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").ok())
        .as_ref()
}

/// Renders a classified changelog
pub struct ChangelogRenderer<'a> {
    changelog: &'a Changelog,
    upstream: Option<&'a Upstream>,
}

impl<'a> ChangelogRenderer<'a> {
    pub fn new(changelog: &'a Changelog) -> Self {
        ChangelogRenderer {
            changelog,
            upstream: None,
        }
    }

    pub fn with_upstream(mut self, upstream: Option<&'a Upstream>) -> Self {
        self.upstream = upstream;
        self
    }

    /// Header describing the release range; `end` is the release the changes lead to
    pub fn header(&self, end: Option<&Release>) -> String {
        match (self.changelog.previous_release(), end) {
            (Some(previous), Some(end)) => format!(
                "**Changes between the releases: `{}` ({}) ... `{}` ({})**",
                previous.version.tag_name(),
                previous.date_string(),
                end.version.tag_name(),
                end.date_string()
            ),
            (None, Some(end)) => format!(
                "**Changes for the release: `{}` ({})**",
                end.version.tag_name(),
                end.date_string()
            ),
            (Some(previous), None) => format!(
                "**Changes since the release: `{}` ({})**",
                previous.version.tag_name(),
                previous.date_string()
            ),
            (None, None) => "**Changes since the initial commit**".to_string(),
        }
    }

    /// Markdown body: optional compare link followed by one section per non-empty group
    pub fn markdown(&self, end: Option<&Release>, with_header: bool) -> String {
        let mut blocks = Vec::new();

        if with_header {
            blocks.push(self.header(end));
        }

        if let Some(url) = self.compare_url(end) {
            blocks.push(format!("Compare with the previous release: {}", url));
        }

        for group in self.changelog.non_empty_groups() {
            blocks.push(render_group(group));
        }

        blocks.join("\n\n")
    }

    /// Markdown with issue references linked to the upstream
    pub fn linkify(&self, markdown: &str) -> String {
        match self.upstream {
            Some(upstream) => upstream.linkify_markdown(markdown),
            None => markdown.to_string(),
        }
    }

    /// Plain text rendering for commit and tag messages
    pub fn text(&self, end: Option<&Release>, with_header: bool) -> String {
        markdown_to_text(&self.linkify(&self.markdown(end, with_header)))
    }

    fn compare_url(&self, end: Option<&Release>) -> Option<String> {
        let previous = self.changelog.previous_release()?;
        let end = end?;
        let upstream = self.upstream?;
        Some(upstream.compare_url(&previous.version.tag_name(), &end.version.tag_name()))
    }
}

fn render_group(group: &ChangelogGroup) -> String {
    let mut lines = vec![format!("**{}:**", group.name)];
    lines.extend(group.commits.iter().map(|commit| render_item(group, commit)));
    lines.join("\n")
}

fn render_item(group: &ChangelogGroup, commit: &Commit) -> String {
    match group.kind {
        GroupKind::IncludedPreReleases => {
            let version = commit
                .subject()
                .strip_prefix(RELEASE_COMMIT_PREFIX)
                .unwrap_or(commit.subject());
            format!("- {}", version)
        }
        _ if group.is_production() => {
            let description = match commit.scope() {
                Some(scope) => format!("{}: {}", scope, commit.description()),
                None => commit.description().to_string(),
            };
            format!("- {} ({})", description, commit.short_hash())
        }
        _ => format!("- {} ({})", commit.subject(), commit.short_hash()),
    }
}

/// Flatten markdown to plain text: links become `text (url)`, emphasis and code marks are dropped
pub fn markdown_to_text(markdown: &str) -> String {
    let text = match markdown_link() {
        Some(re) => re.replace_all(markdown, "$1 ($2)").into_owned(),
        None => markdown.to_string(),
    };

    text.replace("**", "").replace('`', "").trim().to_string()
}
