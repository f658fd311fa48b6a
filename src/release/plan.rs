use crate::domain::{FloatingTag, Release, ReleaseBranch, Version};

/// Decisions of one release run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasePlan {
    pub previous: Option<Release>,
    pub version: Version,
    /// Branch of the previous release's major line (`v0.x` without one)
    pub parent_branch: ReleaseBranch,
    /// Branch of the new version's major line
    pub release_branch: ReleaseBranch,
    /// Branch checked out when the release started, when it is not the parent branch
    pub original_branch: Option<String>,
    /// New major line: `release_branch` is created and `parent_branch` pinned
    pub is_major: bool,
    pub floating_tags: Vec<FloatingTag>,
}

impl ReleasePlan {
    pub fn tag_name(&self) -> String {
        self.version.tag_name()
    }

    pub fn previous_version(&self) -> Option<&Version> {
        self.previous.as_ref().map(|release| &release.version)
    }

    /// Refs pushed atomically once the release is tagged, without duplicates
    pub fn push_refs(&self) -> Vec<String> {
        let mut refs = vec![
            format!("refs/heads/{}", self.release_branch),
            format!("refs/heads/{}", self.parent_branch),
            format!("refs/tags/{}", self.tag_name()),
        ];
        refs.extend(self.floating_tags.iter().map(|tag| format!("refs/tags/{}", tag)));

        let mut unique = Vec::with_capacity(refs.len());
        for r in refs {
            if !unique.contains(&r) {
                unique.push(r);
            }
        }
        unique
    }

    /// Floating tags as a comma separated list, `-` when empty
    pub fn tags_text(&self) -> String {
        if self.floating_tags.is_empty() {
            return "-".to_string();
        }
        self.floating_tags
            .iter()
            .map(|tag| tag.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Operator summary shown before confirmation
    pub fn summary(&self) -> String {
        let previous = self
            .previous_version()
            .map(|v| v.tag_name())
            .unwrap_or_else(|| "-".to_string());

        let mut out = format!(
            "New version:      {}, tags: {}\nPrevious version: {}\n",
            self.tag_name(),
            self.tags_text(),
            previous
        );
        if self.is_major {
            out.push_str(&format!(
                "New release branch \"{}\" will be created\n",
                self.release_branch
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn plan(previous: &str, next: &str, is_major: bool) -> ReleasePlan {
        let previous = Version::parse(previous).unwrap();
        let version = Version::parse(next).unwrap();
        ReleasePlan {
            parent_branch: ReleaseBranch::new(previous.major),
            release_branch: ReleaseBranch::new(version.major),
            previous: Some(Release::new(previous, "abc", Utc::now())),
            version,
            original_branch: None,
            is_major,
            floating_tags: vec![FloatingTag::Latest, FloatingTag::MajorNext(3)],
        }
    }

    #[test]
    fn test_push_refs_deduplicate_branches() {
        let refs = plan("1.4.2", "1.4.3", false).push_refs();
        assert_eq!(
            refs,
            vec![
                "refs/heads/v1.x",
                "refs/tags/v1.4.3",
                "refs/tags/latest",
                "refs/tags/v3.next"
            ]
        );
    }

    #[test]
    fn test_major_push_refs_include_both_branches() {
        let refs = plan("2.0.0", "3.0.0", true).push_refs();
        assert_eq!(&refs[..3], &["refs/heads/v3.x", "refs/heads/v2.x", "refs/tags/v3.0.0"]);
    }

    #[test]
    fn test_summary() {
        let summary = plan("2.0.0", "3.0.0", true).summary();
        assert!(summary.contains("New version:      v3.0.0, tags: latest, v3.next"));
        assert!(summary.contains("Previous version: v2.0.0"));
        assert!(summary.contains("\"v3.x\" will be created"));
    }

    #[test]
    fn test_summary_of_first_patch_release() {
        let mut first = plan("0.0.0", "0.0.1", false);
        first.previous = None;
        first.floating_tags.clear();

        assert_eq!(
            first.summary(),
            "New version:      v0.0.1, tags: -\nPrevious version: -\n"
        );
    }
}
