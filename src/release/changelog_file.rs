//! `CHANGELOG.md` maintenance

use crate::domain::Version;
use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

pub const CHANGELOG_FILE_NAME: &str = "CHANGELOG.md";

const HEADING: &str = "# Changelog";

/// Full file content with the new release section on top
///
/// `existing` is the current file content, carried forward below the new section.
pub fn compose_changelog(
    version: &Version,
    date: &str,
    markdown: &str,
    existing: Option<&str>,
) -> String {
    let mut content = format!(
        "{}\n\n### {} ({})\n\n{}",
        HEADING,
        version.tag_name(),
        date,
        markdown.trim()
    )
    .trim()
    .to_string();
    content.push('\n');

    if let Some(existing) = existing {
        let previous = existing.replacen(&format!("{}\n", HEADING), "", 1);
        let previous = previous.trim();
        if !previous.is_empty() {
            content.push('\n');
            content.push_str(previous);
            content.push('\n');
        }
    }

    content
}

/// Write the changelog of `version` into `root`
///
/// Without `carry_forward` previous content is dropped, so a new major line starts a
/// fresh history.
pub fn write_changelog(
    root: &Path,
    version: &Version,
    date: &str,
    markdown: &str,
    carry_forward: bool,
) -> Result<PathBuf> {
    let path = root.join(CHANGELOG_FILE_NAME);

    let existing = if carry_forward && path.exists() {
        Some(fs::read_to_string(&path)?)
    } else {
        None
    };

    fs::write(
        &path,
        compose_changelog(version, date, markdown, existing.as_deref()),
    )?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn version(v: &str) -> Version {
        Version::parse(v).unwrap()
    }

    #[test]
    fn test_compose_new_file() {
        let content = compose_changelog(
            &version("1.0.0"),
            "2024-03-01",
            "**Bug fixes:**\n\n- crash (abc1234)\n",
            None,
        );
        assert_eq!(
            content,
            "# Changelog\n\n### v1.0.0 (2024-03-01)\n\n**Bug fixes:**\n\n- crash (abc1234)\n"
        );
    }

    #[test]
    fn test_previous_sections_follow_the_new_one() {
        let dir = TempDir::new().unwrap();
        write_changelog(dir.path(), &version("1.0.0"), "2024-03-01", "- first", true).unwrap();
        write_changelog(dir.path(), &version("1.1.0"), "2024-04-01", "- second", true).unwrap();

        let content = fs::read_to_string(dir.path().join(CHANGELOG_FILE_NAME)).unwrap();
        assert_eq!(content.matches("# Changelog").count(), 1);
        let newer = content.find("### v1.1.0").unwrap();
        let older = content.find("### v1.0.0").unwrap();
        assert!(newer < older);
        assert!(content.ends_with("- first\n"));
    }

    #[test]
    fn test_major_release_starts_fresh() {
        let dir = TempDir::new().unwrap();
        write_changelog(dir.path(), &version("1.0.0"), "2024-03-01", "- first", true).unwrap();
        write_changelog(dir.path(), &version("2.0.0"), "2024-04-01", "- breaking", false).unwrap();

        let content = fs::read_to_string(dir.path().join(CHANGELOG_FILE_NAME)).unwrap();
        assert!(!content.contains("v1.0.0"));
    }
}
