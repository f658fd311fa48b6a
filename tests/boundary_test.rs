use monorel::analyzer::TagResolver;
use monorel::boundary::ReleaseWarning;
use monorel::domain::{TagRef, Version};
use monorel::ui::formatter;

// ============================================================================
// ReleaseWarning Display Tests
// ============================================================================

#[test]
fn test_no_changes_display() {
    let warning = ReleaseWarning::NoChanges {
        previous: Some("v1.4.2".to_string()),
    };

    let display_msg = warning.to_string();
    assert!(
        display_msg.contains("No changes"),
        "Message should contain 'No changes', got: {}",
        display_msg
    );
    assert!(
        display_msg.contains("v1.4.2"),
        "Message should contain the previous release, got: {}",
        display_msg
    );
}

#[test]
fn test_no_changes_without_previous_release() {
    let warning = ReleaseWarning::NoChanges { previous: None };
    assert_eq!(warning.to_string(), "No changes to release");
}

#[test]
fn test_no_notable_changes_display() {
    let warning = ReleaseWarning::NoNotableChanges { total: 3 };

    let display_msg = warning.to_string();
    assert!(
        display_msg.contains('3'),
        "Message should contain the change count, got: {}",
        display_msg
    );
    assert!(display_msg.contains("notable"));
}

#[test]
fn test_unknown_upstream_display() {
    let warning = ReleaseWarning::UnknownUpstream {
        remote: "origin".to_string(),
        url: "https://git.internal.example/acme/widgets.git".to_string(),
    };

    let display_msg = warning.to_string();
    assert!(display_msg.contains("origin"));
    assert!(display_msg.contains("git.internal.example"));
}

#[test]
fn test_missing_token_names_variable() {
    let warning = ReleaseWarning::MissingHostingToken {
        env: "GITHUB_TOKEN".to_string(),
    };
    assert!(warning.to_string().starts_with("GITHUB_TOKEN is not set"));
}

#[test]
fn test_branch_warnings_name_branch_and_remote() {
    let not_tracked = ReleaseWarning::BranchNotTracked {
        branch: "feature/parser".to_string(),
    };
    assert!(not_tracked.to_string().contains("'feature/parser'"));

    let no_remote = ReleaseWarning::NoRemote {
        remote: "upstream".to_string(),
    };
    assert!(no_remote.to_string().contains("'upstream'"));
}

#[test]
fn test_warnings_are_comparable() {
    let a = ReleaseWarning::NoRemote {
        remote: "origin".to_string(),
    };
    assert_eq!(a.clone(), a);
    assert_ne!(
        a,
        ReleaseWarning::NoRemote {
            remote: "upstream".to_string()
        }
    );
}

// ============================================================================
// Tag table formatting
// ============================================================================

fn release(name: &str, commit: &str) -> TagRef {
    TagRef::new(name, commit, Some(Version::parse(name).unwrap()))
}

#[test]
fn test_tag_table_lists_pending_actions() {
    let tags = vec![
        release("v1.0.0", "a1"),
        release("v2.0.0-rc.1", "b2"),
        TagRef::new("latest", "a1", Some(Version::new(1, 0, 0))),
    ];
    let resolved = TagResolver::new(false).resolve(&tags);

    let table = formatter::format_tag_table(&resolved);

    assert!(table.contains("Tag"));
    assert!(table.contains("Action"));
    let next = table
        .lines()
        .find(|line| line.trim_start().starts_with("next"))
        .unwrap();
    assert!(next.contains("v2.0.0-rc.1"));
    assert!(next.contains("update"));

    let latest = table
        .lines()
        .find(|line| line.trim_start().starts_with("latest"))
        .unwrap();
    assert!(latest.contains("v1.0.0"));
    assert!(!latest.contains("update"));
}
