use chrono::{TimeZone, Utc};
use monorel::analyzer::MarkdownNormalizer;
use monorel::boundary::ReleaseWarning;
use monorel::config::Config;
use monorel::domain::{Commit, PreReleaseLabel, TagRef, Version};
use monorel::error::Result;
use monorel::git::{MockRepository, PushOptions, ReleaseChanges, RepoStatus, Repository};
use monorel::hooks::{ScriptContext, ScriptKind, ScriptRunner};
use monorel::hosting::{HostedReleaseApi, RecordingReleases};
use monorel::package::Package;
use monorel::registry::{MockRegistry, PublishOutcome};
use monorel::release::{
    Collaborators, ReleaseOptions, ReleaseOrchestrator, ReleaseOutcome, ReleaseReport,
    ReleaseState,
};
use monorel::ui::{ScriptedEditor, ScriptedPrompt};
use monorel::MonorelError;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

// ============================================================================
// Fixture
// ============================================================================

/// Records script invocations instead of running processes
#[derive(Default)]
struct RecordingScripts {
    configured: Vec<ScriptKind>,
    runs: Mutex<Vec<ScriptContext>>,
}

impl RecordingScripts {
    fn with(kinds: &[ScriptKind]) -> Self {
        RecordingScripts {
            configured: kinds.to_vec(),
            runs: Mutex::new(Vec::new()),
        }
    }

    fn runs(&self) -> Vec<ScriptContext> {
        self.runs.lock().unwrap().clone()
    }
}

impl ScriptRunner for RecordingScripts {
    fn is_configured(&self, kind: ScriptKind) -> bool {
        self.configured.contains(&kind)
    }

    fn run(&self, context: &ScriptContext) -> Result<()> {
        self.runs.lock().unwrap().push(context.clone());
        Ok(())
    }
}

struct Fixture {
    dir: TempDir,
    repo: MockRepository,
    prompt: ScriptedPrompt,
    editor: ScriptedEditor,
    scripts: RecordingScripts,
    registry: MockRegistry,
    hosting: RecordingReleases,
    config: Config,
}

const MANIFEST: &str = r#"{
  "name": "@acme/widgets",
  "version": "0.0.0"
}
"#;

impl Fixture {
    fn new(answers: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("package.json"), MANIFEST).unwrap();

        Fixture {
            dir,
            repo: MockRepository::new(),
            prompt: ScriptedPrompt::new(answers.iter().copied()),
            editor: ScriptedEditor::default(),
            scripts: RecordingScripts::with(&[ScriptKind::Test]),
            registry: MockRegistry::new(),
            hosting: RecordingReleases::new(),
            config: Config::default(),
        }
    }

    /// Repository released at 1.4.2 on `v1.x`, with a fix on `main` tracking `origin`
    fn patch_release(answers: &[&str]) -> Self {
        let fixture = Fixture::new(answers);
        fixture.repo.release("1.4.2");
        fixture.repo.set_branch("v1.x", "v1.4.2");
        fixture.repo.commit("fix: crash on empty input");
        fixture
            .repo
            .add_remote("origin", "git@github.com:acme/widgets.git");
        fixture.repo.set_upstream("main", "origin");
        fixture
    }

    fn collaborators(&self, with_hosting: bool) -> Collaborators<'_> {
        Collaborators {
            repository: &self.repo,
            scripts: &self.scripts,
            prompt: &self.prompt,
            editor: Some(&self.editor),
            linter: &MarkdownNormalizer,
            registry: &self.registry,
            hosting: with_hosting.then_some(&self.hosting as &dyn HostedReleaseApi),
        }
    }

    fn run(&self, options: ReleaseOptions) -> Result<ReleaseOutcome> {
        self.run_with(self.collaborators(true), options)
    }

    fn run_with(
        &self,
        collaborators: Collaborators<'_>,
        options: ReleaseOptions,
    ) -> Result<ReleaseOutcome> {
        let package = Package::open(self.dir.path(), "").unwrap();
        let date = Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();
        ReleaseOrchestrator::new(&self.config, package, collaborators, options)
            .with_date(date)
            .run()
    }

    fn read(&self, file: &str) -> String {
        fs::read_to_string(self.dir.path().join(file)).unwrap()
    }
}

/// Repository whose `main` already holds the release commit when the release switches back
struct MergedByOthers<'a> {
    inner: &'a MockRepository,
}

impl Repository for MergedByOthers<'_> {
    fn status(&self) -> Result<RepoStatus> {
        self.inner.status()
    }
    fn is_dirty(&self) -> Result<bool> {
        self.inner.is_dirty()
    }
    fn tags(&self) -> Result<Vec<TagRef>> {
        self.inner.tags()
    }
    fn find_commit(&self, rev: &str) -> Result<Option<Commit>> {
        self.inner.find_commit(rev)
    }
    fn release_changes(&self, rev: &str, stable_only: bool) -> Result<ReleaseChanges> {
        self.inner.release_changes(rev, stable_only)
    }
    fn switch_branch(&self, name: &str, create: bool) -> Result<()> {
        if name == "main" && self.inner.tag_target("v1.4.3").is_some() {
            self.inner.set_branch("main", "v1.x");
        }
        self.inner.switch_branch(name, create)
    }
    fn merge_fast_forward(&self, branch: &str) -> Result<()> {
        self.inner.merge_fast_forward(branch)
    }
    fn force_branch(&self, branch: &str, target: &str) -> Result<()> {
        self.inner.force_branch(branch, target)
    }
    fn commit_all(&self, message: &str) -> Result<String> {
        self.inner.commit_all(message)
    }
    fn create_annotated_tag(&self, name: &str, target: &str, message: &str, force: bool) -> Result<()> {
        self.inner.create_annotated_tag(name, target, message, force)
    }
    fn delete_tag(&self, name: &str) -> Result<()> {
        self.inner.delete_tag(name)
    }
    fn push(&self, remote: &str, refs: &[String], options: PushOptions) -> Result<()> {
        self.inner.push(remote, refs, options)
    }
    fn branch_upstream(&self, branch: &str) -> Result<Option<String>> {
        self.inner.branch_upstream(branch)
    }
    fn remote_url(&self, remote: &str) -> Result<Option<String>> {
        self.inner.remote_url(remote)
    }
    fn export_tree(&self, rev: &str, dest: &Path) -> Result<()> {
        self.inner.export_tree(rev, dest)
    }
}

fn interactive() -> ReleaseOptions {
    ReleaseOptions::default()
}

fn unattended() -> ReleaseOptions {
    ReleaseOptions {
        yes: true,
        ..ReleaseOptions::default()
    }
}

fn released(outcome: ReleaseOutcome) -> ReleaseReport {
    match outcome {
        ReleaseOutcome::Released(report) => *report,
        other => panic!("expected a release, got {:?}", other),
    }
}

fn manifest_version(dir: &Path) -> String {
    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.join("package.json")).unwrap()).unwrap();
    manifest["version"].as_str().unwrap().to_string()
}

// ============================================================================
// Patch release on an existing major line
// ============================================================================

#[test]
fn test_patch_release_from_main() {
    let fixture = Fixture::patch_release(&["yes", "yes"]);

    let report = released(fixture.run(interactive()).unwrap());
    let repo = &fixture.repo;

    assert_eq!(report.plan.version, Version::new(1, 4, 3));
    assert!(!report.plan.is_major);
    assert_eq!(report.plan.original_branch.as_deref(), Some("main"));
    assert!(report.pushed);

    // release commit lands on v1.x and main is fast-forwarded to it
    assert_eq!(repo.current_branch().as_deref(), Some("main"));
    assert_eq!(repo.tag_target("v1.4.3"), repo.branch_head("v1.x"));
    assert_eq!(repo.branch_head("main"), repo.branch_head("v1.x"));
    assert_eq!(repo.tag_target("latest"), repo.tag_target("v1.4.3"));
    assert_eq!(repo.tag_target("v1.next"), repo.tag_target("v1.4.3"));
    assert_eq!(repo.tag_target("v1"), None);

    let message = repo.message("v1.4.3").unwrap();
    assert!(message.starts_with("build(release): release v1.4.3\n\n"));
    assert!(message.contains("crash on empty input"));

    assert_eq!(
        repo.operations()[..2],
        ["switch v1.x".to_string(), "merge --ff-only main".to_string()]
    );

    let pushes = repo.pushes();
    assert_eq!(pushes.len(), 2);
    assert!(pushes[0].options.atomic);
    assert!(pushes[0].options.force);
    assert_eq!(
        pushes[0].refs,
        vec![
            "refs/heads/v1.x",
            "refs/tags/v1.4.3",
            "refs/tags/latest",
            "refs/tags/next",
            "refs/tags/v1.latest",
            "refs/tags/v1.next",
        ]
    );
    assert_eq!(pushes[1].refs, vec!["refs/heads/main"]);

    assert_eq!(manifest_version(fixture.dir.path()), "1.4.3");
    let changelog = fixture.read("CHANGELOG.md");
    assert!(changelog.starts_with("# Changelog\n\n### v1.4.3 (2026-10-15)\n"));
    assert!(changelog.contains("https://github.com/acme/widgets/compare/v1.4.2...v1.4.3"));

    let hosted = fixture.hosting.created();
    assert_eq!(hosted.len(), 1);
    assert_eq!(hosted[0].tag_name, "v1.4.3");
    assert!(!hosted[0].prerelease);
    assert!(report.hosted_release.unwrap().ends_with("/releases/tag/v1.4.3"));

    let runs = fixture.scripts.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].kind, ScriptKind::Test);
    assert_eq!(runs[0].version, "1.4.3");
    assert_eq!(runs[0].previous_version.as_deref(), Some("1.4.2"));
}

#[test]
fn test_restore_when_original_branch_already_has_release() {
    let fixture = Fixture::patch_release(&["yes", "yes"]);
    let repo = MergedByOthers {
        inner: &fixture.repo,
    };
    let collaborators = Collaborators {
        repository: &repo,
        ..fixture.collaborators(true)
    };

    let report = released(fixture.run_with(collaborators, interactive()).unwrap());

    assert_eq!(report.plan.version, Version::new(1, 4, 3));
    assert_eq!(fixture.repo.current_branch().as_deref(), Some("main"));
    assert_eq!(fixture.repo.branch_head("main"), fixture.repo.tag_target("v1.4.3"));
    assert_eq!(fixture.repo.pushes().last().unwrap().refs, vec!["refs/heads/main"]);
}

#[test]
fn test_release_on_release_branch_keeps_branch() {
    let fixture = Fixture::new(&[]);
    fixture.repo.release("1.0.0");
    fixture.repo.checkout("v1.x");
    fixture.repo.commit("feat: widgets api");

    let report = released(fixture.run(unattended()).unwrap());

    assert_eq!(report.plan.version, Version::new(1, 1, 0));
    assert_eq!(report.plan.original_branch, None);
    assert!(!report.pushed);
    assert!(report
        .warnings
        .contains(&ReleaseWarning::NoRemote { remote: "origin".to_string() }));
    assert_eq!(fixture.repo.current_branch().as_deref(), Some("v1.x"));
    assert!(fixture.repo.pushes().is_empty());
}

#[test]
fn test_first_release_creates_parent_branch() {
    let fixture = Fixture::new(&[]);
    fixture.repo.commit("feat: first feature");

    let report = released(fixture.run(unattended()).unwrap());

    assert_eq!(report.plan.version, Version::new(0, 0, 1));
    assert_eq!(report.plan.previous, None);
    assert_eq!(fixture.repo.operations()[0], "switch -c v0.x");
    assert_eq!(fixture.repo.branch_head("main"), fixture.repo.branch_head("v0.x"));
    assert_eq!(fixture.repo.tag_target("latest"), fixture.repo.tag_target("v0.0.1"));
}

#[test]
fn test_pre_release_label() {
    let fixture = Fixture::patch_release(&[]);
    let options = ReleaseOptions {
        pre_release: "beta".parse::<PreReleaseLabel>().unwrap(),
        yes: true,
        ..ReleaseOptions::default()
    };

    let report = released(fixture.run(options).unwrap());

    assert_eq!(report.plan.version.to_string(), "1.4.3-beta.1");
    assert_eq!(fixture.repo.tag_target("latest"), None);
    assert_eq!(fixture.repo.tag_target("next"), fixture.repo.tag_target("v1.4.3-beta.1"));
    assert!(fixture.hosting.created()[0].prerelease);
}

// ============================================================================
// Major release
// ============================================================================

#[test]
fn test_breaking_change_opens_new_major_line() {
    let fixture = Fixture::new(&[]);
    fixture.repo.release("2.0.0");
    fixture.repo.set_branch("v2.x", "v2.0.0");
    fixture.repo.commit("feat!: drop legacy api");
    fixture.repo.add_remote("origin", "https://github.com/acme/widgets.git");
    fs::write(
        fixture.dir.path().join("CHANGELOG.md"),
        "# Changelog\n\n### v2.0.0 (2026-01-01)\n\n- old\n",
    )
    .unwrap();

    let report = released(
        fixture
            .run_with(fixture.collaborators(false), unattended())
            .unwrap(),
    );
    let repo = &fixture.repo;

    assert_eq!(report.plan.version, Version::new(3, 0, 0));
    assert!(report.plan.is_major);
    assert_eq!(report.plan.release_branch.name(), "v3.x");

    // v2.x stays pinned at the previous release, v3.x carries the new one
    assert_eq!(repo.branch_head("v2.x"), repo.tag_target("v2.0.0"));
    assert_eq!(repo.branch_head("v3.x"), repo.tag_target("v3.0.0"));
    assert_eq!(repo.branch_head("main"), repo.tag_target("v3.0.0"));
    assert!(repo
        .operations()
        .contains(&"branch -f v2.x v2.0.0".to_string()));

    let pushes = repo.pushes();
    assert_eq!(pushes[0].refs, vec!["v3.x"]);
    assert!(pushes[0].options.set_upstream);
    assert_eq!(
        pushes[1].refs[..3],
        [
            "refs/heads/v3.x".to_string(),
            "refs/heads/v2.x".to_string(),
            "refs/tags/v3.0.0".to_string()
        ]
    );

    // a new major line starts a fresh changelog
    let changelog = fixture.read("CHANGELOG.md");
    assert!(changelog.contains("### v3.0.0"));
    assert!(!changelog.contains("v2.0.0 (2026-01-01)"));

    assert!(report.warnings.contains(&ReleaseWarning::MissingHostingToken {
        env: "GITHUB_TOKEN".to_string()
    }));
    assert!(report
        .warnings
        .contains(&ReleaseWarning::BranchNotTracked { branch: "main".to_string() }));
}

// ============================================================================
// Confirmation checkpoints
// ============================================================================

#[test]
fn test_declined_intent_cancels_without_changes() {
    let fixture = Fixture::patch_release(&["no"]);

    let outcome = fixture.run(interactive()).unwrap();

    assert_eq!(
        outcome,
        ReleaseOutcome::Cancelled {
            state: ReleaseState::ConfirmIntent
        }
    );
    assert!(fixture.repo.operations().is_empty());
    assert!(fixture.scripts.runs().is_empty());
}

#[test]
fn test_no_changes_asks_before_continuing() {
    let fixture = Fixture::new(&["no"]);
    fixture.repo.release("1.0.0");
    fixture.repo.set_branch("v1.x", "v1.0.0");

    let outcome = fixture.run(interactive()).unwrap();

    assert!(outcome.is_cancelled());
    assert!(fixture.prompt.asked()[0].starts_with("No changes since the previous release"));
}

#[test]
fn test_no_notable_changes_asks_before_continuing() {
    let fixture = Fixture::new(&["no"]);
    fixture.repo.release("1.0.0");
    fixture.repo.set_branch("v1.x", "v1.0.0");
    fixture.repo.commit("chore: bump tooling");

    let outcome = fixture.run(interactive()).unwrap();

    assert!(outcome.is_cancelled());
    assert!(fixture.prompt.asked()[0].starts_with("No notable changes"));
}

#[test]
fn test_declined_changelog_cancels() {
    let fixture = Fixture::patch_release(&["yes", "no"]);

    let outcome = fixture.run(interactive()).unwrap();

    assert_eq!(
        outcome,
        ReleaseOutcome::Cancelled {
            state: ReleaseState::WriteChangelog
        }
    );
    assert_eq!(fixture.repo.tag_target("v1.4.3"), None);
    assert!(!fixture.dir.path().join("CHANGELOG.md").exists());
}

#[test]
fn test_edited_changelog_is_linted_and_used() {
    let mut fixture = Fixture::patch_release(&["yes", "edit changelog", "yes"]);
    fixture.editor = ScriptedEditor::new(["**Fixes:**\n* handle empty input   \n\n\n"]);

    released(fixture.run(interactive()).unwrap());

    let changelog = fixture.read("CHANGELOG.md");
    assert!(changelog.contains("**Fixes:**\n- handle empty input\n"));
    assert!(fixture
        .repo
        .message("v1.4.3")
        .unwrap()
        .contains("- handle empty input"));
    assert_eq!(fixture.prompt.remaining(), 0);
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_dirty_tree_is_rejected() {
    let fixture = Fixture::patch_release(&[]);
    fixture.repo.set_dirty(true);

    let err = fixture.run(unattended()).unwrap_err();

    assert!(err.is_validation());
    assert_eq!(err.failed_step(), Some(ReleaseState::Validate));
}

#[test]
fn test_missing_editor_is_rejected() {
    let fixture = Fixture::patch_release(&[]);
    let collaborators = Collaborators {
        editor: None,
        ..fixture.collaborators(true)
    };

    let err = fixture.run_with(collaborators, unattended()).unwrap_err();

    assert!(err.is_validation());
    assert!(err.to_string().contains("Editor is not configured"));
}

#[test]
fn test_previous_release_must_head_release_branch() {
    let fixture = Fixture::new(&[]);
    fixture.repo.release("1.4.2");
    fixture.repo.commit("fix: crash");

    let err = fixture.run(unattended()).unwrap_err();

    assert_eq!(err.failed_step(), Some(ReleaseState::DetermineBranchStrategy));
    assert!(err
        .to_string()
        .contains("Release v1.4.2 must be the head of release branch v1.x"));
}

#[test]
fn test_disallowed_branch_is_rejected() {
    let mut fixture = Fixture::patch_release(&[]);
    fixture.config.release.branches = Some(vec!["release".to_string()]);

    let err = fixture.run(unattended()).unwrap_err();

    assert!(err.is_validation());
    assert!(fixture.repo.operations().is_empty());
}

#[test]
fn test_stable_release_rejects_pre_release_dependencies() {
    let fixture = Fixture::patch_release(&[]);
    fs::write(
        fixture.dir.path().join("package.json"),
        r#"{"name": "@acme/widgets", "version": "1.4.2", "dependencies": {"@acme/core": "2.0.0-rc.1"}}"#,
    )
    .unwrap();

    let err = fixture.run(unattended()).unwrap_err();

    assert_eq!(err.failed_step(), Some(ReleaseState::ComputeNextVersion));
    assert!(err.to_string().contains("@acme/core@2.0.0-rc.1"));
}

// ============================================================================
// Retries
// ============================================================================

#[test]
fn test_push_failure_is_retried_on_request() {
    let fixture = Fixture::patch_release(&["yes", "yes", "retry"]);
    fixture.repo.fail_pushes(1);

    let report = released(fixture.run(interactive()).unwrap());

    assert!(report.pushed);
    assert_eq!(fixture.repo.pushes().len(), 2);
    assert!(fixture
        .prompt
        .asked()
        .iter()
        .any(|prompt| prompt.starts_with("Push failed")));
}

#[test]
fn test_unattended_push_failure_stops_release() {
    let fixture = Fixture::patch_release(&[]);
    fixture.repo.fail_pushes(1);

    let err = fixture.run(unattended()).unwrap_err();

    assert_eq!(
        err.failed_step(),
        Some(ReleaseState::PushAndCreateUpstreamRelease)
    );
    assert!(matches!(
        err,
        MonorelError::StepFailed { ref source, .. } if matches!(**source, MonorelError::Remote(_))
    ));
    // local release is kept
    assert!(fixture.repo.tag_target("v1.4.3").is_some());
}

#[test]
fn test_hosted_release_is_retried() {
    let fixture = Fixture::patch_release(&["yes", "yes", "retry"]);
    fixture.hosting.fail_next(1);

    let report = released(fixture.run(interactive()).unwrap());

    assert!(report.hosted_release.is_some());
    assert_eq!(fixture.hosting.created().len(), 1);
}

// ============================================================================
// Docs and publish
// ============================================================================

#[test]
fn test_docs_build_runs_on_release_branch() {
    let mut fixture = Fixture::patch_release(&[]);
    fixture.scripts = RecordingScripts::with(&[ScriptKind::Test, ScriptKind::Docs]);

    released(fixture.run(unattended()).unwrap());

    let runs = fixture.scripts.runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[1].kind, ScriptKind::Docs);
    assert_eq!(runs[1].release_branch, "v1.x");
}

#[test]
fn test_publish_after_push() {
    let fixture = Fixture::patch_release(&[]);
    fixture.registry.add_package("@acme/widgets", &["1.4.2"]);
    fixture.repo.write_file(
        "package.json",
        r#"{"name": "@acme/widgets", "version": "1.4.3"}"#,
    );
    let options = ReleaseOptions {
        publish: true,
        ..unattended()
    };

    let report = released(fixture.run(options).unwrap());

    assert_eq!(
        report.published,
        vec![(
            "@acme/widgets".to_string(),
            PublishOutcome::Published {
                version: Version::new(1, 4, 3),
                dist_tag: Some(monorel::domain::FloatingTag::Latest),
            }
        )]
    );
    assert_eq!(
        fixture.registry.writes(),
        vec![
            "publish @acme/widgets@1.4.3 --tag latest",
            "dist-tag add @acme/widgets@1.4.3 next",
        ]
    );

    // publishing the same release again writes nothing
    let coordinator =
        monorel::registry::PublishCoordinator::new(&fixture.repo, &fixture.registry);
    let package = Package::open(fixture.dir.path(), "").unwrap();
    let again = coordinator.release(&package, "v1.4.3", None).unwrap();
    assert_eq!(again, PublishOutcome::AlreadyPublished(Version::new(1, 4, 3)));
    assert_eq!(fixture.registry.writes().len(), 2);
    assert!(fixture.repo.find_commit("v1.4.3").unwrap().is_some());
}
