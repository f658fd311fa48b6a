use crate::analyzer::{markdown_to_text, Changelog, ChangelogBuilder, ChangelogLinter, ChangelogRenderer};
use crate::boundary::ReleaseWarning;
use crate::config::Config;
use crate::domain::{PreReleaseLabel, Release, ReleaseBranch, RELEASE_COMMIT_PREFIX};
use crate::error::{MonorelError, Result};
use crate::git::{Hosting, PushOptions, RepoStatus, Repository, Upstream};
use crate::hooks::{ScriptContext, ScriptKind, ScriptRunner};
use crate::hosting::{HostedRelease, HostedReleaseApi};
use crate::package::Package;
use crate::registry::{PublishCoordinator, PublishOutcome, RegistryBackend};
use crate::release::changelog_file::write_changelog;
use crate::release::floating::{select_floating_tags, set_floating_tags};
use crate::release::plan::ReleasePlan;
use crate::release::retry::RetryPolicy;
use crate::release::state::{ReleaseProgress, ReleaseState};
use crate::ui::{formatter, ConfirmationProvider, TextEditor};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

const CONTINUE_OPTIONS: [&str; 2] = ["yes", "no"];
const CHANGELOG_OPTIONS: [&str; 3] = ["edit changelog", "yes", "no"];

/// Per-run switches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseOptions {
    pub pre_release: PreReleaseLabel,
    /// Publish packages to the registry after pushing
    pub publish: bool,
    /// Skip every confirmation; retried operations fail on the first error
    pub yes: bool,
}

/// External systems a release talks to
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub repository: &'a dyn Repository,
    pub scripts: &'a dyn ScriptRunner,
    pub prompt: &'a dyn ConfirmationProvider,
    /// `None` when no editor is configured, which blocks the release
    pub editor: Option<&'a dyn TextEditor>,
    pub linter: &'a dyn ChangelogLinter,
    pub registry: &'a dyn RegistryBackend,
    /// `None` when no hosting credential is available
    pub hosting: Option<&'a dyn HostedReleaseApi>,
}

/// What a finished release did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    pub plan: ReleasePlan,
    /// Hash of the release commit
    pub commit: String,
    pub pushed: bool,
    pub hosted_release: Option<String>,
    pub published: Vec<(String, PublishOutcome)>,
    pub warnings: Vec<ReleaseWarning>,
}

/// How a release run ended without an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released(Box<ReleaseReport>),
    /// The operator declined a confirmation in `state`
    Cancelled { state: ReleaseState },
}

impl ReleaseOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReleaseOutcome::Cancelled { .. })
    }
}

/// Data gathered while the run moves through its steps
struct RunState {
    status: RepoStatus,
    sub_packages: Vec<Package>,
    upstream: Option<Upstream>,
    changelog: Changelog,
}

/// Changelog as accepted by the operator
struct ChangelogContent {
    markdown: String,
    text: String,
}

/// Drives one release from validation to restoring the original branch
///
/// Steps run strictly in [ReleaseState] order. A failing step stops the run and is
/// reported through [MonorelError::StepFailed]; already applied git operations are
/// not rolled back.
pub struct ReleaseOrchestrator<'a> {
    config: &'a Config,
    package: Package,
    collab: Collaborators<'a>,
    options: ReleaseOptions,
    progress: ReleaseProgress,
    warnings: Vec<ReleaseWarning>,
    date: DateTime<Utc>,
}

impl<'a> ReleaseOrchestrator<'a> {
    pub fn new(
        config: &'a Config,
        package: Package,
        collab: Collaborators<'a>,
        options: ReleaseOptions,
    ) -> Self {
        ReleaseOrchestrator {
            config,
            package,
            collab,
            options,
            progress: ReleaseProgress::new(),
            warnings: Vec::new(),
            date: Utc::now(),
        }
    }

    /// Release date written to the changelog
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    pub fn progress(&self) -> &ReleaseProgress {
        &self.progress
    }

    /// Run the release
    ///
    /// # Returns
    /// * `Ok(ReleaseOutcome::Released)` - Release finished
    /// * `Ok(ReleaseOutcome::Cancelled)` - Operator declined a confirmation
    /// * `Err(MonorelError::StepFailed)` - A step failed
    pub fn run(&mut self) -> Result<ReleaseOutcome> {
        match self.execute() {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let step = self.progress.state();
                self.progress.fail();
                error!(step = %step, error = %e, "Release failed");
                Err(e.in_step(step))
            }
        }
    }

    fn execute(&mut self) -> Result<ReleaseOutcome> {
        formatter::display_status(&format!("Releasing package: {}", self.package.display_name()));

        self.progress.advance(ReleaseState::Validate);
        let mut run = self.validate()?;

        self.progress.advance(ReleaseState::ResolveChangelog);
        run.changelog = self.resolve_changelog()?;
        run.upstream = self.resolve_upstream()?;

        self.progress.advance(ReleaseState::DetermineBranchStrategy);
        let (parent_branch, original_branch) = self.determine_branch_strategy(&run)?;

        self.progress.advance(ReleaseState::ComputeNextVersion);
        let mut plan = self.compute_next_version(&run, parent_branch, original_branch)?;

        self.progress.advance(ReleaseState::ConfirmIntent);
        if !self.confirm_intent(&run, &plan)? {
            return Ok(self.cancelled());
        }

        self.progress.advance(ReleaseState::RunTests);
        self.run_tests(&run, &plan)?;

        self.progress.advance(ReleaseState::PrepareBranches);
        self.prepare_branches(&run, &plan)?;

        self.progress.advance(ReleaseState::BuildDocs);
        if self.build_docs(&plan)? {
            run.changelog = self.resolve_changelog()?;
            plan.previous = run.changelog.previous_release().cloned();
        }

        self.progress.advance(ReleaseState::WriteChangelog);
        let Some(content) = self.write_changelog(&run, &plan)? else {
            return Ok(self.cancelled());
        };

        self.progress.advance(ReleaseState::BumpVersions);
        self.bump_versions(&mut run, &plan)?;

        self.progress.advance(ReleaseState::CommitAndTag);
        let commit = self.commit_and_tag(&plan, &content)?;

        self.progress.advance(ReleaseState::SetFloatingTags);
        set_floating_tags(self.collab.repository, &plan.floating_tags, &plan.version)?;

        self.progress.advance(ReleaseState::PushAndCreateUpstreamRelease);
        let (pushed, hosted_release) = self.push_and_create_upstream_release(&run, &plan, &content)?;

        self.progress.advance(ReleaseState::PublishPackages);
        let published = if self.options.publish {
            self.publish_packages(&run, &plan)?
        } else {
            Vec::new()
        };

        self.progress.advance(ReleaseState::RestoreOriginalBranch);
        self.restore_original_branch(&plan, pushed)?;

        self.progress.advance(ReleaseState::Done);
        formatter::display_success(&format!("Released {}", plan.tag_name()));

        Ok(ReleaseOutcome::Released(Box::new(ReleaseReport {
            plan,
            commit,
            pushed,
            hosted_release,
            published,
            warnings: std::mem::take(&mut self.warnings),
        })))
    }

    fn cancelled(&self) -> ReleaseOutcome {
        info!(step = %self.progress.state(), "Release cancelled");
        formatter::display_status("Release cancelled");
        ReleaseOutcome::Cancelled {
            state: self.progress.state(),
        }
    }

    fn warn(&mut self, warning: ReleaseWarning) {
        formatter::display_warning(&warning);
        self.warnings.push(warning);
    }

    fn retry_policy(&self) -> RetryPolicy<'a> {
        RetryPolicy::new(self.collab.prompt, !self.options.yes)
    }

    fn all_packages<'r>(&'r self, run: &'r RunState) -> impl Iterator<Item = &'r Package> {
        std::iter::once(&self.package).chain(run.sub_packages.iter())
    }

    fn validate(&mut self) -> Result<RunState> {
        if self.collab.editor.is_none() {
            return Err(MonorelError::validation("Editor is not configured"));
        }
        if !self.config.release.enabled {
            return Err(MonorelError::validation("Package release is disabled"));
        }

        let status = self.collab.repository.status()?;
        if status.is_dirty {
            return Err(MonorelError::validation(
                "Working tree has uncommitted changes or untracked files",
            ));
        }

        let sub_packages = self.package.sub_packages(&self.config.release.sub_packages)?;

        Ok(RunState {
            status,
            sub_packages,
            upstream: None,
            changelog: ChangelogBuilder::default().build(Default::default(), None),
        })
    }

    fn resolve_changelog(&self) -> Result<Changelog> {
        let stable_only = self.options.pre_release.is_stable();
        let changes = self.collab.repository.release_changes("HEAD", stable_only)?;
        debug!(
            previous = ?changes.previous.as_ref().map(|r| r.version.to_string()),
            count = changes.changes.len(),
            "Resolved release changes"
        );

        let builder = ChangelogBuilder::new(self.config.commits.commit_types());
        Ok(builder.build(changes.changes, changes.previous))
    }

    fn resolve_upstream(&mut self) -> Result<Option<Upstream>> {
        let remote = self.config.release.remote.clone();
        let Some(url) = self.collab.repository.remote_url(&remote)? else {
            return Ok(None);
        };

        let upstream = Upstream::from_remote_url(&url)?;
        if upstream.is_none() {
            self.warn(ReleaseWarning::UnknownUpstream { remote, url });
        }
        Ok(upstream)
    }

    fn determine_branch_strategy(&self, run: &RunState) -> Result<(ReleaseBranch, Option<String>)> {
        let previous = run.changelog.previous_release();
        let parent_branch = ReleaseBranch::new(previous.map_or(0, |release| release.version.major));

        let Some(branch) = run.status.head.branch.clone() else {
            return Err(MonorelError::validation(
                "Release on a detached head is not possible",
            ));
        };

        if branch == parent_branch.name() {
            return Ok((parent_branch, None));
        }

        if !self.config.release.allows_branch(&branch) {
            return Err(MonorelError::validation(format!(
                "Unable to create a release from branch '{}'",
                branch
            )));
        }

        if let Some(previous) = previous {
            let tag = previous.version.tag_name();
            let commit = self
                .collab
                .repository
                .find_commit(&tag)?
                .ok_or_else(|| MonorelError::validation(format!("Release {} not found", tag)))?;

            if !commit.branches.contains(&parent_branch.name()) {
                return Err(MonorelError::validation(format!(
                    "Release {} must be the head of release branch {}",
                    tag, parent_branch
                )));
            }
        }

        Ok((parent_branch, Some(branch)))
    }

    fn compute_next_version(
        &self,
        run: &RunState,
        parent_branch: ReleaseBranch,
        original_branch: Option<String>,
    ) -> Result<ReleasePlan> {
        let version = run.changelog.create_next_version(&self.options.pre_release)?;
        let previous = run.changelog.previous_release().cloned();
        let is_major = previous
            .as_ref()
            .is_some_and(|release| release.version.major != version.major);

        run.status.releases.can_release(&version)?;

        if version.is_stable() {
            for pkg in self.all_packages(run) {
                let deps = pkg.pre_release_dependencies();
                if !deps.is_empty() {
                    let list = deps
                        .iter()
                        .map(|dep| format!("{}@{}", dep.name, dep.spec))
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(MonorelError::validation(format!(
                        "{} depends on pre-release versions: {}",
                        pkg.display_name(),
                        list
                    )));
                }
            }
        }

        let floating_tags = select_floating_tags(
            &version,
            &run.status.releases,
            self.config.release.major_tag_enabled,
        );

        Ok(ReleasePlan {
            previous,
            release_branch: ReleaseBranch::new(version.major),
            version,
            parent_branch,
            original_branch,
            is_major,
            floating_tags,
        })
    }

    /// Returns false when the operator declines
    fn confirm_intent(&mut self, run: &RunState, plan: &ReleasePlan) -> Result<bool> {
        formatter::display_section("Changes", &run.changelog.report());
        formatter::display_release_plan(
            plan.previous_version().map(|v| v.tag_name()).as_deref(),
            &plan.tag_name(),
            &plan.release_branch.name(),
        );
        println!("{}", plan.summary());

        if !run.sub_packages.is_empty() {
            let list = run
                .sub_packages
                .iter()
                .map(|pkg| format!("  - {}", pkg.tree_path().display()))
                .collect::<Vec<_>>()
                .join("\n");
            formatter::display_section("Sub-packages", &list);
        }

        let prompt = if !run.changelog.has_changes() {
            self.warn(ReleaseWarning::NoChanges {
                previous: plan.previous_version().map(|v| v.tag_name()),
            });
            ("No changes since the previous release.\nContinue the release process?", 1)
        } else if !run.changelog.has_notable_changes() {
            self.warn(ReleaseWarning::NoNotableChanges {
                total: run.changelog.changes().len(),
            });
            (
                "No notable changes since the previous release.\nContinue the release process?",
                1,
            )
        } else {
            ("Continue the release process?", 0)
        };

        if self.options.yes {
            return Ok(true);
        }

        let (question, default) = prompt;
        Ok(self.collab.prompt.confirm(question, &CONTINUE_OPTIONS, default)? == 0)
    }

    fn script_context(&self, kind: ScriptKind, pkg: &Package, plan: &ReleasePlan) -> ScriptContext {
        ScriptContext {
            kind,
            package_root: pkg.root().to_path_buf(),
            package_name: pkg.name().map(str::to_string),
            version: plan.version.to_string(),
            previous_version: plan.previous_version().map(|v| v.to_string()),
            release_branch: plan.release_branch.name(),
        }
    }

    fn run_tests(&self, run: &RunState, plan: &ReleasePlan) -> Result<()> {
        if !self.collab.scripts.is_configured(ScriptKind::Test) {
            return Ok(());
        }
        for pkg in self.all_packages(run) {
            self.collab
                .scripts
                .run(&self.script_context(ScriptKind::Test, pkg, plan))?;
        }
        Ok(())
    }

    fn prepare_branches(&self, run: &RunState, plan: &ReleasePlan) -> Result<()> {
        let repo = self.collab.repository;
        let parent = plan.parent_branch.name();

        if let Some(original) = &plan.original_branch {
            if plan.previous.is_some() {
                info!(branch = %parent, from = %original, "Merging into release branch");
                repo.switch_branch(&parent, false)?;
                repo.merge_fast_forward(original)?;
            } else if !run.status.head.branches.contains(&parent) {
                info!(branch = %parent, "Creating release branch");
                repo.switch_branch(&parent, true)?;
            }
        }

        if plan.is_major {
            info!(branch = %plan.release_branch, "Creating new release branch");
            repo.switch_branch(&plan.release_branch.name(), true)?;

            if let Some(previous) = &plan.previous {
                info!(branch = %parent, release = %previous.version, "Pinning previous release branch");
                repo.force_branch(&parent, &previous.version.tag_name())?;
            }
        }

        Ok(())
    }

    /// Returns true when the docs build produced a commit
    fn build_docs(&self, plan: &ReleasePlan) -> Result<bool> {
        if !self.collab.scripts.is_configured(ScriptKind::Docs) {
            return Ok(false);
        }

        let context = self.script_context(ScriptKind::Docs, &self.package, plan);
        self.retry_policy()
            .run("Build docs", || self.collab.scripts.run(&context))?;

        if !self.collab.repository.is_dirty()? {
            return Ok(false);
        }

        info!("Committing documentation");
        self.collab.repository.commit_all("docs: update docs")?;
        Ok(true)
    }

    /// Returns `None` when the operator declines
    fn write_changelog(&self, run: &RunState, plan: &ReleasePlan) -> Result<Option<ChangelogContent>> {
        let editor = self
            .collab
            .editor
            .ok_or_else(|| MonorelError::validation("Editor is not configured"))?;
        let linter = self.collab.linter;

        let end = Release::new(plan.version.clone(), String::new(), self.date);
        let renderer = ChangelogRenderer::new(&run.changelog).with_upstream(run.upstream.as_ref());
        let mut markdown = linter.lint(&renderer.markdown(Some(&end), false));

        loop {
            formatter::display_section(
                "Changelog:",
                &markdown_to_text(&renderer.linkify(&markdown)),
            );

            if self.options.yes {
                break;
            }

            match self.collab.prompt.confirm(
                "Continue the release process?",
                &CHANGELOG_OPTIONS,
                1,
            )? {
                0 => markdown = linter.lint(&editor.edit(&markdown)?),
                1 => break,
                _ => return Ok(None),
            }
        }

        let path = write_changelog(
            self.package.root(),
            &plan.version,
            &end.date_string(),
            &renderer.linkify(&markdown),
            !plan.is_major,
        )?;
        debug!(path = %path.display(), "Changelog written");

        Ok(Some(ChangelogContent {
            text: markdown_to_text(&markdown),
            markdown,
        }))
    }

    fn bump_versions(&mut self, run: &mut RunState, plan: &ReleasePlan) -> Result<()> {
        for pkg in std::iter::once(&mut self.package).chain(run.sub_packages.iter_mut()) {
            if pkg.set_version(&plan.version)? {
                debug!(package = %pkg.display_name(), version = %plan.version, "Version patched");
            }
        }
        Ok(())
    }

    fn commit_and_tag(&self, plan: &ReleasePlan, content: &ChangelogContent) -> Result<String> {
        let tag = plan.tag_name();
        let repo = self.collab.repository;

        let commit = repo.commit_all(&format!(
            "{}{}\n\n{}\n",
            RELEASE_COMMIT_PREFIX, tag, content.text
        ))?;
        repo.create_annotated_tag(
            &tag,
            &commit,
            &format!("Release {}\n\n{}\n", tag, content.text),
            false,
        )?;

        info!(%tag, commit = %commit, "Release committed");
        Ok(commit)
    }

    fn push_and_create_upstream_release(
        &mut self,
        run: &RunState,
        plan: &ReleasePlan,
        content: &ChangelogContent,
    ) -> Result<(bool, Option<String>)> {
        let repo = self.collab.repository;
        let remote = self.config.release.remote.clone();

        if repo.remote_url(&remote)?.is_none() {
            self.warn(ReleaseWarning::NoRemote { remote });
            return Ok((false, None));
        }

        let retry = self.retry_policy();

        if plan.is_major {
            let branch = vec![plan.release_branch.name()];
            retry.run("Set upstream", || {
                repo.push(
                    &remote,
                    &branch,
                    PushOptions {
                        set_upstream: true,
                        ..PushOptions::default()
                    },
                )
            })?;
        }

        let refs = plan.push_refs();
        retry.run("Push", || {
            repo.push(
                &remote,
                &refs,
                PushOptions {
                    atomic: true,
                    force: true,
                    set_upstream: false,
                },
            )
        })?;
        formatter::display_success(&format!("Pushed {} refs to {}", refs.len(), remote));

        let Some(upstream) = run.upstream.as_ref() else {
            return Ok((true, None));
        };

        let api = match self.collab.hosting {
            Some(api) if api.supports(upstream) => api,
            Some(_) => return Ok((true, None)),
            None => {
                if upstream.hosting == Hosting::GitHub {
                    self.warn(ReleaseWarning::MissingHostingToken {
                        env: self.config.hosting.token_env.clone(),
                    });
                }
                return Ok((true, None));
            }
        };

        let release = HostedRelease {
            tag_name: plan.tag_name(),
            name: plan.tag_name(),
            body: content.markdown.clone(),
            prerelease: plan.version.is_pre_release(),
        };
        let url = retry.run("Create hosted release", || {
            api.create_release(upstream, &release)
        })?;
        formatter::display_success(&format!("Hosted release: {}", url));

        Ok((true, Some(url)))
    }

    fn publish_packages(
        &self,
        run: &RunState,
        plan: &ReleasePlan,
    ) -> Result<Vec<(String, PublishOutcome)>> {
        let coordinator = PublishCoordinator::new(self.collab.repository, self.collab.registry);
        let retry = self.retry_policy();
        let tag = plan.tag_name();
        let mut published = Vec::new();

        for pkg in self.all_packages(run) {
            let name = pkg.display_name();
            let outcome = retry.run(&format!("Publish {}", name), || {
                coordinator.release(pkg, &tag, self.config.publish.access)
            })?;
            formatter::display_status(&format!("Publish {}: {}", name, outcome));
            published.push((name, outcome));
        }

        Ok(published)
    }

    fn restore_original_branch(&mut self, plan: &ReleasePlan, pushed: bool) -> Result<()> {
        let Some(original) = plan.original_branch.clone() else {
            return Ok(());
        };
        let repo = self.collab.repository;

        info!(branch = %original, "Restoring original branch");
        repo.switch_branch(&original, false)?;
        repo.merge_fast_forward(&plan.release_branch.name())?;

        if !pushed {
            return Ok(());
        }

        match repo.branch_upstream(&original)? {
            Some(remote) => {
                let refs = vec![format!("refs/heads/{}", original)];
                self.retry_policy().run("Push original branch", || {
                    repo.push(&remote, &refs, PushOptions::default())
                })?;
            }
            None => self.warn(ReleaseWarning::BranchNotTracked { branch: original }),
        }

        Ok(())
    }
}
