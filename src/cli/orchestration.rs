//! Command workflows
//!
//! Each `run_*` function wires the real collaborators (git2 repository, npm,
//! GitHub, terminal prompt, external editor) for one CLI command. The pieces that
//! only need a [Repository] are split out so they run against any backend.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analyzer::{
    markdown_to_text, ChangelogBuilder, ChangelogRenderer, MarkdownNormalizer, ResolvedTags,
    TagResolver,
};
use crate::batch::{self, BatchOptions, BatchReport};
use crate::config::Config;
use crate::domain::PreReleaseLabel;
use crate::git::{Git2Repository, Repository, Upstream};
use crate::hooks::ProcessScriptRunner;
use crate::hosting::{GitHubReleases, HostedReleaseApi};
use crate::package::Package;
use crate::registry::{NpmRegistry, PublishCoordinator, PublishOutcome};
use crate::release::{
    apply_resolved_tags, Collaborators, ReleaseOptions, ReleaseOrchestrator, ReleaseOutcome,
    RetryPolicy,
};
use crate::ui::{formatter, ExternalEditor, TerminalPrompt, TextEditor};

/// Arguments of the release workflow
///
/// Mirrors the CLI arguments in a form that does not depend on clap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseWorkflowArgs {
    /// Package root
    pub root: PathBuf,
    /// Pre-release label, `stable`, or `None` to follow the previous release
    pub pre_release: Option<String>,
    pub publish: bool,
    pub yes: bool,
}

/// Opened repository plus the package at `root`
struct Workspace {
    repository: Git2Repository,
    package: Package,
}

fn open_workspace(root: &Path) -> Result<Workspace> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Package root {} not found", root.display()))?;
    let repository = Git2Repository::open(&root).context("Not a git repository")?;

    let workdir = repository
        .workdir()
        .canonicalize()
        .unwrap_or_else(|_| repository.workdir().to_path_buf());
    let tree_path = root
        .strip_prefix(&workdir)
        .map(Path::to_path_buf)
        .unwrap_or_default();
    debug!(root = %root.display(), tree_path = %tree_path.display(), "Opened workspace");

    let package = Package::open(&root, tree_path)?;
    Ok(Workspace {
        repository,
        package,
    })
}

/// Run a full release
pub fn run_release(args: &ReleaseWorkflowArgs, config: &Config) -> Result<ReleaseOutcome> {
    let workspace = open_workspace(&args.root)?;

    let pre_release = PreReleaseLabel::from_option(args.pre_release.as_deref())?;
    let options = ReleaseOptions {
        pre_release,
        publish: args.publish,
        yes: args.yes,
    };

    let scripts = ProcessScriptRunner::new(config.scripts.clone());
    let prompt = TerminalPrompt::new();
    let editor = config.release.resolve_editor().map(ExternalEditor::new);
    let linter = MarkdownNormalizer;
    let registry = NpmRegistry::new(config.publish.npm.clone(), workspace.package.root());
    let hosting = config
        .hosting
        .token()
        .map(|token| GitHubReleases::new(config.hosting.api_url.clone(), token));

    let collaborators = Collaborators {
        repository: &workspace.repository,
        scripts: &scripts,
        prompt: &prompt,
        editor: editor.as_ref().map(|e| e as &dyn TextEditor),
        linter: &linter,
        registry: &registry,
        hosting: hosting.as_ref().map(|h| h as &dyn HostedReleaseApi),
    };

    let mut orchestrator =
        ReleaseOrchestrator::new(config, workspace.package, collaborators, options);
    Ok(orchestrator.run()?)
}

/// Resolve floating tags of `repository`, applying pending changes when `apply` is set
///
/// # Returns
/// * the resolution table and the applied changes (empty without `apply`)
pub fn resolve_tags(
    repository: &dyn Repository,
    config: &Config,
    apply: bool,
) -> Result<(ResolvedTags, Vec<String>)> {
    let resolved = TagResolver::new(config.release.major_tag_enabled).resolve(&repository.tags()?);
    if !apply || resolved.is_up_to_date() {
        return Ok((resolved, Vec::new()));
    }

    let remote = repository
        .remote_url(&config.release.remote)?
        .map(|_| config.release.remote.as_str());
    let applied = apply_resolved_tags(repository, &resolved, remote)?;
    Ok((resolved, applied))
}

/// Print (and optionally apply) the floating tag table of the repository at `root`
pub fn run_tags(root: &Path, config: &Config, apply: bool) -> Result<ResolvedTags> {
    let workspace = open_workspace(root)?;
    let (resolved, applied) = resolve_tags(&workspace.repository, config, apply)?;

    formatter::display_tag_table(&resolved);
    if apply {
        if applied.is_empty() {
            formatter::display_success("Floating tags are up to date");
        }
        for change in &applied {
            formatter::display_success(change);
        }
    }
    Ok(resolved)
}

/// Update floating tags of several repositories on a worker pool
pub fn run_update_tags(
    paths: &[PathBuf],
    jobs: usize,
    apply: bool,
    config: &Config,
) -> Result<BatchReport> {
    let options = BatchOptions {
        jobs,
        apply,
        major_tag_enabled: config.release.major_tag_enabled,
        remote: config.release.remote.clone(),
    };

    let report = batch::update_tags(paths, &options, |path| {
        Ok(Box::new(Git2Repository::open(path)?) as Box<dyn Repository>)
    })?;

    for update in &report.updates {
        match &update.result {
            Ok(changes) if changes.is_empty() => {
                formatter::display_success(&format!("{}: up to date", update.path.display()))
            }
            Ok(changes) => formatter::display_success(&format!(
                "{}: {}",
                update.path.display(),
                changes.join(", ")
            )),
            Err(e) => formatter::display_error(&format!("{}: {}", update.path.display(), e)),
        }
    }
    Ok(report)
}

/// Plain-text changelog of the changes since the previous (stable) release
pub fn changelog_preview(
    repository: &dyn Repository,
    config: &Config,
    stable_only: bool,
) -> Result<String> {
    let changes = repository.release_changes("HEAD", stable_only)?;
    let changelog =
        ChangelogBuilder::new(config.commits.commit_types()).build(changes.changes, changes.previous);

    let upstream = match repository.remote_url(&config.release.remote)? {
        Some(url) => Upstream::from_remote_url(&url)?,
        None => None,
    };
    let renderer = ChangelogRenderer::new(&changelog).with_upstream(upstream.as_ref());

    let mut out = changelog.report();
    out.push('\n');
    out.push_str(&markdown_to_text(&renderer.markdown(None, true)));
    Ok(out)
}

/// Print the changelog of unreleased changes
pub fn run_changelog(root: &Path, config: &Config, stable_only: bool) -> Result<()> {
    let workspace = open_workspace(root)?;
    let text = changelog_preview(&workspace.repository, config, stable_only)?;
    println!("{}", text.trim_end());
    Ok(())
}

/// Publish the release at `rev` of the package and its sub-packages
pub fn run_publish(root: &Path, config: &Config, rev: &str) -> Result<Vec<(String, PublishOutcome)>> {
    let workspace = open_workspace(root)?;
    let registry = NpmRegistry::new(config.publish.npm.clone(), workspace.package.root());
    let prompt = TerminalPrompt::new();
    let retry = RetryPolicy::new(&prompt, true);
    let coordinator = PublishCoordinator::new(&workspace.repository, &registry);

    let packages = std::iter::once(workspace.package.clone())
        .chain(workspace.package.sub_packages(&config.release.sub_packages)?);

    let mut published = Vec::new();
    for pkg in packages {
        let name = pkg.display_name();
        info!(package = %name, rev, "Publishing");
        let outcome = retry.run(&format!("Publish {}", name), || {
            coordinator.release(&pkg, rev, config.publish.access)
        })?;
        formatter::display_status(&format!("Publish {}: {}", name, outcome));
        published.push((name, outcome));
    }
    Ok(published)
}
