use crate::domain::{is_release_tag, ChangeSet, Commit, Release, Releases, TagRef, Version};
use crate::error::{MonorelError, Result};
use crate::git::{HeadInfo, PushOptions, ReleaseChanges, RepoStatus};
use chrono::{DateTime, Utc};
use git2::build::CheckoutBuilder;
use git2::{BranchType, ErrorCode, Oid, Repository as Git2Repo, StatusOptions};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

type RefIndex = BTreeMap<Oid, BTreeSet<String>>;

/// Wrapper around git2::Repository with our trait interface
///
/// Pushes go through the system `git` executable, since libgit2 has no atomic push.
pub struct Git2Repository {
    repo: Mutex<Git2Repo>,
    workdir: PathBuf,
}

impl Git2Repository {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::discover(path)?;
        Ok(Self::from_git2(repo))
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Git2Repo) -> Self {
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| repo.path().to_path_buf());

        Git2Repository {
            repo: Mutex::new(repo),
            workdir,
        }
    }

    /// Root of the working tree
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn lock(&self) -> Result<MutexGuard<'_, Git2Repo>> {
        self.repo
            .lock()
            .map_err(|_| MonorelError::Git(git2::Error::from_str("repository lock poisoned")))
    }
}

fn not_found(e: &git2::Error) -> bool {
    e.code() == ErrorCode::NotFound
}

fn commit_date(commit: &git2::Commit<'_>) -> DateTime<Utc> {
    DateTime::from_timestamp(commit.time().seconds(), 0).unwrap_or_default()
}

fn tag_index(repo: &Git2Repo) -> Result<RefIndex> {
    let mut index = RefIndex::new();
    let names = repo.tag_names(None)?;

    for name in names.iter().flatten() {
        let reference = repo.find_reference(&format!("refs/tags/{}", name))?;
        match reference.peel_to_commit() {
            Ok(commit) => {
                index.entry(commit.id()).or_default().insert(name.to_string());
            }
            Err(e) => debug!(tag = name, error = %e, "Ignoring tag that does not point at a commit"),
        }
    }

    Ok(index)
}

fn branch_index(repo: &Git2Repo) -> Result<RefIndex> {
    let mut index = RefIndex::new();

    for branch in repo.branches(Some(BranchType::Local))? {
        let (branch, _) = branch?;
        if let (Some(name), Some(target)) = (branch.name()?, branch.get().target()) {
            index.entry(target).or_default().insert(name.to_string());
        }
    }

    Ok(index)
}

fn build_commit(commit: &git2::Commit<'_>, tags: &RefIndex, branches: &RefIndex) -> Commit {
    let id = commit.id();
    Commit::new(
        id.to_string(),
        commit.message().unwrap_or_default(),
        commit_date(commit),
    )
    .with_tags(tags.get(&id).into_iter().flatten().cloned())
    .with_branches(branches.get(&id).into_iter().flatten().cloned())
}

fn resolve_commit<'r>(repo: &'r Git2Repo, rev: &str) -> Result<Option<git2::Commit<'r>>> {
    match repo.revparse_single(rev) {
        Ok(object) => Ok(Some(object.peel_to_commit()?)),
        Err(e) if not_found(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn require_commit<'r>(repo: &'r Git2Repo, rev: &str) -> Result<git2::Commit<'r>> {
    resolve_commit(repo, rev)?
        .ok_or_else(|| MonorelError::Git(git2::Error::from_str(&format!("Unknown revision '{}'", rev))))
}

fn working_tree_dirty(repo: &Git2Repo) -> Result<bool> {
    let mut options = StatusOptions::new();
    options
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);

    Ok(!repo.statuses(Some(&mut options))?.is_empty())
}

impl super::Repository for Git2Repository {
    fn status(&self) -> Result<RepoStatus> {
        let repo = self.lock()?;

        let head = repo.head()?;
        let branch = if head.is_branch() {
            head.shorthand().map(str::to_string)
        } else {
            None
        };
        let head_commit = head.peel_to_commit()?;
        let branches = branch_index(&repo)?
            .remove(&head_commit.id())
            .unwrap_or_default();

        let releases = repo
            .tag_names(None)?
            .iter()
            .flatten()
            .filter(|name| is_release_tag(name))
            .filter_map(|name| Version::parse(name).ok())
            .collect();

        Ok(RepoStatus {
            is_dirty: working_tree_dirty(&repo)?,
            head: HeadInfo {
                branch,
                commit: head_commit.id().to_string(),
                branches,
            },
            releases: Releases::new(releases),
        })
    }

    fn is_dirty(&self) -> Result<bool> {
        working_tree_dirty(&*self.lock()?)
    }

    fn tags(&self) -> Result<Vec<TagRef>> {
        let repo = self.lock()?;
        let index = tag_index(&repo)?;

        let mut tags = Vec::new();
        for (oid, names) in &index {
            let release_tags: Vec<&String> = names.iter().filter(|n| is_release_tag(n)).collect();
            let release = match release_tags.as_slice() {
                [single] => Version::parse(single).ok(),
                _ => None,
            };

            for name in names {
                tags.push(TagRef::new(name.clone(), oid.to_string(), release.clone()));
            }
        }

        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    fn find_commit(&self, rev: &str) -> Result<Option<Commit>> {
        let repo = self.lock()?;
        let commit = match resolve_commit(&repo, rev)? {
            Some(commit) => commit,
            None => return Ok(None),
        };

        Ok(Some(build_commit(
            &commit,
            &tag_index(&repo)?,
            &branch_index(&repo)?,
        )))
    }

    fn release_changes(&self, rev: &str, stable_only: bool) -> Result<ReleaseChanges> {
        let repo = self.lock()?;
        let tags = tag_index(&repo)?;
        let branches = branch_index(&repo)?;

        let start = require_commit(&repo, rev)?;
        let head = build_commit(&start, &tags, &branches);

        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)?;
        revwalk.push(start.id())?;

        let mut previous = None;
        let mut changes = Vec::new();

        for oid in revwalk {
            let commit = build_commit(&repo.find_commit(oid?)?, &tags, &branches);

            if let Some(version) = commit.release_version() {
                if !stable_only || version.is_stable() {
                    previous = Some(Release::new(version, commit.hash.clone(), commit.date));
                    break;
                }
            }

            changes.push(commit);
        }

        changes.reverse();
        debug!(rev, changes = changes.len(), "Collected release changes");

        Ok(ReleaseChanges {
            previous,
            head,
            changes: ChangeSet::new(changes),
        })
    }

    fn switch_branch(&self, name: &str, create: bool) -> Result<()> {
        let repo = self.lock()?;

        if create {
            let head = repo.head()?.peel_to_commit()?;
            repo.branch(name, &head, false)?;
        }

        let refname = format!("refs/heads/{}", name);
        let target = repo.revparse_single(&refname)?;

        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        repo.checkout_tree(&target, Some(&mut checkout))?;
        repo.set_head(&refname)?;

        debug!(branch = name, create, "Switched branch");
        Ok(())
    }

    fn merge_fast_forward(&self, branch: &str) -> Result<()> {
        let repo = self.lock()?;

        let reference = repo.find_reference(&format!("refs/heads/{}", branch))?;
        let annotated = repo.reference_to_annotated_commit(&reference)?;
        let (analysis, _) = repo.merge_analysis(&[&annotated])?;

        if analysis.is_up_to_date() {
            return Ok(());
        }

        if !analysis.is_fast_forward() {
            return Err(MonorelError::Git(git2::Error::from_str(&format!(
                "Branch '{}' cannot be fast-forward merged",
                branch
            ))));
        }

        let target = repo.find_object(annotated.id(), None)?;
        let mut checkout = CheckoutBuilder::new();
        checkout.safe();
        repo.checkout_tree(&target, Some(&mut checkout))?;

        let mut head = repo.head()?;
        head.set_target(annotated.id(), &format!("merge {}: Fast-forward", branch))?;

        Ok(())
    }

    fn force_branch(&self, branch: &str, target: &str) -> Result<()> {
        let repo = self.lock()?;
        let commit = require_commit(&repo, target)?;
        repo.branch(branch, &commit, true)?;
        Ok(())
    }

    fn commit_all(&self, message: &str) -> Result<String> {
        let repo = self.lock()?;

        let mut index = repo.index()?;
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;

        let tree = repo.find_tree(index.write_tree()?)?;
        let signature = repo.signature()?;

        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if e.code() == ErrorCode::UnbornBranch || not_found(&e) => None,
            Err(e) => return Err(e.into()),
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;

        Ok(oid.to_string())
    }

    fn create_annotated_tag(
        &self,
        name: &str,
        target: &str,
        message: &str,
        force: bool,
    ) -> Result<()> {
        let repo = self.lock()?;
        let commit = require_commit(&repo, target)?;
        let signature = repo.signature()?;

        repo.tag(name, commit.as_object(), &signature, message, force)
            .map_err(|e| MonorelError::tag(format!("Cannot create tag '{}': {}", name, e)))?;

        Ok(())
    }

    fn delete_tag(&self, name: &str) -> Result<()> {
        self.lock()?
            .tag_delete(name)
            .map_err(|e| MonorelError::tag(format!("Cannot delete tag '{}': {}", name, e)))
    }

    fn push(&self, remote: &str, refs: &[String], options: PushOptions) -> Result<()> {
        let mut command = Command::new("git");
        command.current_dir(&self.workdir).arg("push");

        if options.atomic {
            command.arg("--atomic");
        }
        if options.force {
            command.arg("--force");
        }
        if options.set_upstream {
            command.arg("--set-upstream");
        }
        command.arg(remote).args(refs);

        debug!(remote, ?refs, ?options, "Pushing refs");

        let output = command
            .output()
            .map_err(|e| MonorelError::remote(format!("Failed to run git push: {}", e)))?;

        if !output.status.success() {
            return Err(MonorelError::remote(format!(
                "Push to '{}' failed: {}",
                remote,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }

    fn branch_upstream(&self, branch: &str) -> Result<Option<String>> {
        let config = self.lock()?.config()?;
        match config.get_string(&format!("branch.{}.remote", branch)) {
            Ok(remote) => Ok(Some(remote)),
            Err(e) if not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remote_url(&self, remote: &str) -> Result<Option<String>> {
        let repo = self.lock()?;
        let url = match repo.find_remote(remote) {
            Ok(remote) => Ok(remote.url().map(str::to_string)),
            Err(e) if not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        };
        url
    }

    fn export_tree(&self, rev: &str, dest: &Path) -> Result<()> {
        let repo = self.lock()?;
        let commit = require_commit(&repo, rev)?;
        let tree = commit.tree()?;

        let mut checkout = CheckoutBuilder::new();
        checkout
            .target_dir(dest)
            .force()
            .recreate_missing(true)
            .update_index(false);
        repo.checkout_tree(tree.as_object(), Some(&mut checkout))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::Repository;
    use std::fs;
    use tempfile::TempDir;

    fn init() -> (TempDir, Git2Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Git2Repo::init(dir.path()).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Release Bot").unwrap();
            config.set_str("user.email", "bot@example.com").unwrap();
        }
        (dir, Git2Repository::from_git2(repo))
    }

    fn commit_file(dir: &TempDir, repo: &Git2Repository, file: &str, message: &str) -> String {
        fs::write(dir.path().join(file), message).unwrap();
        repo.commit_all(message).unwrap()
    }

    #[test]
    fn test_release_changes_since_previous_release() {
        let (dir, repo) = init();
        let first = commit_file(&dir, &repo, "a.txt", "chore: init");
        repo.create_annotated_tag("v1.0.0", &first, "Release v1.0.0", false)
            .unwrap();
        commit_file(&dir, &repo, "b.txt", "fix: crash");
        commit_file(&dir, &repo, "c.txt", "feat: widget");

        let changes = repo.release_changes("HEAD", false).unwrap();

        let previous = changes.previous.unwrap();
        assert_eq!(previous.version, Version::new(1, 0, 0));
        assert_eq!(previous.commit, first);
        let subjects: Vec<&str> = changes.changes.iter().map(Commit::subject).collect();
        assert_eq!(subjects, vec!["fix: crash", "feat: widget"]);
        assert_eq!(changes.head.subject(), "feat: widget");
    }

    #[test]
    fn test_stable_only_walks_over_pre_releases() {
        let (dir, repo) = init();
        let first = commit_file(&dir, &repo, "a.txt", "chore: init");
        repo.create_annotated_tag("v1.0.0", &first, "Release", false).unwrap();
        let beta = commit_file(&dir, &repo, "b.txt", "build(release): release v1.1.0-beta.1");
        repo.create_annotated_tag("v1.1.0-beta.1", &beta, "Release", false)
            .unwrap();
        commit_file(&dir, &repo, "c.txt", "fix: crash");

        let any = repo.release_changes("HEAD", false).unwrap();
        assert_eq!(any.previous.unwrap().version, Version::parse("1.1.0-beta.1").unwrap());
        assert_eq!(any.changes.len(), 1);

        let stable = repo.release_changes("HEAD", true).unwrap();
        assert_eq!(stable.previous.unwrap().version, Version::new(1, 0, 0));
        assert_eq!(stable.changes.len(), 2);
    }

    #[test]
    fn test_status_and_tags() {
        let (dir, repo) = init();
        let first = commit_file(&dir, &repo, "a.txt", "chore: init");
        repo.create_annotated_tag("v1.0.0", &first, "Release", false).unwrap();
        repo.create_annotated_tag("latest", &first, "latest", false).unwrap();

        let status = repo.status().unwrap();
        assert!(!status.is_dirty);
        assert_eq!(status.head.commit, first);
        assert!(status.releases.contains(&Version::new(1, 0, 0)));

        fs::write(dir.path().join("untracked.txt"), "x").unwrap();
        assert!(repo.is_dirty().unwrap());

        let tags = repo.tags().unwrap();
        let latest = tags.iter().find(|t| t.name == "latest").unwrap();
        assert_eq!(latest.release, Some(Version::new(1, 0, 0)));
    }

    #[test]
    fn test_branch_operations() {
        let (dir, repo) = init();
        let first = commit_file(&dir, &repo, "a.txt", "chore: init");
        let start = repo.status().unwrap().head.branch.unwrap();

        repo.switch_branch("v1.x", true).unwrap();
        let second = commit_file(&dir, &repo, "b.txt", "fix: crash");

        repo.switch_branch(&start, false).unwrap();
        repo.merge_fast_forward("v1.x").unwrap();
        assert_eq!(repo.status().unwrap().head.commit, second);

        repo.force_branch("v1.x", &first).unwrap();
        let pinned = repo.find_commit(&first).unwrap().unwrap();
        assert!(pinned.branches.contains("v1.x"));
    }

    #[test]
    fn test_export_tree() {
        let (dir, repo) = init();
        let first = commit_file(&dir, &repo, "a.txt", "chore: init");
        commit_file(&dir, &repo, "a.txt", "chore: change");

        let out = TempDir::new().unwrap();
        repo.export_tree(&first, out.path()).unwrap();

        assert_eq!(fs::read_to_string(out.path().join("a.txt")).unwrap(), "chore: init");
        assert!(!repo.is_dirty().unwrap());
    }

    #[test]
    fn test_missing_remote_and_upstream() {
        let (dir, repo) = init();
        commit_file(&dir, &repo, "a.txt", "chore: init");

        assert_eq!(repo.remote_url("origin").unwrap(), None);
        assert_eq!(repo.branch_upstream("main").unwrap(), None);
        assert!(repo.find_commit("does-not-exist").unwrap().is_none());
    }

    #[test]
    fn test_remote_url_and_upstream() {
        let (dir, repo) = init();
        commit_file(&dir, &repo, "a.txt", "chore: init");
        let branch = repo.status().unwrap().head.branch.unwrap();
        {
            let git = repo.lock().unwrap();
            git.remote("origin", "git@github.com:acme/widgets.git").unwrap();
            let mut config = git.config().unwrap();
            config
                .set_str(&format!("branch.{}.remote", branch), "origin")
                .unwrap();
        }

        assert_eq!(
            repo.remote_url("origin").unwrap().as_deref(),
            Some("git@github.com:acme/widgets.git")
        );
        assert_eq!(repo.remote_url("upstream").unwrap(), None);
        assert_eq!(
            repo.branch_upstream(&branch).unwrap().as_deref(),
            Some("origin")
        );
    }

    #[test]
    fn test_merge_when_already_up_to_date() {
        let (dir, repo) = init();
        commit_file(&dir, &repo, "a.txt", "chore: init");
        let start = repo.status().unwrap().head.branch.unwrap();
        repo.switch_branch("v0.x", true).unwrap();
        repo.switch_branch(&start, false).unwrap();
        let head = commit_file(&dir, &repo, "b.txt", "fix: crash");

        repo.merge_fast_forward("v0.x").unwrap();

        assert_eq!(repo.status().unwrap().head.commit, head);
    }
}
