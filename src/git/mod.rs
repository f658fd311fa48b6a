//! Git operations abstraction layer
//!
//! This module provides a trait-based abstraction over the version-control
//! backend, so that release decisions can be made and tested without a real
//! repository.
//!
//! # Overview
//!
//! The primary abstraction is the [Repository] trait, which defines the git
//! operations monorel needs. The concrete implementations include:
//!
//! - [repository::Git2Repository]: A real implementation using the `git2` crate
//! - [mock::MockRepository]: An in-memory implementation for testing
//!
//! # Usage
//!
//! Most code should depend on the [Repository] trait rather than concrete
//! implementations to enable easy testing and flexibility.
//!
//! ```rust
//! # use monorel::git::Repository;
//! # fn example(repo: &dyn Repository) -> monorel::error::Result<()> {
//! let changes = repo.release_changes("HEAD", false)?;
//! println!("{} commits since the previous release", changes.changes.len());
//! # Ok(())
//! # }
//! ```

pub mod mock;
pub mod repository;
pub mod upstream;

pub use mock::MockRepository;
pub use repository::Git2Repository;
pub use upstream::{Hosting, Upstream};

use crate::domain::{ChangeSet, Commit, Release, Releases, TagRef};
use crate::error::Result;
use std::collections::BTreeSet;
use std::path::Path;

/// Where HEAD points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadInfo {
    /// Checked-out branch, `None` on a detached head
    pub branch: Option<String>,
    /// Hash of the HEAD commit
    pub commit: String,
    /// Local branches whose head is the HEAD commit
    pub branches: BTreeSet<String>,
}

impl HeadInfo {
    pub fn is_detached(&self) -> bool {
        self.branch.is_none()
    }
}

/// Repository state relevant to a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoStatus {
    /// Uncommitted changes or untracked files
    pub is_dirty: bool,
    pub head: HeadInfo,
    /// Every release tag in the repository
    pub releases: Releases,
}

/// Changes between the previous release and a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseChanges {
    /// Nearest release reachable from the commit, if any
    pub previous: Option<Release>,
    /// The commit the changes lead to
    pub head: Commit,
    /// Commits after `previous` up to and including `head`, oldest first
    pub changes: ChangeSet,
}

/// Push behaviour flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// All refs are updated or none is
    pub atomic: bool,
    /// Overwrite remote refs (floating tags, pinned branches)
    pub force: bool,
    /// Record the remote as upstream of the pushed branch
    pub set_upstream: bool,
}

/// Common git operation trait for abstraction
///
/// This trait abstracts the version-control backend to allow for multiple
/// implementations including real Git repositories and mock implementations
/// for testing.
///
/// ## Thread Safety
///
/// All implementors must be `Send + Sync` to allow safe sharing across threads.
///
/// ## Revisions
///
/// Methods taking a `rev` accept anything git can resolve to a commit: `HEAD`,
/// a branch name, a tag name or a commit hash.
///
/// ## Error Handling
///
/// All methods return [crate::error::Result<T>]. Implementations map
/// underlying errors (like `git2::Error`) to the appropriate
/// [crate::error::MonorelError] variants.
pub trait Repository: Send + Sync {
    /// Working tree dirty flag, HEAD and known releases
    fn status(&self) -> Result<RepoStatus>;

    /// Whether the working tree has uncommitted changes or untracked files
    fn is_dirty(&self) -> Result<bool>;

    /// All tags with the commit they point at
    ///
    /// Each [TagRef] carries the release version of its commit, which is set only when that
    /// commit carries exactly one release tag.
    fn tags(&self) -> Result<Vec<TagRef>>;

    /// Resolve a revision to a commit with its tags and branch heads
    ///
    /// # Returns
    /// * `Ok(Some(Commit))` - The resolved commit
    /// * `Ok(None)` - If the revision does not exist
    /// * `Err` - If there's a Git error
    fn find_commit(&self, rev: &str) -> Result<Option<Commit>>;

    /// Collect the changes leading to `rev` since the nearest release
    ///
    /// Walks history backwards from `rev` (inclusive) until a release commit is found.
    /// With `stable_only`, pre-release commits are walked over and included as changes,
    /// so the previous release is the nearest stable one.
    fn release_changes(&self, rev: &str, stable_only: bool) -> Result<ReleaseChanges>;

    /// Check out a branch, creating it at HEAD first when `create` is set
    fn switch_branch(&self, name: &str, create: bool) -> Result<()>;

    /// Fast-forward the current branch to `branch`; a no-op when already contained, fails if history diverged
    fn merge_fast_forward(&self, branch: &str) -> Result<()>;

    /// Create or move `branch` to point at `target`
    fn force_branch(&self, branch: &str, target: &str) -> Result<()>;

    /// Stage everything in the working tree and commit it verbatim
    ///
    /// # Returns
    /// * `Ok(String)` - Hash of the new commit
    fn commit_all(&self, message: &str) -> Result<String>;

    /// Create an annotated tag on `target`, replacing an existing one when `force` is set
    fn create_annotated_tag(&self, name: &str, target: &str, message: &str, force: bool)
        -> Result<()>;

    /// Delete a local tag
    fn delete_tag(&self, name: &str) -> Result<()>;

    /// Push refs (branch or tag names) to a remote
    ///
    /// With [PushOptions::atomic] either every ref is updated on the remote or none is.
    fn push(&self, remote: &str, refs: &[String], options: PushOptions) -> Result<()>;

    /// Remote a local branch is tracking, if any
    fn branch_upstream(&self, branch: &str) -> Result<Option<String>>;

    /// URL of a configured remote, if it exists
    fn remote_url(&self, remote: &str) -> Result<Option<String>>;

    /// Write the tree of `rev` into `dest` without touching the index or HEAD
    fn export_tree(&self, rev: &str, dest: &Path) -> Result<()>;
}
