use crate::domain::{is_release_tag, ChangeSet, Commit, Release, Releases, TagRef, Version};
use crate::error::{MonorelError, Result};
use crate::git::{HeadInfo, PushOptions, ReleaseChanges, RepoStatus, Repository};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// A recorded push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRecord {
    pub remote: String,
    pub refs: Vec<String>,
    pub options: PushOptions,
}

#[derive(Debug, Clone)]
struct MockCommit {
    message: String,
    date: DateTime<Utc>,
    parent: Option<String>,
}

#[derive(Debug, Clone)]
enum MockHead {
    Branch(String),
    Detached(String),
}

#[derive(Debug)]
struct MockState {
    commits: HashMap<String, MockCommit>,
    branches: BTreeMap<String, String>,
    tags: BTreeMap<String, String>,
    head: MockHead,
    dirty: bool,
    remotes: BTreeMap<String, String>,
    upstreams: BTreeMap<String, String>,
    pushes: Vec<PushRecord>,
    failing_pushes: usize,
    operations: Vec<String>,
    files: BTreeMap<String, String>,
    next_id: u64,
}

/// In-memory repository with linear per-branch history for testing without git
///
/// Starts with one `chore: initial commit` on `main`. Every mutating trait call is
/// recorded in [MockRepository::operations].
pub struct MockRepository {
    state: Mutex<MockState>,
}

impl MockRepository {
    /// Create a new mock repository with a single commit on `main`
    pub fn new() -> Self {
        let mut state = MockState {
            commits: HashMap::new(),
            branches: BTreeMap::new(),
            tags: BTreeMap::new(),
            head: MockHead::Branch("main".to_string()),
            dirty: false,
            remotes: BTreeMap::new(),
            upstreams: BTreeMap::new(),
            pushes: Vec::new(),
            failing_pushes: 0,
            operations: Vec::new(),
            files: BTreeMap::new(),
            next_id: 0,
        };
        let initial = state.add_commit("chore: initial commit", None);
        state.branches.insert("main".to_string(), initial);

        MockRepository {
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, MockState>> {
        self.state
            .lock()
            .map_err(|_| MonorelError::Git(git2::Error::from_str("mock repository lock poisoned")))
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Commit on the current branch (or detached head) and return its hash
    pub fn commit(&self, message: &str) -> String {
        self.with_state(|state| state.commit_on_head(message))
    }

    /// Commit a release: a `build(release)` commit tagged with the version
    pub fn release(&self, version: &str) -> String {
        let tag = format!("v{}", version.trim_start_matches('v'));
        let hash = self.commit(&format!("build(release): release {}", tag));
        self.tag(&tag, &hash);
        hash
    }

    /// Point a tag at a revision
    pub fn tag(&self, name: &str, rev: &str) {
        self.with_state(|state| {
            if let Some(hash) = state.resolve(rev) {
                state.tags.insert(name.to_string(), hash);
            }
        })
    }

    /// Create or move a branch to a revision without checking it out
    pub fn set_branch(&self, name: &str, rev: &str) {
        self.with_state(|state| {
            if let Some(hash) = state.resolve(rev) {
                state.branches.insert(name.to_string(), hash);
            }
        })
    }

    /// Check out a branch, creating it at HEAD if missing
    pub fn checkout(&self, name: &str) {
        self.with_state(|state| {
            let head = state.head_hash();
            state.branches.entry(name.to_string()).or_insert(head);
            state.head = MockHead::Branch(name.to_string());
        })
    }

    /// Detach HEAD at a revision
    pub fn detach(&self, rev: &str) {
        self.with_state(|state| {
            if let Some(hash) = state.resolve(rev) {
                state.head = MockHead::Detached(hash);
            }
        })
    }

    /// Add a file to the tree written by `export_tree` (shared by every revision)
    pub fn write_file(&self, path: &str, content: &str) {
        self.with_state(|state| {
            state.files.insert(path.to_string(), content.to_string());
        })
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.with_state(|state| state.dirty = dirty)
    }

    pub fn add_remote(&self, name: &str, url: &str) {
        self.with_state(|state| {
            state.remotes.insert(name.to_string(), url.to_string());
        })
    }

    /// Mark a branch as tracking a remote
    pub fn set_upstream(&self, branch: &str, remote: &str) {
        self.with_state(|state| {
            state.upstreams.insert(branch.to_string(), remote.to_string());
        })
    }

    /// Make the next `count` pushes fail
    pub fn fail_pushes(&self, count: usize) {
        self.with_state(|state| state.failing_pushes = count)
    }

    pub fn current_branch(&self) -> Option<String> {
        self.with_state(|state| match &state.head {
            MockHead::Branch(name) => Some(name.clone()),
            MockHead::Detached(_) => None,
        })
    }

    pub fn head(&self) -> String {
        self.with_state(|state| state.head_hash())
    }

    pub fn branch_head(&self, name: &str) -> Option<String> {
        self.with_state(|state| state.branches.get(name).cloned())
    }

    pub fn tag_target(&self, name: &str) -> Option<String> {
        self.with_state(|state| state.tags.get(name).cloned())
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.with_state(|state| state.tags.keys().cloned().collect())
    }

    pub fn message(&self, rev: &str) -> Option<String> {
        self.with_state(|state| {
            state
                .resolve(rev)
                .and_then(|hash| state.commits.get(&hash))
                .map(|commit| commit.message.clone())
        })
    }

    pub fn pushes(&self) -> Vec<PushRecord> {
        self.with_state(|state| state.pushes.clone())
    }

    /// Mutating operations in call order, e.g. `switch v1.x`, `tag v1.0.0`
    pub fn operations(&self) -> Vec<String> {
        self.with_state(|state| state.operations.clone())
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockState {
    fn add_commit(&mut self, message: &str, parent: Option<String>) -> String {
        self.next_id += 1;
        let hash = format!("{:040x}", self.next_id * 0x9e37_79b9);
        let date = Utc
            .timestamp_opt(1_700_000_000 + (self.next_id as i64) * 3600, 0)
            .single()
            .unwrap_or_default();

        self.commits.insert(
            hash.clone(),
            MockCommit {
                message: message.to_string(),
                date,
                parent,
            },
        );
        hash
    }

    fn head_hash(&self) -> String {
        match &self.head {
            MockHead::Branch(name) => self.branches.get(name).cloned().unwrap_or_default(),
            MockHead::Detached(hash) => hash.clone(),
        }
    }

    fn commit_on_head(&mut self, message: &str) -> String {
        let parent = self.head_hash();
        let hash = self.add_commit(message, Some(parent));
        match &self.head {
            MockHead::Branch(name) => {
                self.branches.insert(name.clone(), hash.clone());
            }
            MockHead::Detached(_) => self.head = MockHead::Detached(hash.clone()),
        }
        hash
    }

    fn resolve(&self, rev: &str) -> Option<String> {
        if rev == "HEAD" {
            return Some(self.head_hash());
        }
        self.branches
            .get(rev)
            .or_else(|| self.tags.get(rev))
            .cloned()
            .or_else(|| self.commits.contains_key(rev).then(|| rev.to_string()))
    }

    fn require(&self, rev: &str) -> Result<String> {
        self.resolve(rev)
            .ok_or_else(|| MonorelError::Git(git2::Error::from_str(&format!("Unknown revision '{}'", rev))))
    }

    fn is_ancestor(&self, ancestor: &str, of: &str) -> bool {
        let mut current = Some(of.to_string());
        while let Some(hash) = current {
            if hash == ancestor {
                return true;
            }
            current = self.commits.get(&hash).and_then(|c| c.parent.clone());
        }
        false
    }

    fn build_commit(&self, hash: &str) -> Option<Commit> {
        let commit = self.commits.get(hash)?;
        let tags = self
            .tags
            .iter()
            .filter(|(_, target)| target.as_str() == hash)
            .map(|(name, _)| name.clone());
        let branches = self
            .branches
            .iter()
            .filter(|(_, target)| target.as_str() == hash)
            .map(|(name, _)| name.clone());

        Some(
            Commit::new(hash, commit.message.clone(), commit.date)
                .with_tags(tags)
                .with_branches(branches),
        )
    }

    fn record(&mut self, operation: String) {
        self.operations.push(operation);
    }
}

impl Repository for MockRepository {
    fn status(&self) -> Result<RepoStatus> {
        let state = self.state()?;
        let commit = state.head_hash();

        let branch = match &state.head {
            MockHead::Branch(name) => Some(name.clone()),
            MockHead::Detached(_) => None,
        };
        let branches: BTreeSet<String> = state
            .branches
            .iter()
            .filter(|(_, target)| **target == commit)
            .map(|(name, _)| name.clone())
            .collect();
        let releases = state
            .tags
            .keys()
            .filter(|name| is_release_tag(name))
            .filter_map(|name| Version::parse(name).ok())
            .collect();

        Ok(RepoStatus {
            is_dirty: state.dirty,
            head: HeadInfo {
                branch,
                commit,
                branches,
            },
            releases: Releases::new(releases),
        })
    }

    fn is_dirty(&self) -> Result<bool> {
        Ok(self.state()?.dirty)
    }

    fn tags(&self) -> Result<Vec<TagRef>> {
        let state = self.state()?;
        Ok(state
            .tags
            .iter()
            .map(|(name, hash)| {
                let release = state.build_commit(hash).and_then(|c| c.release_version());
                TagRef::new(name.clone(), hash.clone(), release)
            })
            .collect())
    }

    fn find_commit(&self, rev: &str) -> Result<Option<Commit>> {
        let state = self.state()?;
        Ok(state.resolve(rev).and_then(|hash| state.build_commit(&hash)))
    }

    fn release_changes(&self, rev: &str, stable_only: bool) -> Result<ReleaseChanges> {
        let state = self.state()?;
        let start = state.require(rev)?;
        let head = state
            .build_commit(&start)
            .ok_or_else(|| MonorelError::Git(git2::Error::from_str("dangling revision")))?;

        let mut previous = None;
        let mut changes = Vec::new();
        let mut current = Some(start);

        while let Some(hash) = current {
            let commit = match state.build_commit(&hash) {
                Some(commit) => commit,
                None => break,
            };

            if let Some(version) = commit.release_version() {
                if !stable_only || version.is_stable() {
                    previous = Some(Release::new(version, hash.clone(), commit.date));
                    break;
                }
            }

            current = state.commits.get(&hash).and_then(|c| c.parent.clone());
            changes.push(commit);
        }

        changes.reverse();
        Ok(ReleaseChanges {
            previous,
            head,
            changes: ChangeSet::new(changes),
        })
    }

    fn switch_branch(&self, name: &str, create: bool) -> Result<()> {
        let mut state = self.state()?;

        if create {
            if state.branches.contains_key(name) {
                return Err(MonorelError::Git(git2::Error::from_str(&format!(
                    "A branch named '{}' already exists",
                    name
                ))));
            }
            let head = state.head_hash();
            state.branches.insert(name.to_string(), head);
        } else if !state.branches.contains_key(name) {
            return Err(MonorelError::Git(git2::Error::from_str(&format!(
                "Unknown branch '{}'",
                name
            ))));
        }

        state.head = MockHead::Branch(name.to_string());
        state.record(format!("switch {}{}", if create { "-c " } else { "" }, name));
        Ok(())
    }

    fn merge_fast_forward(&self, branch: &str) -> Result<()> {
        let mut state = self.state()?;
        let target = state.require(branch)?;
        let head = state.head_hash();

        // already contains the branch head
        if state.is_ancestor(&target, &head) {
            state.record(format!("merge --ff-only {}", branch));
            return Ok(());
        }

        if !state.is_ancestor(&head, &target) {
            return Err(MonorelError::Git(git2::Error::from_str(&format!(
                "Branch '{}' cannot be fast-forward merged",
                branch
            ))));
        }

        match state.head.clone() {
            MockHead::Branch(name) => {
                state.branches.insert(name, target);
            }
            MockHead::Detached(_) => state.head = MockHead::Detached(target),
        }
        state.record(format!("merge --ff-only {}", branch));
        Ok(())
    }

    fn force_branch(&self, branch: &str, target: &str) -> Result<()> {
        let mut state = self.state()?;
        let hash = state.require(target)?;
        state.branches.insert(branch.to_string(), hash);
        state.record(format!("branch -f {} {}", branch, target));
        Ok(())
    }

    fn commit_all(&self, message: &str) -> Result<String> {
        let mut state = self.state()?;
        let hash = state.commit_on_head(message);
        state.dirty = false;
        let subject = message.lines().next().unwrap_or_default().to_string();
        state.record(format!("commit {}", subject));
        Ok(hash)
    }

    fn create_annotated_tag(
        &self,
        name: &str,
        target: &str,
        _message: &str,
        force: bool,
    ) -> Result<()> {
        let mut state = self.state()?;
        if !force && state.tags.contains_key(name) {
            return Err(MonorelError::tag(format!("Tag '{}' already exists", name)));
        }
        let hash = state.require(target)?;
        state.tags.insert(name.to_string(), hash);
        state.record(format!("tag {}{}", if force { "-f " } else { "" }, name));
        Ok(())
    }

    fn delete_tag(&self, name: &str) -> Result<()> {
        let mut state = self.state()?;
        if state.tags.remove(name).is_none() {
            return Err(MonorelError::tag(format!("Tag '{}' not found", name)));
        }
        state.record(format!("tag -d {}", name));
        Ok(())
    }

    fn push(&self, remote: &str, refs: &[String], options: PushOptions) -> Result<()> {
        let mut state = self.state()?;
        if state.failing_pushes > 0 {
            state.failing_pushes -= 1;
            return Err(MonorelError::remote("connection reset by peer"));
        }
        state.pushes.push(PushRecord {
            remote: remote.to_string(),
            refs: refs.to_vec(),
            options,
        });
        state.record(format!("push {} {}", remote, refs.join(" ")));
        Ok(())
    }

    fn branch_upstream(&self, branch: &str) -> Result<Option<String>> {
        Ok(self.state()?.upstreams.get(branch).cloned())
    }

    fn remote_url(&self, remote: &str) -> Result<Option<String>> {
        Ok(self.state()?.remotes.get(remote).cloned())
    }

    fn export_tree(&self, rev: &str, dest: &Path) -> Result<()> {
        let mut state = self.state()?;
        state.require(rev)?;
        std::fs::create_dir_all(dest)?;
        for (path, content) in &state.files {
            let target = dest.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, content)?;
        }
        state.record(format!("export {}", rev));
        Ok(())
    }
}
