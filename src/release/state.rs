use std::fmt;
use tracing::info;

/// Steps of a release, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReleaseState {
    Init,
    Validate,
    ResolveChangelog,
    DetermineBranchStrategy,
    ComputeNextVersion,
    ConfirmIntent,
    RunTests,
    PrepareBranches,
    BuildDocs,
    WriteChangelog,
    BumpVersions,
    CommitAndTag,
    SetFloatingTags,
    PushAndCreateUpstreamRelease,
    PublishPackages,
    RestoreOriginalBranch,
    Done,
    Failed,
}

impl ReleaseState {
    pub fn name(&self) -> &'static str {
        match self {
            ReleaseState::Init => "init",
            ReleaseState::Validate => "validate",
            ReleaseState::ResolveChangelog => "resolve changelog",
            ReleaseState::DetermineBranchStrategy => "determine branch strategy",
            ReleaseState::ComputeNextVersion => "compute next version",
            ReleaseState::ConfirmIntent => "confirm intent",
            ReleaseState::RunTests => "run tests",
            ReleaseState::PrepareBranches => "prepare branches",
            ReleaseState::BuildDocs => "build docs",
            ReleaseState::WriteChangelog => "write changelog",
            ReleaseState::BumpVersions => "bump versions",
            ReleaseState::CommitAndTag => "commit and tag",
            ReleaseState::SetFloatingTags => "set floating tags",
            ReleaseState::PushAndCreateUpstreamRelease => "push and create upstream release",
            ReleaseState::PublishPackages => "publish packages",
            ReleaseState::RestoreOriginalBranch => "restore original branch",
            ReleaseState::Done => "done",
            ReleaseState::Failed => "failed",
        }
    }
}

impl fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tracks the current step; steps only move forward
#[derive(Debug, Clone)]
pub struct ReleaseProgress {
    state: ReleaseState,
    visited: Vec<ReleaseState>,
}

impl Default for ReleaseProgress {
    fn default() -> Self {
        ReleaseProgress {
            state: ReleaseState::Init,
            visited: vec![ReleaseState::Init],
        }
    }
}

impl ReleaseProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReleaseState {
        self.state
    }

    /// Steps entered so far, in order
    pub fn visited(&self) -> &[ReleaseState] {
        &self.visited
    }

    /// Enter `next`; moving backwards or out of a terminal state is ignored
    pub fn advance(&mut self, next: ReleaseState) {
        if next <= self.state || self.is_terminal() {
            return;
        }
        info!(step = %next, "Release step");
        self.state = next;
        self.visited.push(next);
    }

    pub fn fail(&mut self) {
        if !self.is_terminal() {
            self.state = ReleaseState::Failed;
            self.visited.push(ReleaseState::Failed);
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, ReleaseState::Done | ReleaseState::Failed)
    }
}
