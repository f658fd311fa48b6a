use std::fmt;

/// Non-fatal conditions met during a release that the operator should see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseWarning {
    /// No commits since the previous release
    NoChanges { previous: Option<String> },
    /// Changes exist but none counts as notable
    NoNotableChanges { total: usize },
    /// A remote is configured but its host is not recognized
    UnknownUpstream { remote: String, url: String },
    /// Hosted release skipped because no token is set
    MissingHostingToken { env: String },
    /// No remote configured, nothing is pushed
    NoRemote { remote: String },
    /// Original branch is not tracked upstream, so it is not pushed after the merge
    BranchNotTracked { branch: String },
}

impl fmt::Display for ReleaseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseWarning::NoChanges {
                previous: Some(previous),
            } => write!(f, "No changes since release {}", previous),
            ReleaseWarning::NoChanges { previous: None } => write!(f, "No changes to release"),
            ReleaseWarning::NoNotableChanges { total } => write!(
                f,
                "None of the {} changes is notable",
                total
            ),
            ReleaseWarning::UnknownUpstream { remote, url } => write!(
                f,
                "Remote '{}' ({}) is not a known hosting provider, no links or hosted release",
                remote, url
            ),
            ReleaseWarning::MissingHostingToken { env } => {
                write!(f, "{} is not set, hosted release is not created", env)
            }
            ReleaseWarning::NoRemote { remote } => {
                write!(f, "Remote '{}' is not configured, nothing is pushed", remote)
            }
            ReleaseWarning::BranchNotTracked { branch } => write!(
                f,
                "Branch '{}' has no upstream, push it manually",
                branch
            ),
        }
    }
}
