//! Release process
//!
//! [ReleaseOrchestrator] walks the steps of [ReleaseState] for one package
//! (plus its sub-packages), talking to git, scripts, the operator, the hosting
//! provider and the package registry through the traits gathered in
//! [Collaborators].

pub mod changelog_file;
pub mod floating;
pub mod orchestrator;
pub mod plan;
pub mod retry;
pub mod state;

pub use changelog_file::{compose_changelog, write_changelog, CHANGELOG_FILE_NAME};
pub use floating::{apply_resolved_tags, select_floating_tags, set_floating_tags};
pub use orchestrator::{
    Collaborators, ReleaseOptions, ReleaseOrchestrator, ReleaseOutcome, ReleaseReport,
};
pub use plan::ReleasePlan;
pub use retry::RetryPolicy;
pub use state::{ReleaseProgress, ReleaseState};
