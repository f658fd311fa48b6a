//! Domain logic - pure release rules independent of git operations

pub mod branch;
pub mod commit;
pub mod prerelease;
pub mod release;
pub mod tag;
pub mod version;

pub use branch::ReleaseBranch;
pub use commit::{ChangeSet, Commit, ParsedCommit, RELEASE_COMMIT_PREFIX};
pub use prerelease::{PreRelease, PreReleaseLabel, PreReleaseType};
pub use release::{Release, Releases};
pub use tag::{is_release_tag, FloatingTag, TagRef};
pub use version::{Version, VersionBump};
