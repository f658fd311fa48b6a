//! Package registry abstraction layer
//!
//! [RegistryBackend] covers the registry calls a release needs: published
//! versions, dist-tags, access level, pack and publish. [NpmRegistry] drives
//! the `npm` CLI; [MockRegistry] keeps everything in memory and records writes.
//! [PublishCoordinator] mirrors a release and its floating tags into the registry.

pub mod coordinator;
pub mod mock;
pub mod npm;

pub use coordinator::{AccessSync, DistTagSync, PublishCoordinator, PublishOutcome, DIST_TAGS};
pub use mock::MockRegistry;
pub use npm::NpmRegistry;

use crate::error::{MonorelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Registry access level of a scoped package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Restricted,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Public => "public",
            Access::Restricted => "restricted",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Access {
    type Err = MonorelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "public" => Ok(Access::Public),
            "restricted" | "private" => Ok(Access::Restricted),
            other => Err(MonorelError::registry(format!("Unknown access level: {}", other))),
        }
    }
}

/// Package registry operations
///
/// All implementors must be `Send + Sync`. Calls block until the registry answers.
pub trait RegistryBackend: Send + Sync {
    /// Versions published for `name`; `None` when the package does not exist
    fn published_versions(&self, name: &str) -> Result<Option<BTreeSet<String>>>;

    /// Current dist-tags of `name`, tag to version
    fn dist_tags(&self, name: &str) -> Result<BTreeMap<String, String>>;

    fn set_dist_tag(&self, name: &str, version: &str, tag: &str) -> Result<()>;

    fn delete_dist_tag(&self, name: &str, tag: &str) -> Result<()>;

    /// Access level of a scoped package
    fn access(&self, name: &str) -> Result<Access>;

    fn set_access(&self, name: &str, access: Access) -> Result<()>;

    /// Pack the package in `package_dir` into an artifact written to `dest`
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - Path of the artifact
    fn pack(&self, package_dir: &Path, dest: &Path) -> Result<PathBuf>;

    /// Publish the artifact of package `name`
    ///
    /// Without `tag` no dist-tag of the package is moved.
    fn publish(&self, name: &str, artifact: &Path, access: Option<Access>, tag: Option<&str>)
        -> Result<()>;
}
