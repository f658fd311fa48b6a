use crate::analyzer::TagResolver;
use crate::domain::{FloatingTag, Version};
use crate::error::{MonorelError, Result};
use crate::git::Repository;
use crate::package::Package;
use crate::registry::{Access, RegistryBackend};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// Floating tags mirrored as registry dist-tags
pub const DIST_TAGS: [FloatingTag; 2] = [FloatingTag::Latest, FloatingTag::Next];

/// Result of publishing one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Private or nameless package, nothing done
    Skipped(String),
    AlreadyPublished(Version),
    Published {
        version: Version,
        dist_tag: Option<FloatingTag>,
    },
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishOutcome::Skipped(reason) => write!(f, "skipped, {}", reason),
            PublishOutcome::AlreadyPublished(version) => {
                write!(f, "{} already published", version)
            }
            PublishOutcome::Published {
                version,
                dist_tag: Some(tag),
            } => write!(f, "published {} as {}", version, tag),
            PublishOutcome::Published { version, .. } => write!(f, "published {}", version),
        }
    }
}

/// Dist-tag reconciliation result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistTagSync {
    /// Whether any dist-tag was written
    pub updated: bool,
    /// Desired version per dist-tag
    pub tags: BTreeMap<String, Option<Version>>,
}

impl fmt::Display for DistTagSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.updated { "updated" } else { "not modified" })?;
        for (tag, version) in &self.tags {
            match version {
                Some(version) => write!(f, ", {}: {}", tag, version)?,
                None => write!(f, ", {}: -", tag)?,
            }
        }
        Ok(())
    }
}

/// Access reconciliation result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessSync {
    pub updated: bool,
    pub access: Access,
}

/// Mirrors git releases and floating tags into a package registry
///
/// Every operation is idempotent: re-running it against an unchanged repository and
/// registry performs no write calls.
pub struct PublishCoordinator<'a> {
    repository: &'a dyn Repository,
    registry: &'a dyn RegistryBackend,
}

impl<'a> PublishCoordinator<'a> {
    pub fn new(repository: &'a dyn Repository, registry: &'a dyn RegistryBackend) -> Self {
        PublishCoordinator {
            repository,
            registry,
        }
    }

    /// Publish the release at `commit_ref`, then reconcile dist-tags and access
    pub fn release(
        &self,
        package: &Package,
        commit_ref: &str,
        access: Option<Access>,
    ) -> Result<PublishOutcome> {
        let outcome = self.publish(package, commit_ref, access)?;
        if let PublishOutcome::Skipped(_) = outcome {
            return Ok(outcome);
        }

        let tags = self.reconcile_dist_tags(package)?;
        info!(package = %package.display_name(), "Dist-tags {}", tags);

        if let Some(access) = access {
            if let Some(sync) = self.reconcile_access(package, access)? {
                info!(
                    package = %package.display_name(),
                    updated = sync.updated,
                    access = %sync.access,
                    "Access status reconciled"
                );
            }
        }

        Ok(outcome)
    }

    /// Publish the tree of `commit_ref` unless its version is already in the registry
    ///
    /// The artifact gets dist-tag `latest` or `next` only when the release commit itself
    /// carries that git tag.
    pub fn publish(
        &self,
        package: &Package,
        commit_ref: &str,
        access: Option<Access>,
    ) -> Result<PublishOutcome> {
        let Some(name) = publishable_name(package) else {
            return Ok(PublishOutcome::Skipped(skip_reason(package)));
        };

        let commit = self
            .repository
            .find_commit(commit_ref)?
            .ok_or_else(|| MonorelError::registry(format!("Commit not found: {}", commit_ref)))?;
        let version = commit.release_version().ok_or_else(|| {
            MonorelError::registry(format!("Commit {} is not a release", commit.short_hash()))
        })?;

        let published = self.registry.published_versions(name)?.unwrap_or_default();
        if published.contains(&version.to_string()) {
            debug!(package = name, %version, "Version already published");
            return Ok(PublishOutcome::AlreadyPublished(version));
        }

        let work_tree = tempfile::Builder::new().prefix("monorel-tree-").tempdir()?;
        self.repository.export_tree(&commit.hash, work_tree.path())?;
        let package_dir = work_tree.path().join(package.tree_path());

        let pack_dir = tempfile::Builder::new().prefix("monorel-pack-").tempdir()?;
        let artifact = self.registry.pack(&package_dir, pack_dir.path())?;

        let dist_tag = DIST_TAGS
            .into_iter()
            .find(|tag| commit.has_tag(&tag.to_string()));
        let access = access.filter(|_| package.is_scoped());
        let tag_name = dist_tag.map(|tag| tag.to_string());

        info!(package = name, %version, tag = ?tag_name, "Publishing package");
        self.registry
            .publish(name, &artifact, access, tag_name.as_deref())?;

        Ok(PublishOutcome::Published { version, dist_tag })
    }

    /// Point registry dist-tags at the versions of the `latest` and `next` floating tags
    ///
    /// A dist-tag without a floating tag target is deleted. Writes happen only on difference.
    pub fn reconcile_dist_tags(&self, package: &Package) -> Result<DistTagSync> {
        let Some(name) = publishable_name(package) else {
            return Ok(DistTagSync::default());
        };

        let resolved = TagResolver::default().resolve(&self.repository.tags()?);
        let current = self.registry.dist_tags(name)?;
        let mut sync = DistTagSync::default();

        for tag in DIST_TAGS {
            let tag_name = tag.to_string();
            let target = resolved.target(tag).cloned();

            match (&target, current.get(&tag_name)) {
                (Some(version), existing) => {
                    let version = version.to_string();
                    if existing != Some(&version) {
                        self.registry.set_dist_tag(name, &version, &tag_name)?;
                        sync.updated = true;
                    }
                }
                (None, Some(_)) => {
                    self.registry.delete_dist_tag(name, &tag_name)?;
                    sync.updated = true;
                }
                (None, None) => {}
            }

            sync.tags.insert(tag_name, target);
        }

        Ok(sync)
    }

    /// Apply `access` to a scoped package when it differs
    ///
    /// # Returns
    /// * `Ok(None)` - If the package is private, nameless or unscoped
    pub fn reconcile_access(&self, package: &Package, access: Access) -> Result<Option<AccessSync>> {
        let Some(name) = publishable_name(package).filter(|_| package.is_scoped()) else {
            return Ok(None);
        };

        let mut updated = false;
        if self.registry.access(name)? != access {
            self.registry.set_access(name, access)?;
            updated = true;
        }

        Ok(Some(AccessSync { updated, access }))
    }
}

fn publishable_name(package: &Package) -> Option<&str> {
    if package.is_private() {
        None
    } else {
        package.name()
    }
}

fn skip_reason(package: &Package) -> String {
    if package.is_private() {
        "package is private".to_string()
    } else {
        "package has no name".to_string()
    }
}
