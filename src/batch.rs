//! Floating tag maintenance across many repositories
//!
//! Each repository is an independent unit of work; a failure is recorded in its
//! [RepoTagUpdate] and never stops the other jobs.

use crate::analyzer::TagResolver;
use crate::error::{MonorelError, Result};
use crate::git::Repository;
use crate::release::apply_resolved_tags;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_JOBS: usize = 4;

/// Settings shared by every job of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Worker threads
    pub jobs: usize,
    /// Create, move and delete tags; otherwise only report pending changes
    pub apply: bool,
    pub major_tag_enabled: bool,
    /// Remote receiving the applied tags, skipped when a repository lacks it
    pub remote: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            jobs: DEFAULT_JOBS,
            apply: false,
            major_tag_enabled: false,
            remote: "origin".to_string(),
        }
    }
}

/// Result of one repository
#[derive(Debug)]
pub struct RepoTagUpdate {
    pub path: PathBuf,
    /// Applied (or pending, without `apply`) tag changes
    pub result: Result<Vec<String>>,
}

impl RepoTagUpdate {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Results in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub updates: Vec<RepoTagUpdate>,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &RepoTagUpdate> {
        self.updates.iter().filter(|update| !update.is_ok())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Resolve (and with `apply`, update) floating tags of every repository in `paths`
///
/// `open` turns a path into a repository backend; it runs on the worker threads.
pub fn update_tags<F>(paths: &[PathBuf], options: &BatchOptions, open: F) -> Result<BatchReport>
where
    F: Fn(&Path) -> Result<Box<dyn Repository>> + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs.max(1))
        .build()
        .map_err(|e| MonorelError::config(format!("Failed to start worker pool: {}", e)))?;

    info!(repositories = paths.len(), jobs = options.jobs, "Updating floating tags");

    let updates = pool.install(|| {
        paths
            .par_iter()
            .map(|path| {
                let result = open(path).and_then(|repo| update_repository(repo.as_ref(), options));
                if let Err(e) = &result {
                    warn!(path = %path.display(), error = %e, "Tag update failed");
                }
                RepoTagUpdate {
                    path: path.clone(),
                    result,
                }
            })
            .collect()
    });

    Ok(BatchReport { updates })
}

fn update_repository(repo: &dyn Repository, options: &BatchOptions) -> Result<Vec<String>> {
    let resolved = TagResolver::new(options.major_tag_enabled).resolve(&repo.tags()?);

    if !options.apply {
        return Ok(resolved
            .pending()
            .map(|tag| format!("{} {}", tag.action, tag.tag))
            .collect());
    }

    let remote = repo
        .remote_url(&options.remote)?
        .map(|_| options.remote.as_str());
    apply_resolved_tags(repo, &resolved, remote)
}
