//! Package manifest (`package.json`) access
//!
//! The manifest is read into an order-preserving JSON map so that patching the
//! version rewrites the file without reshuffling keys.

use crate::domain::Version;
use crate::error::{MonorelError, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

pub const MANIFEST_FILE_NAME: &str = "package.json";

const DEPENDENCY_SECTIONS: [&str; 3] = ["dependencies", "peerDependencies", "optionalDependencies"];

fn pre_release_spec_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+\.\d+\.\d+-[0-9A-Za-z]").ok())
        .as_ref()
}

/// A dependency pinned to a pre-release version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreReleaseDependency {
    pub section: String,
    pub name: String,
    pub spec: String,
}

/// A package rooted at a directory of the repository
#[derive(Debug, Clone)]
pub struct Package {
    root: PathBuf,
    tree_path: PathBuf,
    manifest: Option<Map<String, Value>>,
}

impl Package {
    /// Open the package at `root`; a missing manifest yields a nameless package
    ///
    /// `tree_path` is the package directory relative to the repository root.
    pub fn open(root: impl Into<PathBuf>, tree_path: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let path = root.join(MANIFEST_FILE_NAME);

        let manifest = if path.exists() {
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<Value>(&content)? {
                Value::Object(map) => Some(map),
                _ => {
                    return Err(MonorelError::config(format!(
                        "{} is not a JSON object",
                        path.display()
                    )))
                }
            }
        } else {
            None
        };

        Ok(Package {
            root,
            tree_path: tree_path.into(),
            manifest,
        })
    }

    /// Open every sub-package directory listed relative to this package
    pub fn sub_packages(&self, paths: &[PathBuf]) -> Result<Vec<Package>> {
        paths
            .iter()
            .map(|path| Package::open(self.root.join(path), self.tree_path.join(path)))
            .collect()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tree_path(&self) -> &Path {
        &self.tree_path
    }

    pub fn has_manifest(&self) -> bool {
        self.manifest.is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.manifest
            .as_ref()
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }

    /// `@scope/name` packages
    pub fn is_scoped(&self) -> bool {
        self.name().is_some_and(|name| name.starts_with('@'))
    }

    pub fn is_private(&self) -> bool {
        self.manifest
            .as_ref()
            .and_then(|m| m.get("private"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn version(&self) -> Option<&str> {
        self.manifest
            .as_ref()
            .and_then(|m| m.get("version"))
            .and_then(Value::as_str)
    }

    /// Label used in messages
    pub fn display_name(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => self.root.display().to_string(),
        }
    }

    /// Rewrite the manifest with `version`; packages without a manifest are left alone
    ///
    /// # Returns
    /// * `Ok(true)` - If the file changed
    pub fn set_version(&mut self, version: &Version) -> Result<bool> {
        let Some(manifest) = self.manifest.as_mut() else {
            return Ok(false);
        };

        let version = version.to_string();
        if manifest.get("version").and_then(Value::as_str) == Some(version.as_str()) {
            return Ok(false);
        }
        manifest.insert("version".to_string(), Value::String(version));

        let mut content = serde_json::to_string_pretty(manifest)?;
        content.push('\n');
        fs::write(self.root.join(MANIFEST_FILE_NAME), content)?;

        Ok(true)
    }

    /// Dependencies whose version spec names a pre-release
    pub fn pre_release_dependencies(&self) -> Vec<PreReleaseDependency> {
        let (Some(manifest), Some(re)) = (self.manifest.as_ref(), pre_release_spec_regex()) else {
            return Vec::new();
        };

        DEPENDENCY_SECTIONS
            .iter()
            .filter_map(|section| {
                manifest
                    .get(*section)
                    .and_then(Value::as_object)
                    .map(|deps| (section, deps))
            })
            .flat_map(|(section, deps)| {
                deps.iter().filter_map(move |(name, spec)| {
                    let spec = spec.as_str()?;
                    re.is_match(spec).then(|| PreReleaseDependency {
                        section: section.to_string(),
                        name: name.clone(),
                        spec: spec.to_string(),
                    })
                })
            })
            .collect()
    }
}
