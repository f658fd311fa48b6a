use crate::error::{MonorelError, Result};
use crate::registry::{Access, RegistryBackend};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default, Clone)]
struct MockPackage {
    versions: BTreeSet<String>,
    dist_tags: BTreeMap<String, String>,
    access: Option<Access>,
}

#[derive(Debug, Default)]
struct MockRegistryState {
    packages: BTreeMap<String, MockPackage>,
    writes: Vec<String>,
    failing_publishes: usize,
}

/// In-memory registry recording every write call
///
/// Packing writes an artifact whose content is the package name and version
/// read from the packed directory's `package.json`.
#[derive(Debug, Default)]
pub struct MockRegistry {
    state: Mutex<MockRegistryState>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MockRegistryState>> {
        self.state
            .lock()
            .map_err(|_| MonorelError::registry("Mock registry state poisoned"))
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MockRegistryState) -> T) -> T {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state)
    }

    /// Register a package with published versions
    pub fn add_package(&self, name: &str, versions: &[&str]) {
        self.with_state(|s| {
            let pkg = s.packages.entry(name.to_string()).or_default();
            pkg.versions.extend(versions.iter().map(|v| v.to_string()));
        });
    }

    /// Set a dist-tag without recording a write
    pub fn seed_dist_tag(&self, name: &str, tag: &str, version: &str) {
        self.with_state(|s| {
            s.packages
                .entry(name.to_string())
                .or_default()
                .dist_tags
                .insert(tag.to_string(), version.to_string());
        });
    }

    /// Set the access level without recording a write
    pub fn seed_access(&self, name: &str, access: Access) {
        self.with_state(|s| s.packages.entry(name.to_string()).or_default().access = Some(access));
    }

    /// Fail the next `count` publish calls
    pub fn fail_publishes(&self, count: usize) {
        self.with_state(|s| s.failing_publishes = count);
    }

    pub fn versions(&self, name: &str) -> BTreeSet<String> {
        self.with_state(|s| {
            s.packages
                .get(name)
                .map(|p| p.versions.clone())
                .unwrap_or_default()
        })
    }

    pub fn tags(&self, name: &str) -> BTreeMap<String, String> {
        self.with_state(|s| {
            s.packages
                .get(name)
                .map(|p| p.dist_tags.clone())
                .unwrap_or_default()
        })
    }

    pub fn current_access(&self, name: &str) -> Option<Access> {
        self.with_state(|s| s.packages.get(name).and_then(|p| p.access))
    }

    /// Write calls in order, e.g. `dist-tag add pkg@1.0.0 latest`
    pub fn writes(&self) -> Vec<String> {
        self.with_state(|s| s.writes.clone())
    }
}

fn read_manifest_id(package_dir: &Path) -> Result<(String, String)> {
    let content = std::fs::read_to_string(package_dir.join("package.json"))?;
    let manifest: serde_json::Value = serde_json::from_str(&content)?;
    let field = |key: &str| {
        manifest
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| MonorelError::registry(format!("package.json has no {}", key)))
    };
    Ok((field("name")?, field("version")?))
}

impl RegistryBackend for MockRegistry {
    fn published_versions(&self, name: &str) -> Result<Option<BTreeSet<String>>> {
        Ok(self.state()?.packages.get(name).map(|p| p.versions.clone()))
    }

    fn dist_tags(&self, name: &str) -> Result<BTreeMap<String, String>> {
        Ok(self
            .state()?
            .packages
            .get(name)
            .map(|p| p.dist_tags.clone())
            .unwrap_or_default())
    }

    fn set_dist_tag(&self, name: &str, version: &str, tag: &str) -> Result<()> {
        let mut state = self.state()?;
        let pkg = state
            .packages
            .get_mut(name)
            .filter(|p| p.versions.contains(version))
            .ok_or_else(|| MonorelError::registry(format!("{}@{} is not published", name, version)))?;
        pkg.dist_tags.insert(tag.to_string(), version.to_string());
        state.writes.push(format!("dist-tag add {}@{} {}", name, version, tag));
        Ok(())
    }

    fn delete_dist_tag(&self, name: &str, tag: &str) -> Result<()> {
        let mut state = self.state()?;
        if let Some(pkg) = state.packages.get_mut(name) {
            pkg.dist_tags.remove(tag);
        }
        state.writes.push(format!("dist-tag rm {} {}", name, tag));
        Ok(())
    }

    fn access(&self, name: &str) -> Result<Access> {
        Ok(self
            .state()?
            .packages
            .get(name)
            .and_then(|p| p.access)
            .unwrap_or(Access::Restricted))
    }

    fn set_access(&self, name: &str, access: Access) -> Result<()> {
        let mut state = self.state()?;
        state.packages.entry(name.to_string()).or_default().access = Some(access);
        state.writes.push(format!("access set {} {}", access, name));
        Ok(())
    }

    fn pack(&self, package_dir: &Path, dest: &Path) -> Result<PathBuf> {
        let (name, version) = read_manifest_id(package_dir)?;
        let file_name = format!("{}-{}.tgz", name.trim_start_matches('@').replace('/', "-"), version);
        let artifact = dest.join(file_name);
        std::fs::write(&artifact, format!("{}\n{}\n", name, version))?;
        Ok(artifact)
    }

    fn publish(
        &self,
        name: &str,
        artifact: &Path,
        access: Option<Access>,
        tag: Option<&str>,
    ) -> Result<()> {
        let content = std::fs::read_to_string(artifact)?;
        let mut lines = content.lines();
        let (Some(packed_name), Some(version)) = (lines.next(), lines.next()) else {
            return Err(MonorelError::registry("Malformed artifact"));
        };
        if packed_name != name {
            return Err(MonorelError::registry(format!(
                "Artifact contains {}, expected {}",
                packed_name, name
            )));
        }

        let mut state = self.state()?;
        if state.failing_publishes > 0 {
            state.failing_publishes -= 1;
            return Err(MonorelError::registry("Simulated publish failure"));
        }

        let pkg = state.packages.entry(name.to_string()).or_default();
        if !pkg.versions.insert(version.to_string()) {
            return Err(MonorelError::registry(format!(
                "Cannot publish over previously published version {}",
                version
            )));
        }
        if let Some(tag) = tag {
            pkg.dist_tags.insert(tag.to_string(), version.to_string());
        }
        if let Some(access) = access {
            pkg.access = Some(access);
        }

        let mut record = format!("publish {}@{}", name, version);
        if let Some(access) = access {
            record.push_str(&format!(" --access {}", access));
        }
        if let Some(tag) = tag {
            record.push_str(&format!(" --tag {}", tag));
        }
        state.writes.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pack_and_publish() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name": "@acme/widgets", "version": "1.2.0"}"#,
        )
        .unwrap();

        let registry = MockRegistry::new();
        let artifact = registry.pack(dir.path(), dir.path()).unwrap();
        registry
            .publish("@acme/widgets", &artifact, Some(Access::Public), Some("latest"))
            .unwrap();

        assert!(registry.versions("@acme/widgets").contains("1.2.0"));
        assert_eq!(registry.tags("@acme/widgets").get("latest"), Some(&"1.2.0".to_string()));
        assert_eq!(
            registry.writes(),
            vec!["publish @acme/widgets@1.2.0 --access public --tag latest"]
        );

        assert!(registry.publish("@acme/widgets", &artifact, None, None).is_err());
    }

    #[test]
    fn test_unknown_package() {
        let registry = MockRegistry::new();
        assert_eq!(registry.published_versions("nope").unwrap(), None);
        assert!(registry.set_dist_tag("nope", "1.0.0", "latest").is_err());
    }
}
