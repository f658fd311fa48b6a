use crate::error::{MonorelError, Result};
use crate::registry::{Access, RegistryBackend};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Dist-tag used while publishing without a tag, removed right after
const STAGING_DIST_TAG: &str = "monorel-staging";

/// Registry backend driving the `npm` command line client
pub struct NpmRegistry {
    program: String,
    cwd: PathBuf,
}

impl NpmRegistry {
    /// `program` is the npm executable, `cwd` the directory npm runs in (for `.npmrc`)
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        NpmRegistry {
            program: program.into(),
            cwd: cwd.into(),
        }
    }

    fn run(&self, args: &[&str], cwd: Option<&Path>) -> Result<Output> {
        debug!(program = %self.program, ?args, "Running registry command");

        Command::new(&self.program)
            .args(args)
            .current_dir(cwd.unwrap_or(&self.cwd))
            .output()
            .map_err(|e| MonorelError::registry(format!("Failed to run {}: {}", self.program, e)))
    }

    fn run_checked(&self, args: &[&str], cwd: Option<&Path>) -> Result<String> {
        let output = self.run(args, cwd)?;
        if !output.status.success() {
            return Err(command_failed(args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run_json(&self, args: &[&str]) -> Result<Value> {
        let stdout = self.run_checked(args, None)?;
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&stdout)?)
    }
}

fn command_failed(args: &[&str], output: &Output) -> MonorelError {
    MonorelError::registry(format!(
        "npm {} failed: {}",
        args.first().copied().unwrap_or_default(),
        String::from_utf8_lossy(&output.stderr).trim()
    ))
}

fn is_not_found(output: &Output) -> bool {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    stdout.contains("E404") || stderr.contains("E404")
}

/// `npm view <name> versions --json` prints a bare string for a single version
fn parse_versions(value: Value) -> BTreeSet<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Value::String(version) => BTreeSet::from([version]),
        _ => BTreeSet::new(),
    }
}

fn parse_dist_tags(value: Value) -> BTreeMap<String, String> {
    match value {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(tag, version)| version.as_str().map(|v| (tag, v.to_string())))
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// `npm access get status <name> --json` prints `{"<name>": "public"}`
fn parse_access(value: &Value) -> Option<Access> {
    let status = match value {
        Value::Object(map) => map.values().next()?.as_str()?,
        Value::String(status) => status.as_str(),
        _ => return None,
    };
    status.parse().ok()
}

/// `npm pack --json` prints an array of packed artifacts
fn parse_pack_filename(value: &Value) -> Option<String> {
    value
        .as_array()?
        .first()?
        .get("filename")?
        .as_str()
        .map(str::to_string)
}

impl RegistryBackend for NpmRegistry {
    fn published_versions(&self, name: &str) -> Result<Option<BTreeSet<String>>> {
        let args = ["view", name, "versions", "--json"];
        let output = self.run(&args, None)?;

        if !output.status.success() {
            if is_not_found(&output) {
                return Ok(None);
            }
            return Err(command_failed(&args, &output));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Some(BTreeSet::new()));
        }
        Ok(Some(parse_versions(serde_json::from_str(&stdout)?)))
    }

    fn dist_tags(&self, name: &str) -> Result<BTreeMap<String, String>> {
        Ok(parse_dist_tags(self.run_json(&["view", name, "dist-tags", "--json"])?))
    }

    fn set_dist_tag(&self, name: &str, version: &str, tag: &str) -> Result<()> {
        let spec = format!("{}@{}", name, version);
        self.run_checked(&["dist-tag", "add", &spec, tag], None)?;
        Ok(())
    }

    fn delete_dist_tag(&self, name: &str, tag: &str) -> Result<()> {
        self.run_checked(&["dist-tag", "rm", name, tag], None)?;
        Ok(())
    }

    fn access(&self, name: &str) -> Result<Access> {
        let value = self.run_json(&["access", "get", "status", name, "--json"])?;
        parse_access(&value).ok_or_else(|| {
            MonorelError::registry(format!("Unexpected access status for {}: {}", name, value))
        })
    }

    fn set_access(&self, name: &str, access: Access) -> Result<()> {
        let status = format!("status={}", access.as_str());
        self.run_checked(&["access", "set", &status, name], None)?;
        Ok(())
    }

    fn pack(&self, package_dir: &Path, dest: &Path) -> Result<PathBuf> {
        let dest_arg = dest.display().to_string();
        let stdout = self.run_checked(
            &["pack", "--json", "--pack-destination", &dest_arg],
            Some(package_dir),
        )?;

        let value: Value = serde_json::from_str(&stdout)?;
        let filename = parse_pack_filename(&value)
            .ok_or_else(|| MonorelError::registry("npm pack did not report an artifact"))?;

        Ok(dest.join(filename))
    }

    fn publish(
        &self,
        name: &str,
        artifact: &Path,
        access: Option<Access>,
        tag: Option<&str>,
    ) -> Result<()> {
        let artifact_arg = artifact.display().to_string();
        let mut args = vec!["publish", artifact_arg.as_str()];

        if let Some(access) = access {
            args.extend(["--access", access.as_str()]);
        }

        // npm moves `latest` when no tag is given
        args.extend(["--tag", tag.unwrap_or(STAGING_DIST_TAG)]);

        self.run_checked(&args, None)?;

        if tag.is_none() {
            self.delete_dist_tag(name, STAGING_DIST_TAG)?;
        }
        Ok(())
    }
}
