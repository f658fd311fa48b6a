use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Package scripts run during a release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    /// Test suite, run for the package and every sub-package before anything is changed
    Test,
    /// Documentation build, whose output is committed when it changes the tree
    Docs,
}

impl ScriptKind {
    /// Get the script name as a string
    pub fn name(&self) -> &'static str {
        match self {
            ScriptKind::Test => "test",
            ScriptKind::Docs => "docs",
        }
    }
}

/// Context information passed to a script
#[derive(Debug, Clone)]
pub struct ScriptContext {
    pub kind: ScriptKind,
    /// Directory the script runs in
    pub package_root: PathBuf,
    pub package_name: Option<String>,
    /// Version being released
    pub version: String,
    /// Previous release, if any
    pub previous_version: Option<String>,
    /// Release branch the version lands on
    pub release_branch: String,
}

impl ScriptContext {
    /// Convert context to environment variables for the script
    ///
    /// Maps context fields to MONOREL_* environment variables
    pub fn to_env_vars(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();

        env.insert("MONOREL_SCRIPT".to_string(), self.kind.name().to_string());
        env.insert("MONOREL_VERSION".to_string(), self.version.clone());
        env.insert(
            "MONOREL_RELEASE_BRANCH".to_string(),
            self.release_branch.clone(),
        );
        env.insert(
            "MONOREL_PACKAGE_ROOT".to_string(),
            self.package_root.display().to_string(),
        );

        if let Some(ref name) = self.package_name {
            env.insert("MONOREL_PACKAGE_NAME".to_string(), name.clone());
        }

        if let Some(ref previous) = self.previous_version {
            env.insert("MONOREL_PREVIOUS_VERSION".to_string(), previous.clone());
        }

        env
    }
}
