use crate::config::ScriptsConfig;
use crate::error::{MonorelError, Result};
use crate::hooks::{ScriptContext, ScriptKind};
use std::process::Command;
use tracing::{debug, info};

/// Runs package scripts
pub trait ScriptRunner: Send + Sync {
    /// Whether a command is configured for this script
    fn is_configured(&self, kind: ScriptKind) -> bool;

    /// Run the script; unconfigured scripts succeed without doing anything
    fn run(&self, context: &ScriptContext) -> Result<()>;
}

/// Executes configured script commands as child processes
pub struct ProcessScriptRunner {
    scripts: ScriptsConfig,
}

impl ProcessScriptRunner {
    pub fn new(scripts: ScriptsConfig) -> Self {
        ProcessScriptRunner { scripts }
    }

    fn command(&self, kind: ScriptKind) -> Option<&[String]> {
        let argv = match kind {
            ScriptKind::Test => self.scripts.test.as_deref(),
            ScriptKind::Docs => self.scripts.docs.as_deref(),
        };
        argv.filter(|argv| !argv.is_empty())
    }

    /// Execute `argv` in the package root with the context's environment variables
    ///
    /// # Returns
    /// * `Ok(())` if the command exits with code 0
    /// * `Err` if the command cannot be started or returns a non-zero exit code
    pub fn execute(argv: &[String], context: &ScriptContext) -> Result<()> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| MonorelError::script(format!("Empty {} command", context.kind.name())))?;

        if !context.package_root.is_dir() {
            return Err(MonorelError::script(format!(
                "Package root is not a directory: {}",
                context.package_root.display()
            )));
        }

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&context.package_root);

        for (key, value) in context.to_env_vars() {
            cmd.env(key, value);
        }

        let output = cmd.output().map_err(|e| {
            MonorelError::script(format!("Failed to execute {}: {}", program, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(MonorelError::script(format!(
                "{} script failed with exit code {}\nStdout: {}\nStderr: {}",
                context.kind.name(),
                output.status.code().unwrap_or(-1),
                stdout,
                stderr
            )));
        }

        debug!(
            script = context.kind.name(),
            stdout = %String::from_utf8_lossy(&output.stdout),
            "Script output"
        );
        Ok(())
    }
}

impl ScriptRunner for ProcessScriptRunner {
    fn is_configured(&self, kind: ScriptKind) -> bool {
        self.command(kind).is_some()
    }

    fn run(&self, context: &ScriptContext) -> Result<()> {
        match self.command(context.kind) {
            Some(argv) => {
                info!(
                    script = context.kind.name(),
                    root = %context.package_root.display(),
                    "Running package script"
                );
                Self::execute(argv, context)
            }
            None => Ok(()),
        }
    }
}
