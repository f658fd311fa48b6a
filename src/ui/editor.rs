use crate::error::{MonorelError, Result};
use std::collections::VecDeque;
use std::fs;
use std::io::Write as _;
use std::process::Command;
use std::sync::Mutex;

/// Lets the operator edit a text document
pub trait TextEditor: Send + Sync {
    /// Return the edited text
    fn edit(&self, text: &str) -> Result<String>;
}

/// Opens an editor program on a temporary markdown file
#[derive(Debug, Clone)]
pub struct ExternalEditor {
    command: String,
}

impl ExternalEditor {
    /// `command` may carry arguments, e.g. `code --wait`
    pub fn new(command: impl Into<String>) -> Self {
        ExternalEditor {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl TextEditor for ExternalEditor {
    fn edit(&self, text: &str) -> Result<String> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| MonorelError::editor("Editor command is empty"))?;

        let mut temp_file = tempfile::Builder::new()
            .prefix("CHANGELOG-")
            .suffix(".md")
            .tempfile()?;
        temp_file.write_all(text.as_bytes())?;
        temp_file.flush()?;

        let status = Command::new(program)
            .args(parts)
            .arg(temp_file.path())
            .status()
            .map_err(|e| MonorelError::editor(format!("Failed to start {}: {}", program, e)))?;

        if !status.success() {
            return Err(MonorelError::editor(format!(
                "{} exited with status: {}",
                program, status
            )));
        }

        Ok(fs::read_to_string(temp_file.path())?)
    }
}

/// Replaces the text with queued edits, in order
#[derive(Debug, Default)]
pub struct ScriptedEditor {
    edits: Mutex<VecDeque<String>>,
}

impl ScriptedEditor {
    pub fn new<I, S>(edits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedEditor {
            edits: Mutex::new(edits.into_iter().map(Into::into).collect()),
        }
    }
}

impl TextEditor for ScriptedEditor {
    fn edit(&self, _text: &str) -> Result<String> {
        self.edits
            .lock()
            .map_err(|_| MonorelError::editor("Scripted editor poisoned"))?
            .pop_front()
            .ok_or_else(|| MonorelError::editor("No scripted edit left"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_editor_that_keeps_text() {
        let editor = ExternalEditor::new("true");
        assert_eq!(editor.edit("# Changelog\n").unwrap(), "# Changelog\n");
    }

    #[test]
    fn test_failing_editor() {
        let editor = ExternalEditor::new("false");
        assert!(matches!(editor.edit("x"), Err(MonorelError::Editor(_))));
    }

    #[test]
    fn test_empty_command() {
        assert!(ExternalEditor::new("  ").edit("x").is_err());
    }

    #[test]
    fn test_scripted_editor() {
        let editor = ScriptedEditor::new(["edited"]);
        assert_eq!(editor.edit("original").unwrap(), "edited");
        assert!(editor.edit("original").is_err());
    }
}
