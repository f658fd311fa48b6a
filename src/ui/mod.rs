//! User interface module - interaction (prompts, editor) and formatting.
//!
//! Separates concerns:
//! - `formatter` - Console output for operators
//! - `prompt` - Confirmation checkpoints behind [ConfirmationProvider]
//! - `editor` - Changelog editing behind [TextEditor]

pub mod editor;
pub mod formatter;
pub mod prompt;

pub use editor::{ExternalEditor, ScriptedEditor, TextEditor};
pub use prompt::{ConfirmationProvider, ScriptedPrompt, TerminalPrompt};
