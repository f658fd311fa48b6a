use crate::error::{MonorelError, Result};
use dialoguer::Select;
use std::collections::VecDeque;
use std::io::IsTerminal;
use std::sync::Mutex;

/// Source of operator decisions
///
/// `confirm` blocks until a choice is made and returns the index of the chosen option.
/// By convention the last option cancels.
pub trait ConfirmationProvider: Send + Sync {
    fn confirm(&self, prompt: &str, options: &[&str], default: usize) -> Result<usize>;
}

/// Interactive terminal prompt
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    pub fn new() -> Self {
        TerminalPrompt
    }
}

fn is_interactive() -> bool {
    std::env::var("MONOREL_FORCE_TTY").is_ok() || std::io::stdin().is_terminal()
}

impl ConfirmationProvider for TerminalPrompt {
    fn confirm(&self, prompt: &str, options: &[&str], default: usize) -> Result<usize> {
        if options.is_empty() {
            return Err(MonorelError::validation("Prompt without options"));
        }
        if !is_interactive() {
            return Err(MonorelError::validation(format!(
                "{} (not a terminal, use --yes to skip confirmations)",
                prompt
            )));
        }

        let selection = Select::new()
            .with_prompt(prompt)
            .items(options)
            .default(default.min(options.len() - 1))
            .interact_opt()
            .map_err(|e| match e {
                dialoguer::Error::IO(io_err) => MonorelError::Io(io_err),
            })?;

        // Escape cancels
        Ok(selection.unwrap_or(options.len() - 1))
    }
}

/// Answers prompts from a fixed queue of option labels
///
/// Each answer is matched against the offered options by label. Asked prompts are recorded.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedPrompt {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Prompts asked so far
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    /// Answers not consumed
    pub fn remaining(&self) -> usize {
        self.answers.lock().map(|a| a.len()).unwrap_or_default()
    }
}

impl ConfirmationProvider for ScriptedPrompt {
    fn confirm(&self, prompt: &str, options: &[&str], _default: usize) -> Result<usize> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(prompt.to_string());
        }

        let answer = self
            .answers
            .lock()
            .map_err(|_| MonorelError::validation("Scripted prompt poisoned"))?
            .pop_front()
            .ok_or_else(|| {
                MonorelError::validation(format!("No scripted answer for: {}", prompt))
            })?;

        options
            .iter()
            .position(|option| *option == answer)
            .ok_or_else(|| {
                MonorelError::validation(format!(
                    "Scripted answer '{}' is not one of {:?} for: {}",
                    answer, options, prompt
                ))
            })
    }
}
