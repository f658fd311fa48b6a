use crate::error::Result;
use crate::ui::ConfirmationProvider;
use tracing::{debug, warn};

const RETRY_OPTIONS: [&str; 2] = ["retry", "abort"];

/// Repeats a failed operation while the operator asks for it
///
/// In non-interactive mode the first failure is returned as is.
pub struct RetryPolicy<'a> {
    prompt: &'a dyn ConfirmationProvider,
    interactive: bool,
}

impl<'a> RetryPolicy<'a> {
    pub fn new(prompt: &'a dyn ConfirmationProvider, interactive: bool) -> Self {
        RetryPolicy {
            prompt,
            interactive,
        }
    }

    /// Never prompts
    pub fn fail_fast(prompt: &'a dyn ConfirmationProvider) -> Self {
        RetryPolicy::new(prompt, false)
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Run `operation` until it succeeds or the operator aborts
    pub fn run<T>(&self, title: &str, mut operation: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 1;
        loop {
            debug!(operation = title, attempt, "Running");
            match operation() {
                Ok(value) => return Ok(value),
                Err(e) if !self.interactive => return Err(e),
                Err(e) => {
                    warn!(operation = title, attempt, error = %e, "Operation failed");
                    let answer = self.prompt.confirm(
                        &format!("{} failed: {}\nRepeat?", title, e),
                        &RETRY_OPTIONS,
                        0,
                    );
                    // keep the operation error when the prompt itself fails
                    let choice = match answer {
                        Ok(choice) => choice,
                        Err(prompt_error) => {
                            warn!(operation = title, error = %prompt_error, "Retry prompt failed");
                            return Err(e);
                        }
                    };
                    if choice != 0 {
                        return Err(e);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MonorelError;
    use crate::ui::ScriptedPrompt;

    fn flaky(failures: usize) -> impl FnMut() -> Result<usize> {
        let mut calls = 0;
        move || {
            calls += 1;
            if calls <= failures {
                Err(MonorelError::remote("connection reset"))
            } else {
                Ok(calls)
            }
        }
    }

    #[test]
    fn test_retries_until_success() {
        let prompt = ScriptedPrompt::new(["retry", "retry"]);
        let policy = RetryPolicy::new(&prompt, true);
        assert_eq!(policy.run("Push", flaky(2)).unwrap(), 3);
        assert_eq!(prompt.asked().len(), 2);
        assert!(prompt.asked()[0].starts_with("Push failed: Remote operation failed"));
    }

    #[test]
    fn test_abort_returns_the_failure() {
        let prompt = ScriptedPrompt::new(["abort"]);
        let policy = RetryPolicy::new(&prompt, true);
        let err = policy.run("Push", flaky(5)).unwrap_err();
        assert!(matches!(err, MonorelError::Remote(_)));
    }

    #[test]
    fn test_prompt_failure_keeps_operation_error() {
        let prompt = ScriptedPrompt::new(Vec::<String>::new());
        let policy = RetryPolicy::new(&prompt, true);

        let err = policy.run("Push", flaky(1)).unwrap_err();

        assert!(matches!(err, MonorelError::Remote(ref msg) if msg == "connection reset"));
        assert_eq!(prompt.asked().len(), 1);
    }

    #[test]
    fn test_non_interactive_fails_on_first_error() {
        let prompt = ScriptedPrompt::new(Vec::<String>::new());
        let policy = RetryPolicy::fail_fast(&prompt);
        assert!(policy.run("Push", flaky(1)).is_err());
        assert!(prompt.asked().is_empty());
        assert_eq!(policy.run("Push", flaky(0)).unwrap(), 1);
    }
}
