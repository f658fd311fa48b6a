use crate::release::ReleaseState;
use thiserror::Error;

/// Unified error type for monorel operations
#[derive(Error, Debug)]
pub enum MonorelError {
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Version error: {0}")]
    Version(String),

    #[error("Tag error: {0}")]
    Tag(String),

    #[error("Remote operation failed: {0}")]
    Remote(String),

    #[error("Release rejected: {0}")]
    Validation(String),

    #[error("Registry operation failed: {0}")]
    Registry(String),

    #[error("Hosted release failed: {0}")]
    Hosting(String),

    #[error("Script failed: {0}")]
    Script(String),

    #[error("Editor error: {0}")]
    Editor(String),

    #[error("{step} failed: {source}")]
    StepFailed {
        step: ReleaseState,
        #[source]
        source: Box<MonorelError>,
    },
}

/// Convenience type alias for Results in monorel
pub type Result<T> = std::result::Result<T, MonorelError>;

impl MonorelError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        MonorelError::Config(msg.into())
    }

    /// Create a version error with context
    pub fn version(msg: impl Into<String>) -> Self {
        MonorelError::Version(msg.into())
    }

    /// Create a tag error with context
    pub fn tag(msg: impl Into<String>) -> Self {
        MonorelError::Tag(msg.into())
    }

    /// Create a remote error with context
    pub fn remote(msg: impl Into<String>) -> Self {
        MonorelError::Remote(msg.into())
    }

    /// Create a terminal validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        MonorelError::Validation(msg.into())
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        MonorelError::Registry(msg.into())
    }

    pub fn hosting(msg: impl Into<String>) -> Self {
        MonorelError::Hosting(msg.into())
    }

    pub fn script(msg: impl Into<String>) -> Self {
        MonorelError::Script(msg.into())
    }

    pub fn editor(msg: impl Into<String>) -> Self {
        MonorelError::Editor(msg.into())
    }

    /// Attach the orchestrator state in which this error was raised
    pub fn in_step(self, step: ReleaseState) -> Self {
        match self {
            already @ MonorelError::StepFailed { .. } => already,
            other => MonorelError::StepFailed {
                step,
                source: Box::new(other),
            },
        }
    }

    /// True for terminal validation errors, looking through step wrappers
    pub fn is_validation(&self) -> bool {
        match self {
            MonorelError::Validation(_) => true,
            MonorelError::StepFailed { source, .. } => source.is_validation(),
            _ => false,
        }
    }

    /// The state a release failed in, if the error came out of the orchestrator
    pub fn failed_step(&self) -> Option<ReleaseState> {
        match self {
            MonorelError::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }
}
