//! Package scripts run during a release
//!
//! - test: before any repository change, for the package and its sub-packages
//! - docs: after the release branches are prepared; changed output is committed

pub mod executor;
pub mod lifecycle;

pub use executor::{ProcessScriptRunner, ScriptRunner};
pub use lifecycle::{ScriptContext, ScriptKind};
