pub mod analyzer;
pub mod batch;
pub mod boundary;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod git;
pub mod hooks;
pub mod hosting;
pub mod logging;
pub mod package;
pub mod registry;
pub mod release;
pub mod ui;

pub use error::{MonorelError, Result};
