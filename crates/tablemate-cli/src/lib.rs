//! Tablemate CLI
//!
//! Operator tooling over the friend service: every command runs as one
//! directory user (`--as HANDLE`) against the file-backed store named in the
//! configuration.

use tablemate_social::SocialError;
use thiserror::Error;

pub mod commands;
pub mod config;
pub mod output;

pub use commands::{run_command, Command, Outcome};
pub use config::{CliConfig, UserEntry};

/// CLI errors
#[derive(Debug, Error)]
pub enum CliError {
    /// Config file could not be parsed or is inconsistent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Config file could not be read
    #[error("File system error: {0}")]
    FileSystem(String),

    /// Output could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// `--as` is missing or names no known user
    #[error("Unknown caller: {0}")]
    UnknownCaller(String),

    /// The friend service refused or failed the command
    #[error(transparent)]
    Social(#[from] SocialError),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
