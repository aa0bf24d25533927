//! Error types for reconflow.
//!
//! Uses `thiserror` for ergonomic error definitions. Everything below the
//! CLI layer is recoverable: the pipeline logs these and keeps going.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::{SessionIdError, TargetError};

/// Failure of a single external command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("command timed out after {}s: {command}", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("command exited with status {code}: {command}: {stderr}")]
    Failure {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("failed to spawn {command}: {reason}")]
    Spawn { command: String, reason: String },
}

/// Unexpected output shape from an external tool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("tool produced no output")]
    Empty,

    #[error("malformed line: {0}")]
    Malformed(String),

    #[error("unrecognized output: {0}")]
    Unrecognized(String),
}

/// Error raised inside a pipeline stage. Never escapes the orchestrator.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid settings file: {0}")]
    InvalidFormat(String),

    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Session history storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage directory error: {0}")]
    DirectoryError(String),

    #[error("failed to save session: {0}")]
    SaveFailed(String),

    #[error("failed to load session: {0}")]
    LoadFailed(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("ambiguous session prefix '{prefix}': {matches} matches")]
    AmbiguousPrefix { prefix: String, matches: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Top-level error for CLI commands.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("no valid targets")]
    NoTargets,

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    SessionId(#[from] SessionIdError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StageResult<T> = Result<T, StageError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type StorageResult<T> = Result<T, StorageError>;
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = ExecError::Timeout {
            command: "subfinder -d example.com".to_string(),
            timeout: Duration::from_secs(120),
        };
        assert_eq!(
            err.to_string(),
            "command timed out after 120s: subfinder -d example.com"
        );
    }

    #[test]
    fn test_stage_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StageError = io.into();
        assert!(matches!(err, StageError::Io(_)));
    }
}
