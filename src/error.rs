//! Unified error handling for task-warden
//!
//! Component errors (`ConfigError`, `LoggingError`) are defined here next to
//! the top-level `WardenError`, which classifies them for user messaging.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the supervisor
#[derive(Error, Debug)]
pub enum WardenError {
    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging session could not be established
    #[error(transparent)]
    Logging(#[from] LoggingError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("Invalid configuration file {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
    #[error("Configuration file error ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Cannot create logs folder {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Cannot open log file {}: {source}", path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Error categories used by the front ends to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    ConfigNotFound,
    ConfigInvalid,
    Io,
    Logging,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::ConfigNotFound => "config_not_found",
            ErrorCategory::ConfigInvalid => "config_invalid",
            ErrorCategory::Io => "io",
            ErrorCategory::Logging => "logging",
        };
        f.write_str(name)
    }
}

impl WardenError {
    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            WardenError::Config(ConfigError::NotFound { .. }) => ErrorCategory::ConfigNotFound,
            WardenError::Config(ConfigError::Invalid { .. }) => ErrorCategory::ConfigInvalid,
            WardenError::Config(ConfigError::Io { .. }) => ErrorCategory::Io,
            WardenError::Logging(_) => ErrorCategory::Logging,
        }
    }

    /// Whether the interactive front end may recover by asking the user
    /// for another configuration file.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::ConfigNotFound | ErrorCategory::ConfigInvalid | ErrorCategory::Io
        )
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            WardenError::Config(ConfigError::NotFound { path }) => {
                format!("Configuration file not found: {}", path.display())
            }
            WardenError::Config(ConfigError::Invalid { reason, .. }) => {
                format!("Invalid configuration file content: {}", reason)
            }
            WardenError::Config(ConfigError::Io { path, source }) => {
                format!("Cannot read {}: {}", path.display(), source)
            }
            WardenError::Logging(err) => format!("Logging could not be started: {}", err),
        }
    }
}

pub type WardenResult<T> = Result<T, WardenError>;
