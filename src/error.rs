//! Error types for qel
//!
//! Every diagnostic carries a stable string tag available through `code()`,
//! so scripts can match on the failure kind without parsing messages.

use crate::runner::ProcessState;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for qel operations
pub type Result<T> = std::result::Result<T, QelError>;

/// Main error type for qel
#[derive(Error, Debug)]
pub enum QelError {
    /// Specification and definition-file errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Argument parsing errors
    #[error("{0}")]
    Args(#[from] ArgsError),

    /// Process supervision errors
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while building a specification or loading a definition file
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("argument name cannot be empty")]
    EmptyKey,

    #[error("argument '{0}' has no name after its dashes")]
    NoName(String),

    #[error("argument '{0}' must start with '-' or '--'")]
    NonOptionKey(String),

    #[error("invalid type for '{name}': {reason}")]
    InvalidType { name: String, reason: String },

    #[error("short option '{0}' must be a single dash followed by one character")]
    ShortOptionTooLong(String),

    #[error("alias '{name}' is invalid: {reason}")]
    InvalidAlias { name: String, reason: String },

    #[error("argument '{0}' is defined more than once")]
    DuplicateKey(String),

    #[error("Failed to find definition file (searched: {0})")]
    NotFound(String),

    #[error("Invalid definition: {0}")]
    Invalid(String),

    #[error("Failed to read definition file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },
}

impl ConfigError {
    /// Stable tag identifying the error kind
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::EmptyKey => "ConfigEmptyKey",
            ConfigError::NoName(_) => "ConfigNoName",
            ConfigError::NonOptionKey(_) => "ConfigNonOptionKey",
            ConfigError::InvalidType { .. } => "ConfigInvalidType",
            ConfigError::ShortOptionTooLong(_) => "ConfigShortOptionTooLong",
            ConfigError::InvalidAlias { .. } => "ConfigInvalidAlias",
            ConfigError::DuplicateKey(_) => "ConfigDuplicateKey",
            ConfigError::NotFound(_) => "ConfigNotFound",
            ConfigError::Invalid(_) | ConfigError::ReadFile { .. } => "ConfigInvalid",
        }
    }
}

/// Errors raised while parsing an argument vector
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArgsError {
    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error("option '{0}' requires a value and must be the last one in its group")]
    MissingRequiredValue(String),

    #[error("option '{0}' requires a value")]
    MissingValueForLongOption(String),

    #[error("{0}")]
    InvalidOptionValue(InvalidValue),

    #[error("option '{0}' is required")]
    MissingRequiredOption(String),
}

impl ArgsError {
    /// Stable tag identifying the error kind
    pub fn code(&self) -> &'static str {
        match self {
            ArgsError::UnknownOption(_) => "UnknownOption",
            ArgsError::MissingRequiredValue(_) => "MissingRequiredValue",
            ArgsError::MissingValueForLongOption(_) => "MissingValueForLongOption",
            ArgsError::InvalidOptionValue(_) => "InvalidOptionValue",
            ArgsError::MissingRequiredOption(_) => "MissingRequiredOption",
        }
    }
}

/// Details of a value that failed parsing or a constraint
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidValue {
    /// Argument name as declared in the specification
    pub name: String,
    /// Offending raw value
    pub value: String,
    /// Environment variable the value came from, if any
    pub env: Option<String>,
    /// What went wrong
    pub reason: String,
    /// User-supplied override message
    pub message: Option<String>,
}

impl std::fmt::Display for InvalidValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid value '{}' for '{}'", self.value, self.name)?;
        if let Some(env) = &self.env {
            write!(f, " (from environment variable '{}')", env)?;
        }
        write!(f, ": {}", self.reason)?;
        if let Some(message) = &self.message {
            write!(f, ". {}", message)?;
        }
        Ok(())
    }
}

/// Process supervision errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("command line cannot be empty")]
    EmptyCommand,

    #[error("failed to spawn '{program}': {error}")]
    Spawn { program: String, error: io::Error },

    #[error("failed to prepare stdio: {0}")]
    Stdio(io::Error),

    #[error("failed to send {signal} to process {pid}: {error}")]
    Signal {
        pid: i32,
        signal: String,
        error: io::Error,
    },

    #[error("process is not running")]
    NotRunning,

    #[error("unknown signal '{0}'")]
    UnknownSignal(String),

    #[error("supervisor thread panicked")]
    Supervisor,

    /// Non-zero exit from `exec`; the message is the captured stderr
    #[error("{message}")]
    Failed {
        message: String,
        state: Box<ProcessState>,
    },
}

/// Specialized result type for specification and definition-file operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for argument parsing
pub type ArgsResult<T> = std::result::Result<T, ArgsError>;

/// Specialized result type for execution operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;
