//! Error types for firmbuild

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using FirmbuildError
pub type Result<T> = std::result::Result<T, FirmbuildError>;

/// Main error type for firmbuild operations
#[derive(Debug, Error)]
pub enum FirmbuildError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Manifest-related errors
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Expression parsing errors
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Expression evaluation errors
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// SDK introspection errors
    #[error(transparent)]
    Sdk(#[from] SdkError),

    /// Conflicting or incomplete command options
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// An app could not be built
    #[error("Build failed: {0}")]
    Build(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

/// A boolean expression that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid if statement: {stmt} ({message})")]
pub struct ParseError {
    /// The statement as written
    pub stmt: String,
    /// What went wrong
    pub message: String,
}

impl ParseError {
    pub fn new(stmt: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stmt: stmt.into(),
            message: message.into(),
        }
    }
}

/// Expression evaluation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// Ordering requested between values of different kinds
    #[error("Cannot compare {left} {op} {right}")]
    Incomparable {
        left: String,
        op: String,
        right: String,
    },

    /// Operator applied to operands it does not support
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Manifest-related errors
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A clause `if` statement is invalid
    #[error("Invalid if clause: {0}")]
    InvalidIfClause(String),

    /// Structural problem in a manifest file
    #[error("Invalid manifest file {file}: {message}")]
    InvalidManifest { file: PathBuf, message: String },

    /// A declared folder does not exist on disk
    #[error("Folder \"{folder}\" does not exist. Please check your manifest file {file}")]
    MissingFolder { folder: PathBuf, file: PathBuf },

    /// The same folder is declared by two manifest files
    #[error("Folder \"{folder}\" is already defined in {first}, redefined in {second}")]
    DuplicateFolder {
        folder: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    /// A SHA snapshot line is not `folder:sha`
    #[error("Malformed line {line_no} in sha file {file}: {line:?}")]
    MalformedShaLine {
        file: PathBuf,
        line_no: usize,
        line: String,
    },

    /// YAML parsing error
    #[error("YAML parsing error in {file}: {source}")]
    Yaml {
        file: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ManifestError {
    pub fn invalid(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            file: file.into(),
            message: message.into(),
        }
    }
}

/// SDK introspection errors
#[derive(Debug, Error)]
pub enum SdkError {
    /// SDK root is not a directory
    #[error("Invalid value for IDF_PATH: {0}")]
    InvalidPath(PathBuf),

    /// Version file missing or unreadable
    #[error("Cannot find SDK version in {0}")]
    VersionNotFound(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FirmbuildError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid command error
    pub fn invalid_command<S: Into<String>>(msg: S) -> Self {
        Self::InvalidCommand(msg.into())
    }
}
