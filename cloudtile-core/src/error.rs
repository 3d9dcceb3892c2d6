//! Error taxonomy for the conversion core.
//!
//! Every failure is raised synchronously at the offending call and is never
//! retried. Callers (the orchestrator or the CLI) decide whether to abort.

use std::path::PathBuf;
use thiserror::Error;

use crate::kind::FileKind;

/// Bad input: an unknown setting, a broken invariant, an unsupported format.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("setting {0} is not a valid tippecanoe setting")]
    UnknownSetting(String),

    #[error("maximum zoom cannot be less than minimum zoom (minimum {min}, maximum {max})")]
    MaxBelowMin { min: u32, max: u32 },

    #[error("maximum zoom cannot be less than minimum zoom (minimum {min} set above maximum {max})")]
    MinAboveMax { min: u32, max: u32 },

    #[error("invalid zoom value for {key}: {value}")]
    InvalidZoom { key: String, value: String },

    #[error("file type {suffix:?} must be one of {allowed:?}")]
    UnsupportedFormat {
        suffix: String,
        allowed: &'static [&'static str],
    },

    #[error("target suffix {0:?} must include the dot")]
    MalformedSuffix(String),

    #[error("config {0} seems to be empty")]
    EmptyConfig(String),

    #[error("config {source_name} is malformed: {reason}")]
    MalformedConfig { source_name: String, reason: String },

    #[error("invalid setting override {0:?}")]
    MalformedOverride(String),

    #[error("invalid resource override: {0}")]
    InvalidResources(String),
}

/// An illegal move through the file-kind graph.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("no further conversion defined for {0} files")]
    NoFurtherConversion(FileKind),

    #[error("cannot convert {from} into {to}: the next step from {from} is {expected}")]
    IllegalTransition {
        from: FileKind,
        to: FileKind,
        expected: FileKind,
    },

    #[error("must configure minimum and maximum zoom before converting {0}")]
    ZoomNotConfigured(PathBuf),

    #[error("single step conversion cannot start from {0} files")]
    UnsupportedStartingKind(FileKind),
}

/// An external converter failed to start, exited non-zero or timed out.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Exit { program: String, status: String },

    #[error("{program} did not finish within {seconds}s")]
    Timeout { program: String, seconds: u64 },

    #[error("{program} reported success but did not produce {}", .output.display())]
    MissingOutput { program: String, output: PathBuf },
}

/// Object storage failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Umbrella error for the conversion core.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("file {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    #[error("config file {} not found", .0.display())]
    ConfigNotFound(PathBuf),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the not-found class (missing local file or missing config).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::FileNotFound(_) | Error::ConfigNotFound(_) | Error::Storage(StorageError::NotFound(_))
        )
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
