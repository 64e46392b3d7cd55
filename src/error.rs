//! Error handling for datacollect-rs
//!
//! This module defines the error taxonomy shared by every tool and a Result
//! alias for use throughout the crate.
//!
//! Errors fall in two groups:
//!
//! - **Fatal setup errors** (bad paths, unreadable session log or config):
//!   the run aborts before any output is attempted.
//! - **Per-file errors** (classification failures, copy failures): recorded
//!   in the run report while the run continues.
//!
//! [`DataCollectError::is_fatal`] tells the two apart.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::TimeRange;

/// Main error type for datacollect-rs operations
#[derive(Error, Debug)]
pub enum DataCollectError {
    /// Bad input/output paths or an unusable environment
    #[error("Setup error: {0}")]
    FatalSetup(String),

    /// Errors related to configuration loading/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed session log
    #[error("Session log error at line {line}: {message}")]
    SessionLog { line: u64, message: String },

    /// A raw file that cannot be attributed to a session/device/data type
    #[error("Cannot classify {}: {reason}", .path.display())]
    Classification {
        path: PathBuf,
        reason: ClassificationReason,
    },

    /// IO errors tied to a specific file
    #[error("IO error on {}: {source}", .path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading/writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Archive errors
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// ELAN template errors
    #[error("Template error: {0}")]
    Template(String),

    /// ffprobe invocation/output errors
    #[error("Video probe error: {0}")]
    Probe(String),

    /// Malformed sensor data
    #[error("Parse error in {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// Viewer window errors
    #[error("Viewer error: {0}")]
    Viewer(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DataCollectError>,
    },
}

/// Why a raw file could not be classified
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassificationReason {
    #[error("path does not follow {{date}}/{{device_id}}/{{device_type}}/{{file}}")]
    UnexpectedLayout,

    #[error("unknown device type '{0}'")]
    UnknownDeviceType(String),

    #[error("camera '{0}' has no data type in the [cameras] registry")]
    UnregisteredCamera(String),

    #[error("unreadable timestamps: {0}")]
    Timestamps(String),

    #[error("no session window overlaps {0}")]
    NoMatchingSession(TimeRange),

    #[error("{range} overlaps several sessions: {}", .candidates.join(", "))]
    AmbiguousSession {
        range: TimeRange,
        candidates: Vec<String>,
    },

    #[error("another raw file also maps to {}", .0.display())]
    ConflictingTarget(PathBuf),
}

impl DataCollectError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DataCollectError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Wrap an IO error with the path it happened on
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        DataCollectError::FileIo {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a parse error for a data file
    pub fn parse(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        DataCollectError::Parse {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Create a classification error
    pub fn classification(path: impl AsRef<Path>, reason: ClassificationReason) -> Self {
        DataCollectError::Classification {
            path: path.as_ref().to_path_buf(),
            reason,
        }
    }

    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        match self {
            DataCollectError::FatalSetup(_)
            | DataCollectError::Config(_)
            | DataCollectError::SessionLog { .. }
            | DataCollectError::Toml(_) => true,
            DataCollectError::WithContext { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    /// Whether this error is a classification failure
    pub fn is_classification(&self) -> bool {
        match self {
            DataCollectError::Classification { .. } => true,
            DataCollectError::WithContext { source, .. } => source.is_classification(),
            _ => false,
        }
    }
}

/// Result type alias for datacollect-rs operations
pub type Result<T> = std::result::Result<T, DataCollectError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
