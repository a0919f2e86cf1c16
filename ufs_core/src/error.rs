//! Error types for ufs_core.

use serde::Serialize;
use std::collections::TryReserveError;
use std::fmt;
use thiserror::Error;

/// Result type alias using ufs_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No file with this name is present.
    #[error("No such file: {name}")]
    NoSuchFile { name: String },

    /// Descriptor is out of range or already closed.
    #[error("Bad file descriptor: {fd}")]
    BadDescriptor { fd: usize },

    /// An allocation failed.
    #[error("Out of memory: {context}")]
    OutOfMemory { context: String },

    /// A write or resize would exceed the maximum file size.
    #[error("File too large: {name} (limit {limit} bytes)")]
    FileTooLarge { name: String, limit: u64 },

    /// Engine configuration is invalid.
    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// An internal id no longer resolves to a live entry.
    #[error("Stale handle: {what}")]
    StaleHandle { what: String },
}

impl Error {
    /// Create a NoSuchFile error.
    pub fn no_such_file(name: impl Into<String>) -> Self {
        Error::NoSuchFile { name: name.into() }
    }

    /// Create a BadDescriptor error.
    pub fn bad_descriptor(fd: usize) -> Self {
        Error::BadDescriptor { fd }
    }

    /// Create an OutOfMemory error.
    pub fn out_of_memory(context: impl Into<String>) -> Self {
        Error::OutOfMemory {
            context: context.into(),
        }
    }

    /// Create a FileTooLarge error.
    pub fn file_too_large(name: impl Into<String>, limit: u64) -> Self {
        Error::FileTooLarge {
            name: name.into(),
            limit,
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a StaleHandle error.
    pub fn stale_handle(what: impl Into<String>) -> Self {
        Error::StaleHandle { what: what.into() }
    }

    /// Coarse classification reported through `Engine::last_error`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoSuchFile { .. }
            | Error::BadDescriptor { .. }
            | Error::StaleHandle { .. }
            | Error::InvalidConfig { .. } => ErrorKind::NoSuchFile,
            Error::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Error::FileTooLarge { .. } => ErrorKind::FileTooLarge,
        }
    }
}

impl From<TryReserveError> for Error {
    fn from(err: TryReserveError) -> Self {
        Error::OutOfMemory {
            context: err.to_string(),
        }
    }
}

/// Outcome of the most recent engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    #[default]
    NoError,
    NoSuchFile,
    OutOfMemory,
    FileTooLarge,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NoError => "no_error",
            ErrorKind::NoSuchFile => "no_such_file",
            ErrorKind::OutOfMemory => "out_of_memory",
            ErrorKind::FileTooLarge => "file_too_large",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
