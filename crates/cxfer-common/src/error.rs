//! Unified error types for the cxfer workspace.
//!
//! [`TransferError`] is the error category surfaced by container file
//! transfer. Its [`TransferErrorKind`] is the structured classification;
//! the message is kept for diagnostics and always ends with the OS text
//! of the underlying failure, so callers that match on the message tail
//! keep working.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Trailing text of a failure caused by a missing path component.
pub const NO_SUCH_FILE: &str = "No such file or directory";

/// Trailing text of a failure caused by a non-directory path component.
pub const NOT_A_DIRECTORY: &str = "Not a directory";

/// Trailing text of a write into a read-only mount.
pub const READ_ONLY_FS: &str = "Read-only file system";

/// Direction of a file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferOp {
    /// Host to container.
    Write,
    /// Container to host.
    Read,
}

impl fmt::Display for TransferOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write => write!(f, "write"),
            Self::Read => write!(f, "read"),
        }
    }
}

/// Classification of a failed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferErrorKind {
    /// The parent directory of the target path does not exist.
    ParentNotFound,
    /// A path component that should be a directory is a regular file.
    ParentNotADirectory,
    /// The file to read does not exist.
    NotFound,
    /// Any other failure.
    Other,
}

impl TransferErrorKind {
    /// Maps a legacy error message to a kind by its trailing text.
    ///
    /// Trailing whitespace (including the newline most tools print) is
    /// ignored. A missing path component means the parent is missing for a
    /// write and the file itself is missing for a read.
    #[must_use]
    pub fn from_message(op: TransferOp, message: &str) -> Self {
        let tail = message.trim_end();
        if tail.ends_with(NO_SUCH_FILE) {
            match op {
                TransferOp::Write => Self::ParentNotFound,
                TransferOp::Read => Self::NotFound,
            }
        } else if tail.ends_with(NOT_A_DIRECTORY) {
            Self::ParentNotADirectory
        } else {
            Self::Other
        }
    }

    /// Returns the fixed trailing text a message of this kind ends with.
    #[must_use]
    pub const fn expected_suffix(self) -> Option<&'static str> {
        match self {
            Self::ParentNotFound | Self::NotFound => Some(NO_SUCH_FILE),
            Self::ParentNotADirectory => Some(NOT_A_DIRECTORY),
            Self::Other => None,
        }
    }
}

impl fmt::Display for TransferErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParentNotFound => write!(f, "parent not found"),
            Self::ParentNotADirectory => write!(f, "parent not a directory"),
            Self::NotFound => write!(f, "not found"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A classified container file transfer failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{op} {path} failed: {message}")]
pub struct TransferError {
    /// Direction of the failed transfer.
    pub op: TransferOp,
    /// Structured classification.
    pub kind: TransferErrorKind,
    /// Container path of the transfer.
    pub path: String,
    /// Diagnostic message, ending with the underlying OS text.
    pub message: String,
}

impl TransferError {
    /// Creates an error with an explicit classification.
    #[must_use]
    pub fn new(
        op: TransferOp,
        kind: TransferErrorKind,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            op,
            kind,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an error classified from its message tail.
    #[must_use]
    pub fn from_message(op: TransferOp, path: impl Into<String>, message: &str) -> Self {
        let message = message.trim_end();
        Self::new(
            op,
            TransferErrorKind::from_message(op, message),
            path,
            message,
        )
    }

    /// Returns whether the rendered message ends with `suffix`.
    #[must_use]
    pub fn message_ends_with(&self, suffix: &str) -> bool {
        self.to_string().ends_with(suffix)
    }
}

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum CxferError {
    /// An I/O operation on the host failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A resource is in a state that does not allow the operation.
    #[error("{resource} {id}: {message}")]
    InvalidState {
        /// Type of the resource.
        resource: &'static str,
        /// Identifier or name of the resource.
        id: String,
        /// What the state prevents.
        message: String,
    },

    /// A backend command exited unsuccessfully.
    #[error("`{command}` failed: {message}")]
    Backend {
        /// Command line that failed.
        command: String,
        /// Captured diagnostic output.
        message: String,
    },

    /// A classified file transfer failure.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl CxferError {
    /// Returns the transfer error if this is a classified transfer failure.
    #[must_use]
    pub const fn as_transfer(&self) -> Option<&TransferError> {
        match self {
            Self::Transfer(e) => Some(e),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CxferError>;
