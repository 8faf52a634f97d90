//! Error types for mirror runs.

use serde::Serialize;
use thiserror::Error;

/// Result type for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Errors that can occur while discovering, diffing or applying a mirror.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// Remote listing or fetch failed.
    #[error("remote unavailable: {message}")]
    RemoteUnavailable {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote reported that an item does not exist.
    #[error("remote item not found: {0}")]
    NotFound(String),

    /// The remote refused access to an item.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Store list, put, get or delete failed.
    #[error("store unavailable: {message}")]
    StoreUnavailable {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Bytes could not be read, parsed or serialized.
    #[error("content read failure: {0}")]
    ContentReadFailure(String),

    /// The remote listing broke the duplicate-name policy.
    #[error("invalid listing: {0}")]
    InvalidListing(String),

    /// Configuration is missing or inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The run was cancelled before the item started.
    #[error("sync cancelled")]
    Cancelled,
}

impl MirrorError {
    /// Creates a retryable remote error.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a retryable store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable store error.
    pub fn store_fatal(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if re-running the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            MirrorError::RemoteUnavailable { retryable, .. } => *retryable,
            MirrorError::StoreUnavailable { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Classification recorded in a sync report.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MirrorError::RemoteUnavailable { .. } => ErrorKind::RemoteUnavailable,
            MirrorError::NotFound(_) => ErrorKind::NotFound,
            MirrorError::AccessDenied(_) => ErrorKind::AccessDenied,
            MirrorError::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            MirrorError::ContentReadFailure(_)
            | MirrorError::InvalidListing(_)
            | MirrorError::Config(_) => ErrorKind::ContentReadFailure,
            MirrorError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<opendal::Error> for MirrorError {
    fn from(err: opendal::Error) -> Self {
        use opendal::ErrorKind as Kind;
        match err.kind() {
            Kind::ConfigInvalid => MirrorError::Config(err.to_string()),
            Kind::PermissionDenied | Kind::Unsupported => MirrorError::store_fatal(err.to_string()),
            _ => MirrorError::StoreUnavailable {
                retryable: err.is_temporary() || matches!(err.kind(), Kind::Unexpected),
                message: err.to_string(),
            },
        }
    }
}

/// Report-facing error classification for a failed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RemoteUnavailable,
    StoreUnavailable,
    ContentReadFailure,
    NotFound,
    AccessDenied,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RemoteUnavailable => "remote_unavailable",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::ContentReadFailure => "content_read_failure",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AccessDenied => "access_denied",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
