//! Classified errors for destination writes.
//!
//! Callers branch on [`WriteError::kind`], not on the variant payloads.

use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

use crate::io::repository::RepoError;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Coarse classification of a failed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// User-fixable precondition failure (bad config, unresolved ref without force).
    Validation,
    /// The underlying version-control or credential command failed.
    Execution,
    /// Filesystem failure during snapshot, copy, or cleanup.
    Io,
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    Execution {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WriteError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            source: None,
        }
    }

    /// Execution failure wrapping an underlying cause.
    pub fn execution_from(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Execution {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Execution { .. } => ErrorKind::Execution,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}

/// Convenience constructor for [`WriteError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> WriteError {
    WriteError::Io {
        path: path.into(),
        source,
    }
}

impl From<RepoError> for WriteError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Io { path, source } => WriteError::Io { path, source },
            other => WriteError::Execution {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}
