//! Error types for the filesystem layer and its object store collaborator.
//!
//! Two layers of errors exist:
//!
//! - [`StoreError`] -- failures reported by an [`ObjectStore`](crate::ObjectStore)
//!   implementation (missing keys, rejected multipart manifests, transport
//!   failures).
//! - [`FsError`] -- failures of the filesystem operations themselves. Every
//!   store failure surfaces as [`FsError::StoreOperationFailed`], carrying the
//!   attempted operation and key for diagnosis.
//!
//! # Usage
//!
//! ```
//! use s3fs_core::error::{FsError, StoreError};
//!
//! let err = FsError::store("stat", "a/b.txt", StoreError::NotFound {
//!     key: "a/b.txt".to_owned(),
//! });
//! assert!(err.is_not_found());
//! assert_eq!(err.to_string(), "s3fs: stat a/b.txt: the specified key does not exist: a/b.txt");
//! ```

use crate::handle::OpenMode;
use crate::multipart::UploadState;

/// Failure reported by an object store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The specified key does not exist.
    #[error("the specified key does not exist: {key}")]
    NotFound {
        /// The key that was not found.
        key: String,
    },

    /// The specified multipart upload does not exist.
    #[error("the specified upload does not exist: {upload_id}")]
    NoSuchUpload {
        /// The upload ID that was not found.
        upload_id: String,
    },

    /// One or more of the specified parts could not be found, or its
    /// entity tag did not match.
    #[error("one or more of the specified parts could not be found")]
    InvalidPart,

    /// The list of parts was not in ascending order.
    #[error("the list of parts was not in ascending order")]
    InvalidPartOrder,

    /// The requested range is not satisfiable.
    #[error("the requested range is not satisfiable")]
    InvalidRange,

    /// An argument provided to the store is invalid.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// Any other failure (transport, credentials, throttling, ...).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    /// Whether this error means the object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience result type for object store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Filesystem layer error type.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// An operation was attempted on a handle opened in the other mode.
    #[error("s3fs: cannot {operation} a file opened for {mode}")]
    ModeMismatch {
        /// The attempted operation.
        operation: &'static str,
        /// The mode the handle was opened with.
        mode: OpenMode,
    },

    /// Seeking relative to the end of an object is not supported.
    #[error("s3fs: seeking relative to the end of an object is not supported")]
    UnsupportedSeek,

    /// A seek would move the position before the start of the object.
    #[error("s3fs: invalid seek to negative position {position}")]
    InvalidSeek {
        /// The resulting (negative) position.
        position: i128,
    },

    /// A multipart part size below the store minimum was requested.
    #[error("s3fs: part size {size} is below the minimum of {minimum} bytes")]
    PartSizeTooSmall {
        /// The requested part size.
        size: u64,
        /// The store-imposed minimum.
        minimum: u64,
    },

    /// The part size cannot change once parts have been accepted.
    #[error("s3fs: part size cannot change after {parts} part(s) have been uploaded")]
    PartSizeLocked {
        /// Number of parts already accepted.
        parts: usize,
    },

    /// The multipart upload already reached a terminal state.
    #[error("s3fs: multipart upload for {key} is already {state}")]
    UploadClosed {
        /// The upload's target key.
        key: String,
        /// The terminal state.
        state: UploadState,
    },

    /// The handle has already been closed.
    #[error("s3fs: file {key} is already closed")]
    Closed {
        /// The handle's key.
        key: String,
    },

    /// The path cannot be used as an object key.
    #[error("s3fs: invalid key {key:?}: {reason}")]
    InvalidKey {
        /// The offending key.
        key: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Reading from a caller-supplied source failed.
    #[error("s3fs: {0}")]
    Io(#[from] std::io::Error),

    /// An object store call failed.
    #[error("s3fs: {operation} {key}: {source}")]
    StoreOperationFailed {
        /// The filesystem operation that issued the call.
        operation: &'static str,
        /// The key involved.
        key: String,
        /// The underlying store failure.
        #[source]
        source: StoreError,
    },
}

impl FsError {
    /// Wrap a store failure with the attempted operation and key.
    #[must_use]
    pub fn store(operation: &'static str, key: impl Into<String>, source: StoreError) -> Self {
        Self::StoreOperationFailed {
            operation,
            key: key.into(),
            source,
        }
    }

    /// Whether the underlying store reported a missing object.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::StoreOperationFailed { source, .. } if source.is_not_found())
    }
}

/// Convenience result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_wrap_store_error_with_context() {
        let err = FsError::store(
            "remove",
            "logs/app.log",
            StoreError::Other(anyhow::anyhow!("connection reset")),
        );
        let msg = err.to_string();
        assert!(msg.contains("remove"));
        assert!(msg.contains("logs/app.log"));
        assert!(msg.contains("connection reset"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_should_expose_source_of_store_failure() {
        let err = FsError::store(
            "stat",
            "k",
            StoreError::NotFound {
                key: "k".to_owned(),
            },
        );
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("the specified key does not exist: k")
        );
    }

    #[test]
    fn test_should_detect_not_found() {
        assert!(
            StoreError::NotFound {
                key: "x".to_owned()
            }
            .is_not_found()
        );
        assert!(!StoreError::InvalidRange.is_not_found());
        assert!(!FsError::UnsupportedSeek.is_not_found());
    }

    #[test]
    fn test_should_format_mode_mismatch() {
        let err = FsError::ModeMismatch {
            operation: "write",
            mode: OpenMode::Read,
        };
        assert_eq!(err.to_string(), "s3fs: cannot write a file opened for reading");
    }

    #[test]
    fn test_should_distinguish_seek_errors() {
        let unsupported = FsError::UnsupportedSeek;
        let invalid = FsError::InvalidSeek { position: -3 };
        assert!(matches!(unsupported, FsError::UnsupportedSeek));
        assert!(matches!(invalid, FsError::InvalidSeek { position: -3 }));
        assert_ne!(unsupported.to_string(), invalid.to_string());
    }
}
