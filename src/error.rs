//! Error types for safeio.
//!
//! This module provides the [`Error`] enum containing every failure the
//! read, write, and copy primitives can report, and the [`Result`] alias.
//!
//! # Error Categories
//!
//! | Category | Errors |
//! |----------|--------|
//! | Input | [`Error::InvalidPath`] |
//! | Symlinks | [`Error::PathIsSymlink`], [`Error::AncestorIsSymlink`], [`Error::SymlinkLoopDetected`] |
//! | File type | [`Error::PathIsDirectory`], [`Error::NotADirectory`], [`Error::PathNotRegularFile`], [`Error::UnsupportedFileType`] |
//! | Races | [`Error::IdentityChanged`], [`Error::ContainmentViolation`] |
//! | IO | [`Error::Io`], [`Error::TempFile`], [`Error::RenameConflict`], [`Error::CleanupFailed`] |
//! | Limits | [`Error::MaxDepthExceeded`] |

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for safeio operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by safeio operations.
///
/// Every failure aborts the operation it occurred in. No variant is ever
/// swallowed internally, and temp files are removed before one is returned.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The path was empty or whitespace only
    #[error("Invalid path: {0:?}")]
    InvalidPath(PathBuf),

    /// The path itself is a symlink where a file or directory was required
    #[error("Path is a symlink: {0}")]
    PathIsSymlink(PathBuf),

    /// An ancestor directory of the path is a symlink
    #[error("Ancestor directory is a symlink: {0}")]
    AncestorIsSymlink(PathBuf),

    /// The path is a directory where a regular file was required
    #[error("Path is a directory: {0}")]
    PathIsDirectory(PathBuf),

    /// A directory was required but the path names something else
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The path exists but is not a regular file
    #[error("Path is not a regular file: {0}")]
    PathNotRegularFile(PathBuf),

    /// The entry is a FIFO, socket, device, or other type that cannot be copied
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(PathBuf),

    /// The ancestor walk visited the same path twice
    #[error("Symlink loop detected: {0}")]
    SymlinkLoopDetected(PathBuf),

    /// The copy destination equals or lies inside the source
    #[error("Destination {dst} is the same as or inside source {src}")]
    ContainmentViolation {
        /// Copy source
        src: PathBuf,
        /// Copy destination
        dst: PathBuf,
    },

    /// The file behind the path changed between validation and use
    #[error("File identity changed during operation: {0}")]
    IdentityChanged(PathBuf),

    /// IO error from the underlying platform
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Failed to create the temporary file next to the target
    #[error("Failed to create temporary file in {path}: {source}")]
    TempFile {
        /// Directory where temp file creation was attempted
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// The overwrite fallback could not remove or replace the destination
    #[error("Failed to replace existing destination {path}: {source}")]
    RenameConflict {
        /// Destination path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// The operation failed and the temp file could not be removed afterwards
    #[error("{error} (cleanup of {path} also failed: {cleanup})")]
    CleanupFailed {
        /// The error that aborted the operation
        error: Box<Error>,
        /// The temp file that was left behind
        path: PathBuf,
        /// Why removing it failed
        cleanup: io::Error,
    },

    /// Directory traversal went deeper than the configured limit
    #[error("Maximum depth {max_depth} exceeded at: {path}")]
    MaxDepthExceeded {
        /// The directory where the limit was hit
        path: PathBuf,
        /// The configured maximum depth
        max_depth: usize,
    },
}

/// Fieldless mirror of [`Error`] for matching without destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Empty, whitespace-only, or unusable path
    InvalidPath,
    /// The final component is a symlink
    PathIsSymlink,
    /// A directory above the target is a symlink
    AncestorIsSymlink,
    /// A directory where a file was required
    PathIsDirectory,
    /// A non-directory where a directory was required
    NotADirectory,
    /// Exists but is not a regular file
    PathNotRegularFile,
    /// An entry that cannot be copied (FIFO, socket, device)
    UnsupportedFileType,
    /// A symlink or directory cycle
    SymlinkLoopDetected,
    /// Destination equals or lies inside the source
    ContainmentViolation,
    /// The path now names a different file than the one checked
    IdentityChanged,
    /// Underlying I/O failure, including temp file creation
    Io,
    /// The rename fallback could not clear the target
    RenameConflict,
    /// An operation failed and its temp file could not be removed
    CleanupFailed,
    /// Directory tree deeper than the configured limit
    MaxDepthExceeded,
}

impl Error {
    /// Classify this error.
    ///
    /// [`Error::TempFile`] reports as [`ErrorKind::Io`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPath(_) => ErrorKind::InvalidPath,
            Self::PathIsSymlink(_) => ErrorKind::PathIsSymlink,
            Self::AncestorIsSymlink(_) => ErrorKind::AncestorIsSymlink,
            Self::PathIsDirectory(_) => ErrorKind::PathIsDirectory,
            Self::NotADirectory(_) => ErrorKind::NotADirectory,
            Self::PathNotRegularFile(_) => ErrorKind::PathNotRegularFile,
            Self::UnsupportedFileType(_) => ErrorKind::UnsupportedFileType,
            Self::SymlinkLoopDetected(_) => ErrorKind::SymlinkLoopDetected,
            Self::ContainmentViolation { .. } => ErrorKind::ContainmentViolation,
            Self::IdentityChanged(_) => ErrorKind::IdentityChanged,
            Self::Io(_) | Self::TempFile { .. } => ErrorKind::Io,
            Self::RenameConflict { .. } => ErrorKind::RenameConflict,
            Self::CleanupFailed { .. } => ErrorKind::CleanupFailed,
            Self::MaxDepthExceeded { .. } => ErrorKind::MaxDepthExceeded,
        }
    }

    /// The error that aborted the operation, looking through
    /// [`Error::CleanupFailed`].
    #[must_use]
    pub fn root(&self) -> &Error {
        match self {
            Self::CleanupFailed { error, .. } => error.root(),
            other => other,
        }
    }
}
