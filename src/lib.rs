//! # safeio
//!
//! Secure, atomic, and TOCTOU-resistant file reads, writes, and copies.
//!
//! ## Core Features
//!
//! - **Atomic writes**: content goes to a temp file in the target's
//!   directory and is renamed into place, so readers see the old file or the
//!   new file, never a mix
//! - **Durable**: the temp file and its parent directory are fsynced around
//!   the rename
//! - **Symlink safe**: a symlinked ancestor directory is rejected before any
//!   read or write, and symlinked targets are never followed
//! - **TOCTOU safe**: files are opened without following links and the open
//!   handle is proven to be the object that was validated
//! - **Symlink preserving copies**: symlinks are recreated with their
//!   original target, never dereferenced
//! - **Permission preserving**: overwrites keep the existing mode, copies
//!   take the source's mode
//!
//! ## Quick Start
//!
//! ```no_run
//! use safeio::{file_read, file_write};
//!
//! file_write("settings.json", "{\"theme\": \"dark\"}")?;
//! let text = file_read("settings.json")?;
//! # Ok::<(), safeio::Error>(())
//! ```
//!
//! ## Builder API
//!
//! [`SafeIo`] bundles a [`PlatformPolicy`] with the operations:
//!
//! ```no_run
//! use safeio::SafeIo;
//!
//! let io = SafeIo::new().max_depth(64).no_fsync();
//! let stats = io.copy_dir("project", "backup/project")?;
//! println!("Copied {} files ({} bytes)", stats.files_copied, stats.bytes_copied);
//! # Ok::<(), safeio::Error>(())
//! ```
//!
//! ## Safety Guarantees
//!
//! ### Ancestor Validation
//!
//! Before every operation the parent directory and each of its ancestors is
//! checked with link-level `stat`. A symlink anywhere on that chain is an
//! [`Error::AncestorIsSymlink`], unless the policy allowlists it as a
//! system alias (e.g. `/var` on macOS).
//!
//! ### Identity Binding
//!
//! A file is `lstat`ed, opened with `O_NOFOLLOW`, then `fstat`ed and
//! `lstat`ed again. Device and inode must match across all three, otherwise
//! the operation fails with [`Error::IdentityChanged`].
//!
//! ### Copy Containment
//!
//! Copying a path onto itself or into its own subtree fails with
//! [`Error::ContainmentViolation`]. Raw and symlink-resolved forms are both
//! compared.
//!
//! ## Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `tracing` | Structured logging with tracing crate |
//! | `serde` | Serialize/Deserialize for [`PlatformPolicy`] |
//! | `full` | Enable all optional features |

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

mod builder;
mod copy;
mod error;
mod guard;
mod identity;
mod policy;
mod reader;
mod temp;
mod writer;

#[cfg(windows)]
mod win_attrs;

use std::fs;
use std::path::Path;

pub use builder::SafeIo;
pub use copy::{CopyStats, copy_dir_with, copy_file_with};
pub use error::{Error, ErrorKind, Result};
pub use guard::{
    CopyTask, absolute, canonical, check_not_blank, clean, path_within, paths_equal,
    validate_no_symlink_ancestors,
};
pub use identity::FileIdentity;
pub use policy::{PlatformPolicy, SymlinkPolicy};
pub use reader::{ValidatedFile, open_validated};
pub use temp::TempArtifact;

/// Whether something other than a symlink exists at `path`.
///
/// Uses link-level `stat`: a symlink is never reported as existing, even if
/// its target does. Blank paths and stat errors report `false`.
pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    if check_not_blank(path).is_err() {
        return false;
    }
    fs::symlink_metadata(path).is_ok_and(|meta| !meta.file_type().is_symlink())
}

/// Read a UTF-8 file with the host policy.
///
/// # Errors
///
/// [`Error::InvalidPath`] for a blank path, [`Error::AncestorIsSymlink`],
/// [`Error::PathIsSymlink`], [`Error::PathIsDirectory`],
/// [`Error::PathNotRegularFile`], [`Error::IdentityChanged`], or
/// [`Error::Io`] (including invalid UTF-8 as `InvalidData`).
pub fn file_read<P: AsRef<Path>>(path: P) -> Result<String> {
    file_read_with(path, &PlatformPolicy::host())
}

/// [`file_read`] with an explicit policy.
pub fn file_read_with<P: AsRef<Path>>(path: P, policy: &PlatformPolicy) -> Result<String> {
    reader::read_string(path.as_ref(), policy)
}

/// Read a file's raw bytes with the host policy.
///
/// # Errors
///
/// Same as [`file_read`], without the UTF-8 check.
pub fn file_read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    file_read_bytes_with(path, &PlatformPolicy::host())
}

/// [`file_read_bytes`] with an explicit policy.
pub fn file_read_bytes_with<P: AsRef<Path>>(
    path: P,
    policy: &PlatformPolicy,
) -> Result<Vec<u8>> {
    reader::read_bytes(path.as_ref(), policy)
}

/// Atomically replace `path` with `content`, creating parent directories as
/// needed.
///
/// An existing file keeps its permissions; a new file gets
/// [`PlatformPolicy::default_file_mode`].
///
/// # Errors
///
/// [`Error::InvalidPath`], [`Error::AncestorIsSymlink`],
/// [`Error::PathIsSymlink`], [`Error::PathIsDirectory`],
/// [`Error::PathNotRegularFile`], [`Error::RenameConflict`],
/// [`Error::CleanupFailed`], or [`Error::Io`].
pub fn file_write<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    file_write_with(path, content, &PlatformPolicy::host())
}

/// [`file_write`] with an explicit policy.
pub fn file_write_with<P: AsRef<Path>>(
    path: P,
    content: &str,
    policy: &PlatformPolicy,
) -> Result<()> {
    writer::write_atomic(path.as_ref(), content.as_bytes(), policy)
}

/// Byte-buffer form of [`file_write`].
pub fn file_write_bytes<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    file_write_bytes_with(path, content, &PlatformPolicy::host())
}

/// [`file_write_bytes`] with an explicit policy.
pub fn file_write_bytes_with<P: AsRef<Path>>(
    path: P,
    content: &[u8],
    policy: &PlatformPolicy,
) -> Result<()> {
    writer::write_atomic(path.as_ref(), content, policy)
}

/// Copy a file (or recreate a symlink) with the host policy.
///
/// See [`copy_file_with`] for details.
pub fn copy_file<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q) -> Result<u64> {
    copy_file_with(src.as_ref(), dst.as_ref(), &PlatformPolicy::host())
}

/// Copy a directory tree with the host policy.
///
/// See [`copy_dir_with`] for details.
pub fn copy_dir<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q) -> Result<CopyStats> {
    copy_dir_with(src.as_ref(), dst.as_ref(), &PlatformPolicy::host())
}
