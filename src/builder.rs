//! Builder API that carries a policy across operations.
//!
//! [`SafeIo`] owns a [`PlatformPolicy`] and exposes every read, write, and
//! copy primitive as a method, so a configured policy doesn't have to be
//! threaded through each call.
//!
//! # Examples
//!
//! ## Basic Usage
//!
//! ```no_run
//! use safeio::SafeIo;
//!
//! let io = SafeIo::new();
//! io.write("out/report.txt", "done")?;
//! assert_eq!(io.read("out/report.txt")?, "done");
//! # Ok::<(), safeio::Error>(())
//! ```
//!
//! ## With Options
//!
//! ```no_run
//! use safeio::SafeIo;
//!
//! let stats = SafeIo::new()
//!     .file_mode(0o600)      // New files are private
//!     .max_depth(32)         // Bound directory traversal
//!     .no_fsync()            // Scratch data, skip durability
//!     .copy("src", "dst")?;
//! # Ok::<(), safeio::Error>(())
//! ```

use crate::copy::{CopyStats, copy_dir_with, copy_file_with};
use crate::error::Result;
use crate::guard::check_not_blank;
use crate::policy::{PlatformPolicy, SymlinkPolicy};
use crate::{file_exists, reader, writer};
use std::fs;
use std::path::{Path, PathBuf};

/// A policy-carrying handle for safe file operations.
///
/// # Example
///
/// ```no_run
/// use safeio::SafeIo;
///
/// // Tolerate a symlinked mount point, reject every other symlinked ancestor
/// let io = SafeIo::new().allow_system_alias("/data");
/// let bytes = io.read_bytes("/data/blob.bin")?;
/// # Ok::<(), safeio::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SafeIo {
    policy: PlatformPolicy,
}

impl SafeIo {
    /// Create a `SafeIo` with the host platform's policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `SafeIo` from an existing policy.
    pub fn with_policy(policy: PlatformPolicy) -> Self {
        Self { policy }
    }

    /// Tolerate `alias` as a symlinked ancestor.
    ///
    /// Switches the policy to [`SymlinkPolicy::AllowKnownSystemPath`]; any
    /// symlinked ancestor not on the list is still rejected.
    #[must_use]
    pub fn allow_system_alias<P: Into<PathBuf>>(mut self, alias: P) -> Self {
        self.policy = self
            .policy
            .with_symlink_policy(SymlinkPolicy::AllowKnownSystemPath)
            .with_system_alias(alias);
        self
    }

    /// Reject every symlinked ancestor, including the platform's defaults.
    #[must_use]
    pub fn strict_ancestors(mut self) -> Self {
        self.policy = self
            .policy
            .with_symlink_policy(SymlinkPolicy::Reject)
            .without_system_aliases();
        self
    }

    /// Compare paths case-insensitively (or not).
    #[must_use]
    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.policy = self.policy.with_case_insensitive(yes);
        self
    }

    /// Skip every fsync.
    ///
    /// Writes stay atomic but may not survive a power loss.
    #[must_use]
    pub fn no_fsync(mut self) -> Self {
        self.policy = self.policy.without_fsync();
        self
    }

    /// Mode for newly created files.
    #[must_use]
    pub fn file_mode(mut self, mode: u32) -> Self {
        self.policy = self.policy.with_default_file_mode(mode);
        self
    }

    /// Mode for directories created as missing parents.
    #[must_use]
    pub fn dir_mode(mut self, mode: u32) -> Self {
        self.policy = self.policy.with_default_dir_mode(mode);
        self
    }

    /// Limit directory copy depth.
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.policy = self.policy.with_max_depth(depth);
        self
    }

    /// Set a warning handler for best-effort failures.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use safeio::SafeIo;
    ///
    /// let io = SafeIo::new().on_warning(|msg| eprintln!("Warning: {}", msg));
    /// ```
    #[must_use]
    pub fn on_warning(mut self, handler: fn(&str)) -> Self {
        self.policy = self.policy.with_warn_handler(handler);
        self
    }

    /// Get the current policy.
    pub fn policy(&self) -> &PlatformPolicy {
        &self.policy
    }

    /// See [`file_exists`](crate::file_exists).
    pub fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        file_exists(path)
    }

    /// See [`file_read`](crate::file_read).
    pub fn read<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        reader::read_string(path.as_ref(), &self.policy)
    }

    /// See [`file_read_bytes`](crate::file_read_bytes).
    pub fn read_bytes<P: AsRef<Path>>(&self, path: P) -> Result<Vec<u8>> {
        reader::read_bytes(path.as_ref(), &self.policy)
    }

    /// See [`file_write`](crate::file_write).
    pub fn write<P: AsRef<Path>>(&self, path: P, content: &str) -> Result<()> {
        writer::write_atomic(path.as_ref(), content.as_bytes(), &self.policy)
    }

    /// See [`file_write_bytes`](crate::file_write_bytes).
    pub fn write_bytes<P: AsRef<Path>>(&self, path: P, content: &[u8]) -> Result<()> {
        writer::write_atomic(path.as_ref(), content, &self.policy)
    }

    /// See [`copy_file_with`].
    pub fn copy_file<P: AsRef<Path>, Q: AsRef<Path>>(&self, src: P, dst: Q) -> Result<u64> {
        copy_file_with(src.as_ref(), dst.as_ref(), &self.policy)
    }

    /// See [`copy_dir_with`].
    pub fn copy_dir<P: AsRef<Path>, Q: AsRef<Path>>(&self, src: P, dst: Q) -> Result<CopyStats> {
        copy_dir_with(src.as_ref(), dst.as_ref(), &self.policy)
    }

    /// Copy a file or a directory, depending on what `src` is.
    ///
    /// A real directory goes through [`copy_dir_with`]; anything else
    /// (including a symlink to a directory) through [`copy_file_with`],
    /// reported as a one-entry [`CopyStats`].
    pub fn copy<P: AsRef<Path>, Q: AsRef<Path>>(&self, src: P, dst: Q) -> Result<CopyStats> {
        let src = src.as_ref();
        let dst = dst.as_ref();
        check_not_blank(src)?;
        let meta = fs::symlink_metadata(src)?;
        if meta.is_dir() {
            return self.copy_dir(src, dst);
        }

        let start = std::time::Instant::now();
        let bytes = self.copy_file(src, dst)?;
        let is_link = meta.file_type().is_symlink();
        Ok(CopyStats {
            files_copied: u64::from(!is_link),
            symlinks_copied: u64::from(is_link),
            dirs_created: 0,
            bytes_copied: bytes,
            duration: start.elapsed(),
        })
    }
}
