//! Temporary files that are either renamed into place or deleted.
//!
//! A [`TempArtifact`] lives in the same directory as its target so the final
//! rename never crosses a filesystem. Its name is `.<target>.<random>.tmp`,
//! created exclusively, so an attacker cannot guess or pre-create it.

use crate::error::{Error, Result};
use crate::guard::parent_of;
use crate::policy::PlatformPolicy;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

/// Random characters in a temp file name.
const RAND_BYTES: usize = 12;

/// What the commit may replace at the target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Occupant {
    /// Only a regular file (content writes and file copies)
    RegularFile,
    /// Any non-directory entry (recreated symlinks)
    AnyEntry,
}

/// A temp file bound to the path it will replace.
///
/// Ends in exactly one of [`commit`](Self::commit) or
/// [`discard`](Self::discard). Both consume the artifact, so it can be
/// committed at most once. If it is dropped instead, the temp file is
/// removed and any removal error is lost.
#[derive(Debug)]
pub struct TempArtifact<F = File> {
    inner: NamedTempFile<F>,
    target: PathBuf,
}

fn temp_prefix(target: &Path) -> OsString {
    let mut prefix = OsString::from(".");
    if let Some(name) = target.file_name() {
        prefix.push(name);
        prefix.push(".");
    }
    prefix
}

impl TempArtifact<File> {
    /// Create an empty temp file next to `target`.
    ///
    /// The file starts with owner-only permissions; callers set the final
    /// mode before committing.
    ///
    /// # Errors
    ///
    /// [`Error::TempFile`] if the file cannot be created.
    pub fn create_for(target: &Path) -> Result<Self> {
        let dir = parent_of(target);
        let prefix = temp_prefix(target);
        let inner = Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .rand_bytes(RAND_BYTES)
            .tempfile_in(dir)
            .map_err(|e| Error::TempFile {
                path: dir.to_path_buf(),
                source: e,
            })?;
        Ok(Self {
            inner,
            target: target.to_path_buf(),
        })
    }

    /// The open temp file.
    pub fn as_file(&self) -> &File {
        self.inner.as_file()
    }

    /// The open temp file, mutably.
    pub fn as_file_mut(&mut self) -> &mut File {
        self.inner.as_file_mut()
    }
}

impl TempArtifact<()> {
    /// Create a symlink pointing at `link_target` next to `target`.
    pub(crate) fn symlink_for(target: &Path, link_target: &Path, is_dir: bool) -> Result<Self> {
        let dir = parent_of(target);
        let prefix = temp_prefix(target);
        let inner = Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .rand_bytes(RAND_BYTES)
            .make_in(dir, |path| create_symlink(link_target, path, is_dir))
            .map_err(|e| Error::TempFile {
                path: dir.to_path_buf(),
                source: e,
            })?;
        Ok(Self {
            inner,
            target: target.to_path_buf(),
        })
    }
}

impl<F> TempArtifact<F> {
    /// Current (temporary) location.
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Path the artifact will be renamed to.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Delete the temp file.
    pub fn discard(self) -> io::Result<()> {
        self.inner.close()
    }

    /// Delete the temp file after `error` aborted the operation.
    ///
    /// Returns `error` unchanged, or [`Error::CleanupFailed`] wrapping it if
    /// the temp file could not be removed.
    pub fn fail(self, error: Error) -> Error {
        let path = self.path().to_path_buf();
        match self.discard() {
            Ok(()) => error,
            Err(cleanup) => Error::CleanupFailed {
                error: Box::new(error),
                path,
                cleanup,
            },
        }
    }

    /// Rename the temp file onto its target, then make the rename durable.
    ///
    /// An existing target must be a regular file.
    ///
    /// # Errors
    ///
    /// Any failure before the rename removes the temp file first. A failure
    /// to fsync the parent directory is reported after the rename already
    /// happened.
    pub fn commit(self, policy: &PlatformPolicy) -> Result<F> {
        self.commit_over(Occupant::RegularFile, policy)
    }

    pub(crate) fn commit_over(self, occupant: Occupant, policy: &PlatformPolicy) -> Result<F> {
        let target = self.target;
        let persisted = match self.inner.persist(&target) {
            Ok(file) => file,
            Err(err) if policy.replace_requires_remove => {
                let inner = err.file;
                let retry = match replace_existing(&target, occupant, policy) {
                    Ok(()) => inner.persist(&target).map_err(|e| (Error::Io(e.error), e.file)),
                    Err(e) => Err((e, inner)),
                };
                match retry {
                    Ok(file) => file,
                    Err((error, inner)) => {
                        return Err(Self {
                            inner,
                            target: target.clone(),
                        }
                        .fail(error));
                    }
                }
            }
            Err(err) => {
                let artifact = Self {
                    inner: err.file,
                    target: target.clone(),
                };
                return Err(artifact.fail(Error::Io(err.error)));
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(path = %target.display(), "committed temp file");

        if policy.sync_dir() {
            sync_dir(parent_of(&target))?;
        }
        Ok(persisted)
    }
}

/// Clear an existing target so a non-replacing rename can be retried.
///
/// The occupant is re-validated first because it may have changed since the
/// caller inspected it.
pub(crate) fn replace_existing(
    target: &Path,
    occupant: Occupant,
    policy: &PlatformPolicy,
) -> Result<()> {
    let meta = match fs::symlink_metadata(target) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let ft = meta.file_type();
    if ft.is_dir() {
        return Err(Error::PathIsDirectory(target.to_path_buf()));
    }
    if occupant == Occupant::RegularFile {
        if ft.is_symlink() {
            return Err(Error::PathIsSymlink(target.to_path_buf()));
        }
        if !ft.is_file() {
            return Err(Error::PathNotRegularFile(target.to_path_buf()));
        }
    }

    if let Err(e) = loosen_permissions(target, &meta) {
        policy.warn(&format!(
            "Failed to clear read-only flag on {}: {}",
            target.display(),
            e
        ));
    }

    fs::remove_file(target).map_err(|source| Error::RenameConflict {
        path: target.to_path_buf(),
        source,
    })
}

#[cfg(windows)]
fn loosen_permissions(target: &Path, meta: &fs::Metadata) -> io::Result<()> {
    if meta.permissions().readonly() {
        crate::win_attrs::clear_readonly(target)?;
    }
    Ok(())
}

#[cfg(not(windows))]
fn loosen_permissions(_target: &Path, _meta: &fs::Metadata) -> io::Result<()> {
    // Unlinking on Unix depends on the directory, not the file mode.
    Ok(())
}

/// Fsync a directory so a rename inside it survives a crash.
pub(crate) fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(unix)]
pub(crate) fn create_symlink(target: &Path, link: &Path, _is_dir: bool) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub(crate) fn create_symlink(target: &Path, link: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

#[cfg(not(any(unix, windows)))]
pub(crate) fn create_symlink(_target: &Path, _link: &Path, _is_dir: bool) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Symlinks not supported on this platform",
    ))
}
