//! Opening files for reading with a check-then-use binding.
//!
//! [`open_validated`] refuses anything but a regular file and, after the
//! open, proves that the handle and the path still refer to the same object.
//! A path swapped between the check and the open is detected instead of
//! silently read.

use crate::error::{Error, Result};
use crate::guard::{absolute, parent_of, validate_no_symlink_ancestors};
use crate::identity::FileIdentity;
use crate::policy::PlatformPolicy;
use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{self, Read};
use std::path::Path;

/// An open handle whose identity was checked against its path.
#[derive(Debug)]
pub struct ValidatedFile {
    file: File,
    identity: FileIdentity,
    metadata: Metadata,
}

impl ValidatedFile {
    /// The open handle.
    pub fn file(&self) -> &File {
        &self.file
    }

    /// Identity of the open handle.
    pub fn identity(&self) -> FileIdentity {
        self.identity
    }

    /// Handle metadata captured at validation time.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Give up the validation record and keep the handle.
    pub fn into_file(self) -> File {
        self.file
    }

    /// Re-run the post-open checks against `path`.
    ///
    /// # Errors
    ///
    /// [`Error::PathIsSymlink`] if `path` became a symlink,
    /// [`Error::IdentityChanged`] if it now names a different object or
    /// vanished.
    pub fn revalidate(&self, path: &Path) -> Result<()> {
        let (identity, _) = bind(path, &self.file)?;
        if identity != self.identity {
            return Err(Error::IdentityChanged(path.to_path_buf()));
        }
        Ok(())
    }
}

impl Read for ValidatedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

/// Reject anything but a regular file, based on link-level metadata.
pub(crate) fn require_regular_file(path: &Path, meta: &Metadata) -> Result<()> {
    let ft = meta.file_type();
    if ft.is_symlink() {
        return Err(Error::PathIsSymlink(path.to_path_buf()));
    }
    if ft.is_dir() {
        return Err(Error::PathIsDirectory(path.to_path_buf()));
    }
    if !ft.is_file() {
        return Err(Error::PathNotRegularFile(path.to_path_buf()));
    }
    Ok(())
}

/// Identity for the entry described by link-level metadata `meta` of `path`.
#[cfg(unix)]
pub(crate) fn path_identity(_path: &Path, meta: &Metadata) -> io::Result<FileIdentity> {
    Ok(FileIdentity::from_metadata(meta))
}

#[cfg(windows)]
pub(crate) fn path_identity(path: &Path, _meta: &Metadata) -> io::Result<FileIdentity> {
    FileIdentity::of_path(path)
}

/// `fstat` the handle, `lstat` the path, and require that they match.
fn bind(path: &Path, file: &File) -> Result<(FileIdentity, Metadata)> {
    let handle_meta = file.metadata()?;
    let path_meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::IdentityChanged(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    if path_meta.file_type().is_symlink() {
        return Err(Error::PathIsSymlink(path.to_path_buf()));
    }

    let handle_id = FileIdentity::of_file(file)?;
    if handle_id != path_identity(path, &path_meta)? {
        return Err(Error::IdentityChanged(path.to_path_buf()));
    }
    if !handle_meta.is_file() {
        return Err(Error::PathNotRegularFile(path.to_path_buf()));
    }
    Ok((handle_id, handle_meta))
}

#[cfg(unix)]
fn open_no_follow(path: &Path) -> Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    // O_NONBLOCK: a FIFO swapped in after the lstat must not hang the open.
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NOFOLLOW | libc::O_CLOEXEC | libc::O_NONBLOCK)
        .open(path)
        .map_err(|e| {
            if e.raw_os_error() == Some(libc::ELOOP) {
                Error::PathIsSymlink(path.to_path_buf())
            } else {
                e.into()
            }
        })
}

#[cfg(windows)]
fn open_no_follow(path: &Path) -> Result<File> {
    use std::os::windows::fs::OpenOptionsExt;

    // Open a reparse point as itself; the identity check rejects it.
    const FILE_FLAG_OPEN_REPARSE_POINT: u32 = 0x0020_0000;
    Ok(OpenOptions::new()
        .read(true)
        .custom_flags(FILE_FLAG_OPEN_REPARSE_POINT)
        .open(path)?)
}

/// Open `path` for reading after proving it is a regular file.
///
/// 1. `lstat(path)`: must be a regular file (not a symlink or directory).
/// 2. Open without following a final symlink.
/// 3. `fstat` the handle and `lstat` the path again: the path must not have
///    become a symlink and both must report the same identity as the first
///    `lstat`.
///
/// # Errors
///
/// [`Error::PathIsSymlink`], [`Error::PathIsDirectory`],
/// [`Error::PathNotRegularFile`], [`Error::IdentityChanged`], or
/// [`Error::Io`].
pub fn open_validated(path: &Path) -> Result<ValidatedFile> {
    let before = fs::symlink_metadata(path)?;
    require_regular_file(path, &before)?;
    let expected = path_identity(path, &before)?;

    let file = open_no_follow(path)?;
    let (identity, metadata) = bind(path, &file)?;
    if identity != expected {
        return Err(Error::IdentityChanged(path.to_path_buf()));
    }

    Ok(ValidatedFile {
        file,
        identity,
        metadata,
    })
}

/// Read a whole file as bytes.
pub(crate) fn read_bytes(path: &Path, policy: &PlatformPolicy) -> Result<Vec<u8>> {
    let path = absolute(path)?;
    validate_no_symlink_ancestors(parent_of(&path), policy)?;

    let mut file = open_validated(&path)?;
    let mut buf = Vec::with_capacity(usize::try_from(file.metadata().len()).unwrap_or(0));
    file.read_to_end(&mut buf)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(path = %path.display(), bytes = buf.len(), "read file");

    Ok(buf)
}

/// Read a whole file as UTF-8 text.
pub(crate) fn read_string(path: &Path, policy: &PlatformPolicy) -> Result<String> {
    let bytes = read_bytes(path, policy)?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
}
