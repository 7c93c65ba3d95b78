//! Single file copy operations.

use crate::error::{Error, Result};
use crate::guard::{CopyTask, parent_of, validate_no_symlink_ancestors};
use crate::identity::FileIdentity;
use crate::policy::PlatformPolicy;
use crate::reader::{open_validated, path_identity};
use crate::writer::{TargetMode, write_atomic_with};
use std::fs::{self, File};
use std::path::Path;

use super::utils::{copy_file_contents, replace_with_symlink};

/// Copy a single file atomically, or recreate a symlink.
///
/// The content goes to a temp file next to `dst` and is renamed over it once
/// synced, so `dst` is either untouched or a complete copy. The destination
/// gets the source's permissions. If `src` is a symlink, the link itself is
/// recreated at `dst` with the same target string.
///
/// The source is opened without following symlinks and its identity is
/// checked after the open and again right before the bytes are copied.
///
/// # Returns
///
/// The number of bytes copied (0 for a recreated symlink).
///
/// # Errors
///
/// - [`Error::ContainmentViolation`] if `dst` is `src`
/// - [`Error::AncestorIsSymlink`] for a symlinked parent on either side
/// - [`Error::PathIsDirectory`] if `src` is a directory
/// - [`Error::UnsupportedFileType`] for a FIFO, socket, or device source
/// - [`Error::IdentityChanged`] if `src` was swapped mid-copy
/// - [`Error::PathIsSymlink`] / [`Error::PathNotRegularFile`] for an
///   unsuitable existing `dst`
///
/// # Example
///
/// ```no_run
/// use safeio::copy_file;
/// use std::path::Path;
///
/// let bytes = copy_file(Path::new("config.toml"), Path::new("backup/config.toml"))?;
/// println!("copied {bytes} bytes");
/// # Ok::<(), safeio::Error>(())
/// ```
pub fn copy_file_with(src: &Path, dst: &Path, policy: &PlatformPolicy) -> Result<u64> {
    let task = CopyTask::new(src, dst)?;
    validate_no_symlink_ancestors(parent_of(&task.src), policy)?;
    validate_no_symlink_ancestors(parent_of(&task.dst), policy)?;
    task.check_containment(policy)?;
    copy_file_task(&task, policy)
}

/// Copy one already-resolved task. Ancestors and containment are checked by
/// the caller.
pub(crate) fn copy_file_task(task: &CopyTask, policy: &PlatformPolicy) -> Result<u64> {
    let src = task.src.as_path();
    let meta = fs::symlink_metadata(src)?;
    let ft = meta.file_type();

    if ft.is_symlink() {
        replace_with_symlink(src, &meta, &task.dst, policy)?;
        return Ok(0);
    }
    if ft.is_dir() {
        return Err(Error::PathIsDirectory(src.to_path_buf()));
    }
    if !ft.is_file() {
        return Err(Error::UnsupportedFileType(src.to_path_buf()));
    }

    let expected = path_identity(src, &meta)?;
    let mode = TargetMode::Exact(meta.permissions());

    let bytes = write_atomic_with(&task.dst, mode, policy, |tmp| {
        stream_validated(src, expected, tmp)
    })?;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        src = %src.display(),
        dst = %task.dst.display(),
        bytes,
        "copied file"
    );

    Ok(bytes)
}

/// Open `src` without following links and stream it into `tmp`, provided it
/// is still the file first seen as `expected`.
fn stream_validated(src: &Path, expected: FileIdentity, tmp: &File) -> Result<u64> {
    let source = open_validated(src)?;
    if source.identity() != expected {
        return Err(Error::IdentityChanged(src.to_path_buf()));
    }
    // Last check before the bytes move.
    source.revalidate(src)?;
    let len = source.metadata().len();
    Ok(copy_file_contents(source.file(), tmp, len)?)
}
