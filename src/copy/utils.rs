//! Utility functions for file copy operations.
//!
//! This module contains helper functions used by the file and directory
//! copy operations: content copying and symlink recreation.

use crate::error::Result;
use crate::guard::{parent_of, validate_no_symlink_ancestors};
use crate::policy::PlatformPolicy;
use crate::temp::{Occupant, TempArtifact};
use crate::writer::create_dir_all;
use std::fs::{self, File, Metadata};
use std::io;
use std::path::Path;

// =============================================================================
// File content copying
// =============================================================================

/// Efficiently copy file contents using the best available method.
///
/// On Linux 4.5+, uses `copy_file_range` for zero-copy kernel-to-kernel transfer.
/// Falls back to `std::io::copy` on other platforms or on error.
pub(crate) fn copy_file_contents(src: &File, dst: &File, len: u64) -> io::Result<u64> {
    #[cfg(target_os = "linux")]
    {
        copy_file_range_all(src, dst, len)
    }
    #[cfg(not(target_os = "linux"))]
    {
        use std::io::BufReader;
        let _ = len; // unused on non-Linux
        io::copy(&mut BufReader::new(src), &mut &*dst)
    }
}

/// Linux-specific: copy using copy_file_range(2) syscall.
///
/// Data never enters userspace. Falls back to io::copy if copy_file_range
/// fails before the first byte (e.g., cross-filesystem).
#[cfg(target_os = "linux")]
fn copy_file_range_all(src: &File, dst: &File, len: u64) -> io::Result<u64> {
    use std::os::unix::io::AsRawFd;

    let src_fd = src.as_raw_fd();
    let dst_fd = dst.as_raw_fd();
    let mut remaining = len;
    let mut copied: u64 = 0;

    while remaining > 0 {
        let chunk_size = remaining.min(128 * 1024 * 1024) as usize; // 128MB chunks

        // SAFETY: We're passing valid file descriptors and null offsets (use current position)
        let result = unsafe {
            libc::copy_file_range(
                src_fd,
                std::ptr::null_mut(),
                dst_fd,
                std::ptr::null_mut(),
                chunk_size,
                0,
            )
        };

        if result < 0 {
            let err = io::Error::last_os_error();
            // EXDEV: cross-device, ENOSYS: not supported, EINVAL: fs doesn't support it
            if copied == 0
                && matches!(
                    err.raw_os_error(),
                    Some(libc::EXDEV)
                        | Some(libc::ENOSYS)
                        | Some(libc::EINVAL)
                        | Some(libc::EOPNOTSUPP)
                )
            {
                use std::io::BufReader;
                return io::copy(&mut BufReader::new(src), &mut &*dst);
            }
            return Err(err);
        }

        if result == 0 {
            // EOF reached (file was truncated after validation)
            break;
        }

        let bytes_copied = result as u64;
        copied += bytes_copied;
        remaining = remaining.saturating_sub(bytes_copied);
    }

    Ok(copied)
}

// =============================================================================
// Symlink utilities
// =============================================================================

/// Whether a symlink should be recreated as a directory link (Windows only
/// distinguishes the two).
#[cfg(windows)]
fn link_is_dir(meta: &Metadata) -> bool {
    use std::os::windows::fs::FileTypeExt;
    meta.file_type().is_symlink_dir()
}

#[cfg(not(windows))]
fn link_is_dir(_meta: &Metadata) -> bool {
    false
}

/// Recreate the symlink at `src_link` at `dst` with the same target string.
///
/// Whatever occupies `dst` is replaced: a directory is removed first, any
/// other entry is swapped out atomically by renaming a temp link over it.
pub(crate) fn replace_with_symlink(
    src_link: &Path,
    src_meta: &Metadata,
    dst: &Path,
    policy: &PlatformPolicy,
) -> Result<()> {
    let target = fs::read_link(src_link)?;
    let parent = parent_of(dst);
    validate_no_symlink_ancestors(parent, policy)?;

    match fs::symlink_metadata(dst) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(dst)?,
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    create_dir_all(parent, policy)?;
    validate_no_symlink_ancestors(parent, policy)?;

    let artifact = TempArtifact::symlink_for(dst, &target, link_is_dir(src_meta))?;
    artifact.commit_over(Occupant::AnyEntry, policy)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        link = %dst.display(),
        target = %target.display(),
        "recreated symlink"
    );

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
