//! Windows file attribute handling for the overwrite fallback.
//!
//! `MoveFileExW` refuses to replace a destination carrying
//! `FILE_ATTRIBUTE_READONLY`, and `DeleteFileW` refuses to remove one. The
//! fallback clears the read-only bit before removing the old destination.

use std::io;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;

use windows::Win32::Storage::FileSystem::{
    FILE_ATTRIBUTE_NORMAL, FILE_ATTRIBUTE_READONLY, FILE_FLAGS_AND_ATTRIBUTES, GetFileAttributesW,
    SetFileAttributesW,
};

// INVALID_FILE_ATTRIBUTES is ((DWORD)-1); the `windows` crate doesn't export it.
const INVALID_FILE_ATTRIBUTES: u32 = u32::MAX;

#[inline]
fn path_to_wide(path: &Path) -> Vec<u16> {
    path.as_os_str().encode_wide().chain(Some(0)).collect()
}

/// Raw attribute bits of `path`.
pub(crate) fn get_attributes(path: &Path) -> io::Result<u32> {
    let wide = path_to_wide(path);
    // SAFETY: We're passing a valid null-terminated wide string
    let attrs = unsafe { GetFileAttributesW(windows::core::PCWSTR(wide.as_ptr())) };
    if attrs == INVALID_FILE_ATTRIBUTES {
        Err(io::Error::last_os_error())
    } else {
        Ok(attrs)
    }
}

/// Clear `FILE_ATTRIBUTE_READONLY`, keeping every other bit.
pub(crate) fn clear_readonly(path: &Path) -> io::Result<()> {
    let attrs = get_attributes(path)?;
    if attrs & FILE_ATTRIBUTE_READONLY.0 == 0 {
        return Ok(());
    }

    // Windows requires at least one attribute bit set
    let cleared = attrs & !FILE_ATTRIBUTE_READONLY.0;
    let new_attrs = if cleared == 0 {
        FILE_ATTRIBUTE_NORMAL.0
    } else {
        cleared
    };

    let wide = path_to_wide(path);
    // SAFETY: We're passing a valid null-terminated wide string
    let result = unsafe {
        SetFileAttributesW(
            windows::core::PCWSTR(wide.as_ptr()),
            FILE_FLAGS_AND_ATTRIBUTES(new_attrs),
        )
    };
    result.map_err(|_| io::Error::last_os_error())
}
