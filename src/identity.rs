//! File identity for binding a validated path to an open handle.
//!
//! On Unix the identity is `(st_dev, st_ino)`. On Windows it is the volume
//! serial number plus the 64-bit file index reported by
//! `GetFileInformationByHandle`.

use std::fs::File;
use std::io;
use std::path::Path;

/// Identity of a filesystem object, stable for as long as it exists.
///
/// Two identities compare equal exactly when they describe the same object,
/// so comparing the identity of an open handle against a fresh link-level
/// stat of its path proves the path still names the opened file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    device: u64,
    inode: u64,
}

impl FileIdentity {
    /// Build an identity from raw parts.
    #[must_use]
    pub fn new(device: u64, inode: u64) -> Self {
        Self { device, inode }
    }

    /// Device (Unix) or volume serial number (Windows).
    #[must_use]
    pub fn device(&self) -> u64 {
        self.device
    }

    /// Inode (Unix) or file index (Windows).
    #[must_use]
    pub fn inode(&self) -> u64 {
        self.inode
    }

    /// Identity from metadata returned by `stat`, `lstat`, or `fstat`.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self::new(meta.dev(), meta.ino())
    }

    /// Identity of an open handle (`fstat`).
    #[cfg(unix)]
    pub fn of_file(file: &File) -> io::Result<Self> {
        Ok(Self::from_metadata(&file.metadata()?))
    }

    /// Identity of the entry at `path` without following a final symlink
    /// (`lstat`).
    #[cfg(unix)]
    pub fn of_path(path: &Path) -> io::Result<Self> {
        Ok(Self::from_metadata(&std::fs::symlink_metadata(path)?))
    }

    /// Identity of an open handle.
    #[cfg(windows)]
    pub fn of_file(file: &File) -> io::Result<Self> {
        use std::os::windows::io::AsRawHandle;
        use windows::Win32::Foundation::HANDLE;
        use windows::Win32::Storage::FileSystem::{
            BY_HANDLE_FILE_INFORMATION, GetFileInformationByHandle,
        };

        let mut info = BY_HANDLE_FILE_INFORMATION::default();
        // SAFETY: the handle is owned by `file` and stays open for the call;
        // `info` is a valid out-pointer.
        unsafe { GetFileInformationByHandle(HANDLE(file.as_raw_handle()), &mut info) }
            .map_err(|_| io::Error::last_os_error())?;
        let index = (u64::from(info.nFileIndexHigh) << 32) | u64::from(info.nFileIndexLow);
        Ok(Self::new(u64::from(info.dwVolumeSerialNumber), index))
    }

    /// Identity of the entry at `path` without following a final reparse
    /// point.
    #[cfg(windows)]
    pub fn of_path(path: &Path) -> io::Result<Self> {
        use std::os::windows::fs::OpenOptionsExt;

        const FILE_FLAG_OPEN_REPARSE_POINT: u32 = 0x0020_0000;
        const FILE_FLAG_BACKUP_SEMANTICS: u32 = 0x0200_0000;

        let handle = std::fs::OpenOptions::new()
            .access_mode(0)
            .custom_flags(FILE_FLAG_OPEN_REPARSE_POINT | FILE_FLAG_BACKUP_SEMANTICS)
            .open(path)?;
        Self::of_file(&handle)
    }
}
