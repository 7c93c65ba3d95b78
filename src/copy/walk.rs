//! Directory enumeration through a pinned handle.
//!
//! A [`PinnedDir`] holds the directory open for as long as it is listed and
//! proves, before and after, that the path still names that same directory.
//! On Unix the entries are read and classified relative to the handle
//! (`fdopendir` + `fstatat`), so a directory renamed or replaced mid-listing
//! can't feed entries from somewhere else.

use crate::error::{Error, Result};
use crate::identity::FileIdentity;
use crate::reader::path_identity;
use std::ffi::OsString;
use std::fs::{self, File, Permissions};
use std::io;
use std::path::{Path, PathBuf};

/// Link-level type of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    File,
    Dir,
    Symlink,
    /// FIFO, socket, device, or anything else
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    pub name: OsString,
    pub kind: EntryKind,
}

/// An open directory bound to its path by identity.
#[derive(Debug)]
pub(crate) struct PinnedDir {
    file: File,
    path: PathBuf,
    identity: FileIdentity,
}

impl PinnedDir {
    /// Open `path`, which must be a real directory (not a symlink to one).
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let before = fs::symlink_metadata(path)?;
        if before.file_type().is_symlink() {
            return Err(Error::PathIsSymlink(path.to_path_buf()));
        }
        if !before.is_dir() {
            return Err(Error::NotADirectory(path.to_path_buf()));
        }
        let expected = path_identity(path, &before)?;

        let file = open_dir_no_follow(path)?;
        let identity = FileIdentity::of_file(&file)?;
        if identity != expected {
            return Err(Error::IdentityChanged(path.to_path_buf()));
        }

        let pinned = Self {
            file,
            path: path.to_path_buf(),
            identity,
        };
        pinned.verify()?;
        Ok(pinned)
    }

    /// Check that the path still names the pinned directory.
    pub(crate) fn verify(&self) -> Result<()> {
        let meta = match fs::symlink_metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::IdentityChanged(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        if meta.file_type().is_symlink() {
            return Err(Error::PathIsSymlink(self.path.clone()));
        }
        if path_identity(&self.path, &meta)? != self.identity {
            return Err(Error::IdentityChanged(self.path.clone()));
        }
        Ok(())
    }

    pub(crate) fn identity(&self) -> FileIdentity {
        self.identity
    }

    /// Permissions of the pinned directory.
    pub(crate) fn permissions(&self) -> io::Result<Permissions> {
        Ok(self.file.metadata()?.permissions())
    }

    /// Set permissions on the pinned directory itself.
    #[cfg(unix)]
    pub(crate) fn set_permissions(&self, perms: Permissions) -> io::Result<()> {
        self.file.set_permissions(perms)
    }

    #[cfg(not(unix))]
    pub(crate) fn set_permissions(&self, perms: Permissions) -> io::Result<()> {
        fs::set_permissions(&self.path, perms)
    }

    /// List entries in lexical (byte-wise) order, then re-verify the pin.
    pub(crate) fn entries(&self) -> Result<Vec<Entry>> {
        let mut entries = self.read_entries()?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        self.verify()?;
        Ok(entries)
    }

    #[cfg(unix)]
    fn read_entries(&self) -> Result<Vec<Entry>> {
        use rustix::fs::{AtFlags, Dir, FileType, statat};
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = Dir::read_from(&self.file).map_err(io::Error::from)?;
        let mut entries = Vec::new();
        for entry in dir {
            let entry = entry.map_err(io::Error::from)?;
            let name = OsStr::from_bytes(entry.file_name().to_bytes());
            if name == "." || name == ".." {
                continue;
            }
            let stat = statat(&self.file, name, AtFlags::SYMLINK_NOFOLLOW)
                .map_err(io::Error::from)?;
            let kind = match FileType::from_raw_mode(stat.st_mode as _) {
                FileType::RegularFile => EntryKind::File,
                FileType::Directory => EntryKind::Dir,
                FileType::Symlink => EntryKind::Symlink,
                _ => EntryKind::Other,
            };
            entries.push(Entry {
                name: name.to_os_string(),
                kind,
            });
        }
        Ok(entries)
    }

    #[cfg(not(unix))]
    fn read_entries(&self) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            // DirEntry::file_type does not follow symlinks.
            let ft = entry.file_type()?;
            let kind = if ft.is_symlink() {
                EntryKind::Symlink
            } else if ft.is_dir() {
                EntryKind::Dir
            } else if ft.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };
            entries.push(Entry {
                name: entry.file_name(),
                kind,
            });
        }
        Ok(entries)
    }
}

#[cfg(unix)]
fn open_dir_no_follow(path: &Path) -> Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_DIRECTORY | libc::O_NOFOLLOW | libc::O_CLOEXEC)
        .open(path)
        .map_err(|e| match e.raw_os_error() {
            Some(libc::ELOOP) => Error::PathIsSymlink(path.to_path_buf()),
            Some(libc::ENOTDIR) => Error::NotADirectory(path.to_path_buf()),
            _ => e.into(),
        })
}

#[cfg(windows)]
fn open_dir_no_follow(path: &Path) -> Result<File> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_FLAG_OPEN_REPARSE_POINT: u32 = 0x0020_0000;
    const FILE_FLAG_BACKUP_SEMANTICS: u32 = 0x0200_0000;
    Ok(fs::OpenOptions::new()
        .read(true)
        .custom_flags(FILE_FLAG_OPEN_REPARSE_POINT | FILE_FLAG_BACKUP_SEMANTICS)
        .open(path)?)
}
