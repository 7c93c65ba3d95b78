//! Directory copy operations.
//!
//! This module copies a directory tree with symlink preservation and the
//! same per-file guarantees as [`copy_file_with`](super::copy_file_with).

use crate::error::{Error, Result};
use crate::guard::{CopyTask, parent_of, validate_no_symlink_ancestors};
use crate::identity::FileIdentity;
use crate::policy::PlatformPolicy;
use crate::writer::create_dir_all;
use std::collections::HashSet;
use std::fs::{self, Permissions};
use std::io;
use std::path::Path;
use std::time::Instant;

use super::file::copy_file_with;
use super::utils::replace_with_symlink;
use super::walk::{EntryKind, PinnedDir};

/// Statistics from a copy operation.
///
/// Returned by [`copy_dir`](crate::copy_dir) to report what was copied.
///
/// # Example
///
/// ```no_run
/// use safeio::copy_dir;
/// use std::path::Path;
///
/// let stats = copy_dir(Path::new("src"), Path::new("dst"))?;
/// println!("Copied {} files ({} bytes)", stats.files_copied, stats.bytes_copied);
/// # Ok::<(), safeio::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyStats {
    /// Number of regular files copied
    pub files_copied: u64,
    /// Number of symlinks recreated
    pub symlinks_copied: u64,
    /// Number of directories created (existing ones are not counted)
    pub dirs_created: u64,
    /// Total bytes copied
    pub bytes_copied: u64,
    /// Duration of the copy operation
    pub duration: std::time::Duration,
}

/// A source directory and the permissions its copy must end up with.
#[derive(Debug)]
struct PlannedDir {
    task: CopyTask,
    permissions: Permissions,
}

/// Everything a copy will touch, collected before anything is written.
#[derive(Debug, Default)]
struct Plan {
    /// Directories in pre-order, so parents come before children
    dirs: Vec<PlannedDir>,
    files: Vec<CopyTask>,
    symlinks: Vec<CopyTask>,
}

/// Copy a directory tree.
///
/// # Strategy
///
/// 1. Plan: walk the source with an explicit worklist, pinning each
///    directory while it is listed. Entries are visited in lexical order.
///    An unsupported entry (FIFO, socket, device) aborts here, before
///    anything is written.
/// 2. Create the destination directories.
/// 3. Copy regular files, each one re-validated from scratch.
/// 4. Recreate symlinks with their original target strings.
/// 5. Apply the exact source permissions to each directory, deepest first.
///
/// Directories stay owner-writable until step 5 so a read-only source
/// directory can still be populated, and so copying again into an existing
/// tree works.
///
/// If `src` is itself a symlink, the link is recreated at `dst` instead.
///
/// # Errors
///
/// - [`Error::ContainmentViolation`] if `dst` is `src` or inside it
/// - [`Error::AncestorIsSymlink`] for a symlinked ancestor on either side
/// - [`Error::PathIsSymlink`] / [`Error::NotADirectory`] if `dst` exists
///   and is not a real directory
/// - [`Error::NotADirectory`] if `src` is not a directory
/// - [`Error::UnsupportedFileType`] for a FIFO, socket, or device entry
/// - [`Error::IdentityChanged`] if a directory was swapped while listed
/// - [`Error::MaxDepthExceeded`] if the policy's depth limit is hit
/// - [`Error::SymlinkLoopDetected`] if a directory is reached twice (bind
///   mounts)
pub fn copy_dir_with(src: &Path, dst: &Path, policy: &PlatformPolicy) -> Result<CopyStats> {
    let start_time = Instant::now();

    let root = CopyTask::new(src, dst)?;
    validate_no_symlink_ancestors(parent_of(&root.src), policy)?;
    validate_no_symlink_ancestors(parent_of(&root.dst), policy)?;
    root.check_containment(policy)?;
    check_dst_root(&root.dst)?;

    let src_meta = fs::symlink_metadata(&root.src)?;
    if src_meta.file_type().is_symlink() {
        replace_with_symlink(&root.src, &src_meta, &root.dst, policy)?;
        return Ok(CopyStats {
            symlinks_copied: 1,
            duration: start_time.elapsed(),
            ..CopyStats::default()
        });
    }

    // Phase 1: Plan the whole tree; nothing is written yet
    let plan = plan_tree(root, policy)?;

    // Phase 2: Create directory structure (pre-order, parents first)
    let mut dirs_created = 0u64;
    for dir in &plan.dirs {
        if prepare_dir(&dir.task.dst, &dir.permissions, policy)? {
            dirs_created += 1;
        }
    }

    // Phase 3: Copy files
    let mut files_copied = 0u64;
    let mut bytes_copied = 0u64;
    for task in &plan.files {
        bytes_copied += copy_file_with(&task.src, &task.dst, policy)?;
        files_copied += 1;
    }

    // Phase 4: Recreate symlinks
    let mut symlinks_copied = 0u64;
    for task in &plan.symlinks {
        copy_file_with(&task.src, &task.dst, policy)?;
        symlinks_copied += 1;
    }

    // Phase 5: Exact directory permissions, children before parents
    for dir in plan.dirs.iter().rev() {
        PinnedDir::open(&dir.task.dst)?.set_permissions(dir.permissions.clone())?;
    }

    let stats = CopyStats {
        files_copied,
        symlinks_copied,
        dirs_created,
        bytes_copied,
        duration: start_time.elapsed(),
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(
        files = stats.files_copied,
        symlinks = stats.symlinks_copied,
        dirs = stats.dirs_created,
        bytes = stats.bytes_copied,
        "directory copy complete"
    );

    Ok(stats)
}

/// An existing destination root must be a real directory.
fn check_dst_root(dst: &Path) -> Result<()> {
    match fs::symlink_metadata(dst) {
        Ok(meta) if meta.file_type().is_symlink() => Err(Error::PathIsSymlink(dst.to_path_buf())),
        Ok(meta) if !meta.is_dir() => Err(Error::NotADirectory(dst.to_path_buf())),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Walk the source tree without recursion and classify every entry.
fn plan_tree(root: CopyTask, policy: &PlatformPolicy) -> Result<Plan> {
    let mut plan = Plan::default();
    let mut visited: HashSet<FileIdentity> = HashSet::new();
    let mut worklist: Vec<(CopyTask, usize)> = vec![(root, 0)];

    while let Some((task, depth)) = worklist.pop() {
        if let Some(max_depth) = policy.max_depth {
            if depth > max_depth {
                return Err(Error::MaxDepthExceeded {
                    path: task.src,
                    max_depth,
                });
            }
        }

        let pinned = PinnedDir::open(&task.src)?;
        if !visited.insert(pinned.identity()) {
            return Err(Error::SymlinkLoopDetected(task.src));
        }
        let permissions = pinned.permissions()?;

        let mut subdirs = Vec::new();
        for entry in pinned.entries()? {
            let child = task.child(&entry.name);
            match entry.kind {
                EntryKind::File => plan.files.push(child),
                EntryKind::Symlink => plan.symlinks.push(child),
                EntryKind::Dir => subdirs.push(child),
                EntryKind::Other => return Err(Error::UnsupportedFileType(child.src)),
            }
        }

        plan.dirs.push(PlannedDir { task, permissions });
        // Reversed so the stack pops them in lexical order.
        worklist.extend(subdirs.into_iter().rev().map(|child| (child, depth + 1)));
    }

    Ok(plan)
}

/// Make sure `dst` is a real, owner-writable directory. Returns whether it
/// was created.
fn prepare_dir(dst: &Path, permissions: &Permissions, policy: &PlatformPolicy) -> Result<bool> {
    let parent = parent_of(dst);
    validate_no_symlink_ancestors(parent, policy)?;

    let created = match fs::symlink_metadata(dst) {
        Ok(meta) if meta.file_type().is_symlink() => {
            return Err(Error::PathIsSymlink(dst.to_path_buf()));
        }
        Ok(meta) if !meta.is_dir() => return Err(Error::NotADirectory(dst.to_path_buf())),
        Ok(_) => false,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            create_dir_all(parent, policy)?;
            validate_no_symlink_ancestors(parent, policy)?;
            create_dir(dst, permissions)?;
            true
        }
        Err(e) => return Err(e.into()),
    };

    PinnedDir::open(dst)?.set_permissions(staging_permissions(permissions))?;
    Ok(created)
}

#[cfg(unix)]
fn create_dir(dst: &Path, permissions: &Permissions) -> io::Result<()> {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
    fs::DirBuilder::new()
        .mode(staging_permissions(permissions).mode())
        .create(dst)
}

#[cfg(not(unix))]
fn create_dir(dst: &Path, _permissions: &Permissions) -> io::Result<()> {
    fs::create_dir(dst)
}

/// Source permissions plus owner `rwx`, used while the tree is populated.
#[cfg(unix)]
fn staging_permissions(permissions: &Permissions) -> Permissions {
    use std::os::unix::fs::PermissionsExt;
    Permissions::from_mode((permissions.mode() & 0o7777) | 0o700)
}

#[cfg(not(unix))]
fn staging_permissions(permissions: &Permissions) -> Permissions {
    let mut staging = permissions.clone();
    #[allow(clippy::permissions_set_readonly_false)]
    staging.set_readonly(false);
    staging
}
