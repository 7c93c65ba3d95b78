//! Atomic, durable replacement of a file's content.
//!
//! The payload goes to a [`TempArtifact`] in the target's directory, is
//! synced, and is renamed over the target in one step. Observers see the old
//! complete file or the new complete file, never a mix.

use crate::error::{Error, Result};
use crate::guard::{absolute, parent_of, validate_no_symlink_ancestors};
use crate::policy::PlatformPolicy;
use crate::reader::require_regular_file;
use crate::temp::TempArtifact;
use std::fs::{self, File, Permissions};
use std::io::{self, Write};
use std::path::Path;

/// Where the final permissions of a written file come from.
#[derive(Debug, Clone)]
pub(crate) enum TargetMode {
    /// Keep the existing file's permissions, or use the policy default for a
    /// new file
    Preserve,
    /// Use these permissions (copying a source file's mode)
    Exact(Permissions),
}

/// Write `payload` to `path` atomically.
pub(crate) fn write_atomic(path: &Path, payload: &[u8], policy: &PlatformPolicy) -> Result<()> {
    write_atomic_with(path, TargetMode::Preserve, policy, |file| {
        file.write_all(payload)?;
        Ok(payload.len() as u64)
    })
    .map(|_| ())
}

/// The shared write protocol; `fill` writes the payload into the temp file
/// and returns the number of bytes written.
///
/// 1. Reject a blank path.
/// 2. Check the parent's ancestors for symlinks.
/// 3. Require an existing target to be a regular file and pick the mode.
/// 4. Create the parent directories, then re-check ancestors.
/// 5. Create the temp file next to the target.
/// 6. Fill, flush, set the mode, and sync the temp file.
/// 7. Re-check ancestors once more.
/// 8. Rename over the target (with the remove-and-retry fallback).
/// 9. Sync the parent directory.
/// 10. Any failure in 5-9 removes the temp file first.
pub(crate) fn write_atomic_with<F>(
    path: &Path,
    mode: TargetMode,
    policy: &PlatformPolicy,
    fill: F,
) -> Result<u64>
where
    F: FnOnce(&mut File) -> Result<u64>,
{
    let path = absolute(path)?;
    if path.file_name().is_none() {
        return Err(Error::InvalidPath(path));
    }
    let parent = parent_of(&path);
    validate_no_symlink_ancestors(parent, policy)?;

    let permissions = match mode {
        TargetMode::Exact(perms) => {
            check_existing_target(&path)?;
            Some(perms)
        }
        TargetMode::Preserve => match check_existing_target(&path)? {
            Some(perms) => Some(perms),
            None => default_permissions(policy),
        },
    };

    create_dir_all(parent, policy)?;
    validate_no_symlink_ancestors(parent, policy)?;

    let mut artifact = TempArtifact::create_for(&path)?;
    let written = match fill_artifact(&mut artifact, permissions, policy, fill) {
        Ok(written) => written,
        Err(e) => return Err(artifact.fail(e)),
    };

    if let Err(e) = validate_no_symlink_ancestors(parent, policy) {
        return Err(artifact.fail(e));
    }
    artifact.commit(policy)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(path = %path.display(), bytes = written, "atomic write complete");

    Ok(written)
}

/// Permissions of an existing target, which must be a regular file, or
/// `None` if there is no target yet.
fn check_existing_target(path: &Path) -> Result<Option<Permissions>> {
    match fs::symlink_metadata(path) {
        Ok(meta) => {
            require_regular_file(path, &meta)?;
            Ok(Some(meta.permissions()))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn fill_artifact<F>(
    artifact: &mut TempArtifact,
    permissions: Option<Permissions>,
    policy: &PlatformPolicy,
    fill: F,
) -> Result<u64>
where
    F: FnOnce(&mut File) -> Result<u64>,
{
    let file = artifact.as_file_mut();
    let written = fill(file)?;
    file.flush()?;
    // Mode before sync, so the fsync covers it.
    if let Some(perms) = permissions {
        file.set_permissions(perms)?;
    }
    if policy.sync_data() {
        file.sync_all()?;
    }
    Ok(written)
}

#[cfg(unix)]
fn default_permissions(policy: &PlatformPolicy) -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(policy.default_file_mode))
}

#[cfg(not(unix))]
fn default_permissions(_policy: &PlatformPolicy) -> Option<Permissions> {
    None
}

/// `mkdir -p` with the policy's directory mode.
#[cfg(unix)]
pub(crate) fn create_dir_all(dir: &Path, policy: &PlatformPolicy) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(policy.default_dir_mode)
        .create(dir)
}

#[cfg(not(unix))]
pub(crate) fn create_dir_all(dir: &Path, _policy: &PlatformPolicy) -> io::Result<()> {
    fs::create_dir_all(dir)
}
