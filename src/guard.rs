//! Path validation: symlinked ancestors, lexical comparison, and copy
//! containment.
//!
//! Nothing in this module creates, modifies, or opens files. The only
//! filesystem access is link-level `stat`, `readlink`, and (for
//! [`canonical`]) symlink resolution.

use crate::error::{Error, Result};
use crate::policy::PlatformPolicy;
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Reject empty and whitespace-only paths.
pub fn check_not_blank(path: &Path) -> Result<()> {
    if path.as_os_str().to_string_lossy().trim().is_empty() {
        return Err(Error::InvalidPath(path.to_path_buf()));
    }
    Ok(())
}

/// Lexically normalize a path.
///
/// Drops `.` components and folds `..` into the preceding normal component.
/// `..` directly under the root is dropped; leading `..` of a relative path
/// is kept. No filesystem access and no symlink resolution. An empty result
/// becomes `.`.
pub fn clean(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Absolute, lexically cleaned form of `path`.
///
/// Relative paths are resolved against the current directory. Symlinks are
/// not resolved, so a symlinked leaf stays a symlink.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    check_not_blank(path)?;
    Ok(clean(&std::path::absolute(path)?))
}

/// Parent directory of an absolute path, or the path itself for the root.
pub(crate) fn parent_of(path: &Path) -> &Path {
    path.parent().unwrap_or(path)
}

/// Symlink-resolved form of `path` that tolerates missing trailing
/// components.
///
/// The deepest existing ancestor is fully canonicalized and the remaining
/// components are appended.
pub fn canonical(path: &Path) -> Result<PathBuf> {
    Ok(soft_canonicalize::soft_canonicalize(path)?)
}

/// Verify that neither `dir` nor any of its ancestors is a symlink.
///
/// Walks from `dir` up to the filesystem root using link-level stat.
/// Missing levels are tolerated (a later `create_dir_all` will create them).
/// A symlink fails with [`Error::AncestorIsSymlink`] unless `policy` lists it
/// as a system alias, in which case the link is resolved once and the walk
/// continues from its target.
///
/// # Errors
///
/// - [`Error::AncestorIsSymlink`] for a symlink that is not allowlisted
/// - [`Error::SymlinkLoopDetected`] if the walk revisits a path
/// - [`Error::Io`] for stat errors other than "not found"
pub fn validate_no_symlink_ancestors(dir: &Path, policy: &PlatformPolicy) -> Result<()> {
    let mut current = absolute(dir)?;
    let mut visited: HashSet<PathBuf> = HashSet::new();

    loop {
        if !visited.insert(current.clone()) {
            return Err(Error::SymlinkLoopDetected(current));
        }

        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                if !policy.is_system_alias(&current) {
                    return Err(Error::AncestorIsSymlink(current));
                }
                let target = fs::read_link(&current)?;
                let resolved = clean(&parent_of(&current).join(target));
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    alias = %current.display(),
                    target = %resolved.display(),
                    "following allowlisted system alias"
                );
                current = resolved;
                continue;
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return Ok(()),
        }
    }
}

/// Comparison key for one path: cleaned components, case-folded when the
/// policy says so. `.` components are dropped.
fn comparison_key(path: &Path, policy: &PlatformPolicy) -> Vec<OsString> {
    clean(path)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| fold(c.as_os_str(), policy.case_insensitive))
        .collect()
}

fn fold(part: &OsStr, case_insensitive: bool) -> OsString {
    match part.to_str() {
        Some(s) if case_insensitive => OsString::from(s.to_lowercase()),
        _ => part.to_os_string(),
    }
}

/// Whether `a` and `b` name the same location after lexical cleaning.
pub fn paths_equal(a: &Path, b: &Path, policy: &PlatformPolicy) -> bool {
    comparison_key(a, policy) == comparison_key(b, policy)
}

/// Whether `child` is `parent` or lies beneath it, lexically.
///
/// Equivalent to computing the relative path from `parent` to `child` and
/// accepting it iff it is `.` or does not start with `..`.
pub fn path_within(child: &Path, parent: &Path, policy: &PlatformPolicy) -> bool {
    let child = comparison_key(child, policy);
    let parent = comparison_key(parent, policy);
    child.starts_with(&parent)
        && !child[parent.len()..]
            .iter()
            .any(|part| part.as_os_str() == Component::ParentDir.as_os_str())
}

/// Canonical form of the directory holding `path`, with the final component
/// appended as is.
fn canonical_entry(path: &Path) -> Result<PathBuf> {
    let parent = canonical(parent_of(path))?;
    Ok(match path.file_name() {
        Some(name) => parent.join(name),
        None => parent,
    })
}

/// One copy step: source and destination in raw absolute and canonical form.
///
/// Raw forms keep symlinked components as they are; canonical forms have
/// every existing symlinked ancestor resolved. `src_resolved` also follows a
/// symlinked source to its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTask {
    /// Absolute, lexically cleaned source
    pub src: PathBuf,
    /// Absolute, lexically cleaned destination
    pub dst: PathBuf,
    /// Source with its ancestors symlink-resolved
    pub src_canonical: PathBuf,
    /// Source with every symlink resolved, the final component included
    pub src_resolved: PathBuf,
    /// Destination with its ancestors symlink-resolved (missing tail appended
    /// verbatim)
    pub dst_canonical: PathBuf,
}

impl CopyTask {
    /// Resolve both endpoints.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPath`] for blank input, [`Error::Io`] if either side
    /// cannot be made absolute or canonicalized.
    pub fn new(src: &Path, dst: &Path) -> Result<Self> {
        let src = absolute(src)?;
        let dst = absolute(dst)?;
        let src_canonical = canonical_entry(&src)?;
        let dst_canonical = canonical_entry(&dst)?;
        // A link cycle has no resolved form; the leaf-kept view stands in.
        let src_resolved = canonical(&src).unwrap_or_else(|_| src_canonical.clone());
        Ok(Self {
            src,
            dst,
            src_canonical,
            src_resolved,
            dst_canonical,
        })
    }

    /// Task for an entry named `name` inside this task's directories.
    pub(crate) fn child(&self, name: &OsStr) -> Self {
        Self {
            src: self.src.join(name),
            dst: self.dst.join(name),
            src_canonical: self.src_canonical.join(name),
            src_resolved: self.src_resolved.join(name),
            dst_canonical: self.dst_canonical.join(name),
        }
    }

    /// Reject a destination equal to or inside the source.
    ///
    /// The raw, canonical, and fully resolved views are all checked. A
    /// symlink can make any one of them look safe on its own; a source that
    /// is a link to `d` contains `d` and everything under it.
    ///
    /// # Errors
    ///
    /// [`Error::ContainmentViolation`] if any view places `dst` within
    /// `src`.
    pub fn check_containment(&self, policy: &PlatformPolicy) -> Result<()> {
        if path_within(&self.dst, &self.src, policy)
            || path_within(&self.dst_canonical, &self.src_canonical, policy)
            || path_within(&self.dst_canonical, &self.src_resolved, policy)
        {
            return Err(Error::ContainmentViolation {
                src: self.src.clone(),
                dst: self.dst.clone(),
            });
        }
        Ok(())
    }
}
