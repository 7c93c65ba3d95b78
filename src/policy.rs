//! Platform behavior for the read, write, and copy primitives.
//!
//! Everything that differs between platforms and is not a raw syscall lives
//! in [`PlatformPolicy`]: whether paths compare case-insensitively, whether a
//! directory can be fsynced, whether rename can replace an existing file,
//! and which OS-managed symlinked ancestors are tolerated.
//!
//! # Example
//!
//! ```
//! use safeio::{PlatformPolicy, SymlinkPolicy};
//!
//! let policy = PlatformPolicy::linux()
//!     .with_symlink_policy(SymlinkPolicy::AllowKnownSystemPath)
//!     .with_system_alias("/srv")
//!     .with_default_file_mode(0o600);
//! assert!(policy.is_system_alias(std::path::Path::new("/srv")));
//! ```

use std::path::{Path, PathBuf};

/// How symlinked ancestor directories are treated.
///
/// # Default
///
/// The default is [`SymlinkPolicy::Reject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SymlinkPolicy {
    /// Any symlinked ancestor is a hard error.
    #[default]
    Reject,
    /// Symlinked ancestors listed in [`PlatformPolicy::system_aliases`] are
    /// resolved once and the walk continues from their target. Any other
    /// symlinked ancestor is still an error.
    AllowKnownSystemPath,
}

/// Platform capabilities and defaults injected into every operation.
///
/// Use [`PlatformPolicy::host()`] (also [`Default`]) for the running
/// platform, or one of the named profiles to exercise another platform's
/// rules.
///
/// # Profiles
///
/// | Field | `linux()` | `macos()` | `windows()` |
/// |-------|-----------|-----------|-------------|
/// | `symlink_policy` | `Reject` | `AllowKnownSystemPath` | `Reject` |
/// | `system_aliases` | none | `/var`, `/tmp`, `/etc` | none |
/// | `case_insensitive` | `false` | `true` | `true` |
/// | `sync_parent_dir` | `true` | `true` | `false` |
/// | `replace_requires_remove` | `false` | `false` | `true` |
///
/// All profiles share `fsync: true`, `default_file_mode: 0o644`,
/// `default_dir_mode: 0o755`, and `max_depth: None`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlatformPolicy {
    /// Treatment of symlinked ancestor directories
    pub symlink_policy: SymlinkPolicy,

    /// Ancestors tolerated under [`SymlinkPolicy::AllowKnownSystemPath`]
    pub system_aliases: Vec<PathBuf>,

    /// Fold case when comparing paths
    pub case_insensitive: bool,

    /// Fsync the parent directory after a rename
    pub sync_parent_dir: bool,

    /// Rename cannot replace an existing destination, so remove it first
    /// and retry once
    pub replace_requires_remove: bool,

    /// Whether to sync data to disk at all (default: true)
    ///
    /// Disabling this keeps atomic visibility but drops the durability
    /// guarantee.
    pub fsync: bool,

    /// Mode for newly created files (Unix permission bits)
    pub default_file_mode: u32,

    /// Mode for directories created while ensuring a parent exists
    pub default_dir_mode: u32,

    /// Maximum directory depth for `copy_dir` (default: None = unlimited)
    pub max_depth: Option<usize>,

    /// Callback for warnings (optional)
    ///
    /// If not set and `tracing` feature is enabled, warnings are logged via tracing.
    /// Otherwise, warnings are silently ignored.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub warn_handler: Option<fn(&str)>,
}

impl Default for PlatformPolicy {
    fn default() -> Self {
        Self::host()
    }
}

impl PlatformPolicy {
    /// Profile for the platform this crate was compiled for.
    #[must_use]
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::windows()
        } else if cfg!(target_os = "macos") {
            Self::macos()
        } else {
            Self::linux()
        }
    }

    /// Linux and other POSIX systems: case-sensitive, directory fsync, and
    /// rename replaces in place.
    #[must_use]
    pub fn linux() -> Self {
        Self {
            symlink_policy: SymlinkPolicy::Reject,
            system_aliases: Vec::new(),
            case_insensitive: false,
            sync_parent_dir: true,
            replace_requires_remove: false,
            fsync: true,
            default_file_mode: 0o644,
            default_dir_mode: 0o755,
            max_depth: None,
            warn_handler: None,
        }
    }

    /// macOS: case-insensitive default volumes, and `/var`, `/tmp`, `/etc`
    /// are symlinks into `/private`.
    #[must_use]
    pub fn macos() -> Self {
        Self {
            symlink_policy: SymlinkPolicy::AllowKnownSystemPath,
            system_aliases: vec![
                PathBuf::from("/var"),
                PathBuf::from("/tmp"),
                PathBuf::from("/etc"),
            ],
            case_insensitive: true,
            ..Self::linux()
        }
    }

    /// Windows: case-insensitive, no directory fsync, and the remove-then-retry
    /// rename fallback.
    #[must_use]
    pub fn windows() -> Self {
        Self {
            case_insensitive: true,
            sync_parent_dir: false,
            replace_requires_remove: true,
            ..Self::linux()
        }
    }

    /// Create a policy with a warning handler
    #[must_use]
    pub fn with_warn_handler(mut self, handler: fn(&str)) -> Self {
        self.warn_handler = Some(handler);
        self
    }

    /// Set the ancestor symlink policy
    #[must_use]
    pub fn with_symlink_policy(mut self, policy: SymlinkPolicy) -> Self {
        self.symlink_policy = policy;
        self
    }

    /// Add a tolerated system alias
    #[must_use]
    pub fn with_system_alias(mut self, alias: impl Into<PathBuf>) -> Self {
        self.system_aliases.push(alias.into());
        self
    }

    /// Remove every tolerated system alias
    #[must_use]
    pub fn without_system_aliases(mut self) -> Self {
        self.system_aliases.clear();
        self
    }

    /// Set case-insensitive path comparison
    #[must_use]
    pub fn with_case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    /// Disable fsync for faster (but less durable) writes
    #[must_use]
    pub fn without_fsync(mut self) -> Self {
        self.fsync = false;
        self
    }

    /// Set the mode for newly created files
    #[must_use]
    pub fn with_default_file_mode(mut self, mode: u32) -> Self {
        self.default_file_mode = mode & 0o7777;
        self
    }

    /// Set the mode for directories created as missing parents
    #[must_use]
    pub fn with_default_dir_mode(mut self, mode: u32) -> Self {
        self.default_dir_mode = mode & 0o7777;
        self
    }

    /// Set maximum directory depth for `copy_dir`
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Whether `path` is a symlinked ancestor this policy lets through.
    ///
    /// Always false under [`SymlinkPolicy::Reject`].
    #[must_use]
    pub fn is_system_alias(&self, path: &Path) -> bool {
        self.symlink_policy == SymlinkPolicy::AllowKnownSystemPath
            && self
                .system_aliases
                .iter()
                .any(|alias| crate::guard::paths_equal(alias, path, self))
    }

    /// Whether the data and parent-directory fsync steps run.
    pub(crate) fn sync_data(&self) -> bool {
        self.fsync
    }

    pub(crate) fn sync_dir(&self) -> bool {
        self.fsync && self.sync_parent_dir
    }

    pub(crate) fn warn(&self, msg: &str) {
        if let Some(handler) = self.warn_handler {
            handler(msg);
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!("{}", msg);
        }
    }
}
