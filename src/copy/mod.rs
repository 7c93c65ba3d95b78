//! Core copy operations.
//!
//! This module copies files and directory trees with the same guarantees as
//! the writer: atomic replacement, symlink-safe ancestors, and source
//! identity checks between validation and use.

mod dir;
mod file;
mod utils;
mod walk;

// Re-export public API
pub use dir::{CopyStats, copy_dir_with};
pub use file::copy_file_with;
