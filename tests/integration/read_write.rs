//! Read and write integration tests.
//!
//! These tests exercise the public entry points end to end:
//! - Round trips for text and binary payloads
//! - Mode preservation on overwrite and defaults for new files
//! - Rejection of symlinks, directories, and special files
//! - Ancestor symlink checks and the system alias allowlist

#[path = "../common/mod.rs"]
mod common;

use common::temp_leftovers;
use rstest::rstest;
use safeio::{
    ErrorKind, PlatformPolicy, SafeIo, file_exists, file_read, file_read_bytes, file_write,
    file_write_bytes,
};
use std::fs;
use tempfile::TempDir;

#[rstest]
#[case::empty("")]
#[case::ascii("hello world")]
#[case::multiline("line one\nline two\r\nline three\n")]
#[case::unicode("日本語 テキスト ✓")]
fn test_text_round_trip(#[case] content: &str) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("file.txt");

    file_write(&path, content).unwrap();

    assert_eq!(file_read(&path).unwrap(), content);
    assert!(temp_leftovers(dir.path()).is_empty());
}

#[test]
fn test_binary_round_trip_with_nul_bytes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("blob.bin");
    let payload: Vec<u8> = (0..=255u8).chain([0, 0, 0]).collect();

    file_write_bytes(&path, &payload).unwrap();

    assert_eq!(file_read_bytes(&path).unwrap(), payload);
}

#[test]
fn test_large_write_replaces_whole_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("large.bin");
    let big = vec![0xAB; 4 * 1024 * 1024];

    file_write_bytes(&path, &big).unwrap();
    file_write_bytes(&path, b"tiny").unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"tiny");
}

#[test]
fn test_write_creates_parents() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("x").join("y").join("z.txt");

    file_write(&path, "deep").unwrap();

    assert!(file_exists(&path));
    assert_eq!(file_read(&path).unwrap(), "deep");
}

#[test]
fn test_relative_path_with_dot_components() {
    let dir = TempDir::new().unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    let messy = sub.join("..").join("sub").join(".").join("file.txt");

    file_write(&messy, "clean").unwrap();

    assert_eq!(fs::read_to_string(sub.join("file.txt")).unwrap(), "clean");
}

#[test]
fn test_read_directory_rejected() {
    let dir = TempDir::new().unwrap();
    assert_eq!(
        file_read(dir.path()).unwrap_err().kind(),
        ErrorKind::PathIsDirectory
    );
}

#[test]
fn test_write_onto_directory_rejected() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("dir");
    fs::create_dir(&target).unwrap();

    let err = file_write(&target, "x").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PathIsDirectory);
    assert!(target.is_dir());
}

#[test]
fn test_read_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = file_read(dir.path().join("missing.txt")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_invalid_utf8_is_io_error_but_bytes_work() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("latin1.txt");
    fs::write(&path, [0x63, 0x61, 0x66, 0xe9]).unwrap();

    assert_eq!(file_read(&path).unwrap_err().kind(), ErrorKind::Io);
    assert_eq!(file_read_bytes(&path).unwrap(), vec![0x63, 0x61, 0x66, 0xe9]);
}

#[test]
fn test_no_fsync_policy_still_atomic() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scratch.txt");
    let io = SafeIo::new().no_fsync();

    io.write(&path, "one").unwrap();
    io.write(&path, "two").unwrap();

    assert_eq!(io.read(&path).unwrap(), "two");
    assert!(temp_leftovers(dir.path()).is_empty());
}

#[cfg(unix)]
mod unix_tests {
    use super::*;
    use common::{mkfifo, mode_of};
    use safeio::SymlinkPolicy;
    use std::os::unix::fs::{PermissionsExt, symlink};

    #[test]
    fn test_overwrite_keeps_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        file_write(&path, "new").unwrap();

        assert_eq!(mode_of(&path), 0o640);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_new_file_gets_default_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh");

        file_write(&path, "x").unwrap();

        assert_eq!(mode_of(&path), 0o644);
    }

    #[test]
    fn test_overwrite_replaces_inode() {
        use std::os::unix::fs::MetadataExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file");
        fs::write(&path, "old").unwrap();
        let before = fs::metadata(&path).unwrap().ino();

        file_write(&path, "new").unwrap();

        // Rename-based replacement, never an in-place truncate
        assert_ne!(fs::metadata(&path).unwrap().ino(), before);
    }

    #[test]
    fn test_read_symlink_rejected() {
        let dir = TempDir::new().unwrap();
        let secret = dir.path().join("secret");
        fs::write(&secret, "password").unwrap();
        let link = dir.path().join("innocent.txt");
        symlink(&secret, &link).unwrap();

        assert_eq!(
            file_read(&link).unwrap_err().kind(),
            ErrorKind::PathIsSymlink
        );
        assert!(!file_exists(&link));
    }

    #[test]
    fn test_write_through_symlink_rejected() {
        let dir = TempDir::new().unwrap();
        let victim = dir.path().join("victim");
        fs::write(&victim, "original").unwrap();
        let link = dir.path().join("link");
        symlink(&victim, &link).unwrap();

        let err = file_write(&link, "overwritten").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PathIsSymlink);
        assert_eq!(fs::read_to_string(&victim).unwrap(), "original");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    }

    #[test]
    fn test_symlinked_ancestor_rejected_for_read_and_write() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("real");
        fs::create_dir_all(real.join("inner")).unwrap();
        fs::write(real.join("inner").join("data"), "data").unwrap();
        let link = dir.path().join("link");
        symlink(&real, &link).unwrap();

        let read = file_read(link.join("inner").join("data"));
        assert_eq!(read.unwrap_err().kind(), ErrorKind::AncestorIsSymlink);

        let write = file_write(link.join("inner").join("new"), "x");
        assert_eq!(write.unwrap_err().kind(), ErrorKind::AncestorIsSymlink);
        assert!(!real.join("inner").join("new").exists());
    }

    #[test]
    fn test_allowlisted_alias_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("real");
        fs::create_dir(&real).unwrap();
        let alias = dir.path().join("alias");
        symlink(&real, &alias).unwrap();

        let policy = PlatformPolicy::host()
            .with_symlink_policy(SymlinkPolicy::AllowKnownSystemPath)
            .with_system_alias(&alias);
        let io = SafeIo::with_policy(policy);

        io.write(alias.join("file.txt"), "via alias").unwrap();
        assert_eq!(io.read(alias.join("file.txt")).unwrap(), "via alias");
        assert_eq!(
            fs::read_to_string(real.join("file.txt")).unwrap(),
            "via alias"
        );

        // The same alias without the allowlist is rejected.
        let strict = io.strict_ancestors();
        assert_eq!(
            strict.read(alias.join("file.txt")).unwrap_err().kind(),
            ErrorKind::AncestorIsSymlink
        );
    }

    #[test]
    fn test_fifo_rejected_without_blocking() {
        let dir = TempDir::new().unwrap();
        let fifo = dir.path().join("pipe");
        mkfifo(&fifo);

        assert_eq!(
            file_read(&fifo).unwrap_err().kind(),
            ErrorKind::PathNotRegularFile
        );
        assert_eq!(
            file_write(&fifo, "x").unwrap_err().kind(),
            ErrorKind::PathNotRegularFile
        );
    }
}
