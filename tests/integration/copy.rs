//! Copy integration tests.
//!
//! These tests cover file and directory copies through the public API:
//! - Tree fidelity, including symlinks and permissions
//! - Containment (copying into itself)
//! - Idempotence of repeated directory copies
//! - Unsupported entries aborting the whole copy

#[path = "../common/mod.rs"]
mod common;

use common::{TestFixture, snapshot};
use safeio::{ErrorKind, SafeIo, copy_dir, copy_file};
use std::fs;

#[test]
fn test_copy_file_then_read_back() {
    let fx = TestFixture::new();
    let src = fx.write_src("report.csv", "a,b\n1,2\n");
    let dst = fx.dst_path("out/report.csv");

    let bytes = copy_file(&src, &dst).unwrap();

    assert_eq!(bytes, 8);
    assert_eq!(fs::read_to_string(&dst).unwrap(), "a,b\n1,2\n");
}

#[test]
fn test_copy_file_onto_itself_fails() {
    let fx = TestFixture::new();
    let src = fx.write_src("f", "content");

    let err = copy_file(&src, &src).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ContainmentViolation);
    assert_eq!(fs::read_to_string(&src).unwrap(), "content");
}

#[test]
fn test_copy_dir_tree_matches_source() {
    let fx = TestFixture::new();
    fx.create_nested_structure(4, 3);
    fx.write_src("top.txt", "top");
    fs::create_dir(fx.src.path().join("empty")).unwrap();
    let dst = fx.dst_path("copy");

    let stats = copy_dir(fx.src.path(), &dst).unwrap();

    assert_eq!(snapshot(fx.src.path()), snapshot(&dst));
    assert_eq!(stats.files_copied, 13);
    // Root, four levels, and `empty`
    assert_eq!(stats.dirs_created, 6);
}

#[test]
fn test_copy_dir_is_idempotent() {
    let fx = TestFixture::new();
    fx.create_nested_structure(2, 2);
    fx.write_src("a.txt", "a");
    let dst = fx.dst_path("copy");

    let first = copy_dir(fx.src.path(), &dst).unwrap();
    let after_first = snapshot(&dst);
    let second = copy_dir(fx.src.path(), &dst).unwrap();

    assert_eq!(snapshot(&dst), after_first);
    assert_eq!(first.files_copied, second.files_copied);
    assert_eq!(first.bytes_copied, second.bytes_copied);
    assert_eq!(second.dirs_created, 0);
}

#[test]
fn test_copy_dir_into_itself_fails() {
    let fx = TestFixture::new();
    fx.write_src("file.txt", "x");

    let same = copy_dir(fx.src.path(), fx.src.path()).unwrap_err();
    assert_eq!(same.kind(), ErrorKind::ContainmentViolation);

    let nested = copy_dir(fx.src.path(), fx.src.path().join("b")).unwrap_err();
    assert_eq!(nested.kind(), ErrorKind::ContainmentViolation);
    assert!(!fx.src.path().join("b").exists());
}

#[test]
fn test_copy_dir_sibling_with_shared_prefix_allowed() {
    let fx = TestFixture::new();
    let a = fx.dst.path().join("a");
    fs::create_dir(&a).unwrap();
    fs::write(a.join("f"), "f").unwrap();

    // `/x/ab` starts with `/x/a` as a string but is not inside it.
    copy_dir(&a, fx.dst.path().join("ab")).unwrap();

    assert_eq!(fs::read_to_string(fx.dst.path().join("ab/f")).unwrap(), "f");
}

#[test]
fn test_copy_dir_depth_limit() {
    let fx = TestFixture::new();
    fx.create_nested_structure(5, 1);

    let err = SafeIo::new()
        .max_depth(3)
        .copy_dir(fx.src.path(), fx.dst_path("copy"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MaxDepthExceeded);
    assert!(!fx.dst_path("copy").exists());
}

#[cfg(unix)]
mod unix_tests {
    use super::*;
    use common::{mkfifo, mode_of};
    use std::os::unix::fs::{PermissionsExt, symlink};
    use std::path::Path;

    #[test]
    fn test_symlinks_preserved_verbatim() {
        let fx = TestFixture::new();
        fx.write_src("target.txt", "target");
        fs::create_dir(fx.src.path().join("sub")).unwrap();
        symlink("target.txt", fx.src.path().join("relative")).unwrap();
        symlink("/etc/hostname", fx.src.path().join("absolute")).unwrap();
        symlink("../target.txt", fx.src.path().join("sub/up")).unwrap();
        symlink("does/not/exist", fx.src.path().join("dangling")).unwrap();
        let dst = fx.dst_path("copy");

        let stats = copy_dir(fx.src.path(), &dst).unwrap();

        assert_eq!(stats.symlinks_copied, 4);
        assert_eq!(snapshot(fx.src.path()), snapshot(&dst));
        assert_eq!(
            fs::read_link(dst.join("absolute")).unwrap(),
            Path::new("/etc/hostname")
        );
    }

    #[test]
    fn test_symlink_replaces_stale_destination_entries() {
        let fx = TestFixture::new();
        symlink("new-target", fx.src.path().join("link")).unwrap();
        let dst = fx.dst_path("copy");
        fs::create_dir_all(dst.join("link").join("stale")).unwrap();

        copy_dir(fx.src.path(), &dst).unwrap();

        assert_eq!(
            fs::read_link(dst.join("link")).unwrap(),
            Path::new("new-target")
        );
    }

    #[test]
    fn test_copy_file_of_symlink_recreates_link() {
        let fx = TestFixture::new();
        let link = fx.src.path().join("link");
        symlink("elsewhere", &link).unwrap();
        let dst = fx.dst_path("link-copy");
        fs::write(&dst, "previous occupant").unwrap();

        assert_eq!(copy_file(&link, &dst).unwrap(), 0);
        assert_eq!(fs::read_link(&dst).unwrap(), Path::new("elsewhere"));
    }

    #[test]
    fn test_modes_copied_exactly() {
        let fx = TestFixture::new();
        let script = fx.write_src("bin/run.sh", "#!/bin/sh\n");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o751)).unwrap();
        let private = fx.write_src("private/key", "k");
        fs::set_permissions(&private, fs::Permissions::from_mode(0o600)).unwrap();
        fs::set_permissions(
            fx.src.path().join("private"),
            fs::Permissions::from_mode(0o700),
        )
        .unwrap();
        let dst = fx.dst_path("copy");

        copy_dir(fx.src.path(), &dst).unwrap();

        assert_eq!(mode_of(&dst.join("bin/run.sh")), 0o751);
        assert_eq!(mode_of(&dst.join("private/key")), 0o600);
        assert_eq!(mode_of(&dst.join("private")), 0o700);
        assert_eq!(mode_of(&dst), mode_of(fx.src.path()));
    }

    #[test]
    fn test_fifo_aborts_without_partial_copy() {
        let fx = TestFixture::new();
        fx.write_src("a_first.txt", "a");
        fx.write_src("nested/b.txt", "b");
        mkfifo(&fx.src.path().join("m_pipe"));
        fx.write_src("z_last.txt", "z");
        let dst = fx.dst_path("copy");

        let err = copy_dir(fx.src.path(), &dst).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedFileType);
        assert!(!dst.exists(), "nothing may be written before the abort");
    }

    #[test]
    fn test_nested_fifo_aborts_without_partial_copy() {
        let fx = TestFixture::new();
        fx.write_src("a.txt", "a");
        fs::create_dir(fx.src.path().join("deep")).unwrap();
        mkfifo(&fx.src.path().join("deep/pipe"));
        let dst = fx.dst_path("copy");

        let err = copy_dir(fx.src.path(), &dst).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedFileType);
        assert!(!dst.exists());
    }

    #[test]
    fn test_symlinked_source_ancestor_rejected() {
        let fx = TestFixture::new();
        fx.write_src("real/tree/file.txt", "x");
        let link = fx.dst.path().join("link");
        symlink(fx.src.path().join("real"), &link).unwrap();

        let err = copy_dir(link.join("tree"), fx.dst_path("copy")).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AncestorIsSymlink);
    }

    #[test]
    fn test_destination_symlink_rejected() {
        let fx = TestFixture::new();
        fx.write_src("file.txt", "x");
        let elsewhere = fx.dst.path().join("elsewhere");
        fs::create_dir(&elsewhere).unwrap();
        let dst = fx.dst_path("copy");
        symlink(&elsewhere, &dst).unwrap();

        let err = copy_dir(fx.src.path(), &dst).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PathIsSymlink);
        assert!(fs::read_dir(&elsewhere).unwrap().next().is_none());
    }

    #[test]
    fn test_copy_file_link_onto_its_target_rejected() {
        let fx = TestFixture::new();
        let target = fx.write_src("f.txt", "original");
        let link = fx.src.path().join("link");
        symlink("f.txt", &link).unwrap();

        let err = copy_file(&link, &target).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ContainmentViolation);
        assert_eq!(fs::read_to_string(&target).unwrap(), "original");
        assert!(!fs::symlink_metadata(&target).unwrap().file_type().is_symlink());
    }

    #[test]
    fn test_copy_dir_link_onto_its_target_rejected() {
        let fx = TestFixture::new();
        fx.create_nested_structure(2, 2);
        let before = snapshot(fx.src.path());
        let link = fx.dst.path().join("link");
        symlink(fx.src.path(), &link).unwrap();

        let err = copy_dir(&link, fx.src.path()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ContainmentViolation);
        assert_eq!(snapshot(fx.src.path()), before);
    }

    #[test]
    fn test_copy_dir_link_into_its_target_rejected() {
        let fx = TestFixture::new();
        fx.write_src("data.txt", "data");
        let before = snapshot(fx.src.path());
        let link = fx.dst.path().join("link");
        symlink(fx.src.path(), &link).unwrap();

        let err = copy_dir(&link, fx.src.path().join("level0/copy")).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ContainmentViolation);
        assert_eq!(snapshot(fx.src.path()), before);
    }

    #[test]
    fn test_copy_dir_link_to_unrelated_dir_copies_link() {
        let fx = TestFixture::new();
        fx.write_src("data.txt", "data");
        let link = fx.dst.path().join("link");
        symlink(fx.src.path(), &link).unwrap();
        let dst = fx.dst_path("link-copy");

        let stats = copy_dir(&link, &dst).unwrap();

        assert_eq!(stats.symlinks_copied, 1);
        assert_eq!(fs::read_link(&dst).unwrap(), fx.src.path());
    }
}
