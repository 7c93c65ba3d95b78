//! Concurrency integration tests.
//!
//! Writers and readers run in parallel against the same paths:
//! - A reader sees one complete version, never a mix
//! - Concurrent writers leave exactly one complete version and no temp files
//! - Swapping a file for a symlink mid-stream never leaks the link's target

#[path = "../common/mod.rs"]
mod common;

use common::temp_leftovers;
use rayon::prelude::*;
use safeio::{copy_dir, file_read_bytes, file_write_bytes};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

#[cfg(unix)]
const PAYLOAD_LEN: usize = 1024 * 1024;

#[cfg(unix)]
#[test]
fn test_readers_never_see_partial_writes() {
    use safeio::ErrorKind;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shared.bin");
    let a = vec![b'A'; PAYLOAD_LEN];
    let b = vec![b'B'; PAYLOAD_LEN / 2];
    file_write_bytes(&path, &a).unwrap();

    let done = AtomicBool::new(false);
    std::thread::scope(|s| {
        s.spawn(|| {
            for i in 0..40 {
                let payload = if i % 2 == 0 { &b } else { &a };
                file_write_bytes(&path, payload).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        });

        for _ in 0..4 {
            s.spawn(|| {
                while !done.load(Ordering::SeqCst) {
                    match file_read_bytes(&path) {
                        Ok(seen) => assert!(
                            seen == a || seen == b,
                            "observed a torn file of {} bytes",
                            seen.len()
                        ),
                        // The rename landed between the check and the open.
                        Err(e) => assert_eq!(e.kind(), ErrorKind::IdentityChanged),
                    }
                }
            });
        }
    });

    assert!(temp_leftovers(dir.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn test_concurrent_writers_last_rename_wins() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("contended.txt");

    let versions: Vec<Vec<u8>> = (0..16u8)
        .map(|i| vec![b'a' + i; 64 * 1024 + usize::from(i)])
        .collect();

    versions
        .par_iter()
        .for_each(|content| file_write_bytes(&path, content).unwrap());

    let final_content = fs::read(&path).unwrap();
    assert!(versions.contains(&final_content));
    assert!(temp_leftovers(dir.path()).is_empty());
}

#[test]
fn test_parallel_copies_to_distinct_destinations() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    for i in 0..20 {
        fs::write(src.path().join(format!("f{i:02}.txt")), format!("{i}")).unwrap();
    }

    let totals: Vec<u64> = (0..8)
        .into_par_iter()
        .map(|i| {
            copy_dir(src.path(), dst.path().join(format!("copy{i}")))
                .unwrap()
                .files_copied
        })
        .collect();

    assert!(totals.iter().all(|&n| n == 20));
}

#[cfg(unix)]
#[test]
fn test_symlink_swap_never_leaks_target() {
    use safeio::ErrorKind;
    use std::os::unix::fs::symlink;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("victim.txt");
    let secret = dir.path().join("secret.txt");
    fs::write(&secret, "TOP SECRET").unwrap();
    fs::write(&path, "public").unwrap();

    let done = AtomicBool::new(false);
    std::thread::scope(|s| {
        s.spawn(|| {
            let staged = dir.path().join("staged");
            for _ in 0..200 {
                let _ = fs::remove_file(&staged);
                symlink(&secret, &staged).unwrap();
                fs::rename(&staged, &path).unwrap();
                fs::write(&staged, "public").unwrap();
                fs::rename(&staged, &path).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        });

        s.spawn(|| {
            while !done.load(Ordering::SeqCst) {
                match file_read_bytes(&path) {
                    Ok(content) => assert_eq!(content, b"public"),
                    Err(e) => assert!(
                        matches!(
                            e.kind(),
                            ErrorKind::PathIsSymlink | ErrorKind::IdentityChanged | ErrorKind::Io
                        ),
                        "unexpected error: {e}"
                    ),
                }
            }
        });
    });
}
