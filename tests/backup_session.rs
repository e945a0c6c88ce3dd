// tests/backup_session.rs

//! End-to-end session tests: a destination root and one or more source
//! trees, driven through `blockvault::session::run` exactly the way the
//! CLI binary does, checked against the set's catalog and block tree.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rusqlite::Connection;
use tempfile::TempDir;

use blockvault::exclude::ExcludeSet;
use blockvault::progress::SilentProgress;
use blockvault::session::{self, RunOutcome, SessionConfig};

fn run_session(destination: &Path, sources: Vec<std::path::PathBuf>, exclude: Vec<String>) -> blockvault::Summary {
    let config = SessionConfig {
        destination: destination.to_path_buf(),
        sources,
        exclude: ExcludeSet::compile(&exclude).unwrap(),
        dry_run: false,
        progress: Box::new(SilentProgress),
    };
    match session::run(config, Arc::new(AtomicBool::new(false))).unwrap() {
        RunOutcome::Completed(summary) => summary,
        RunOutcome::Interrupted => panic!("session unexpectedly reported interrupted"),
    }
}

fn open_catalog(set_dir: &Path) -> Connection {
    Connection::open(set_dir.join("catalog.db")).unwrap()
}

fn file_row(conn: &Connection, path: &str) -> (String, i64, i64) {
    conn.query_row(
        "SELECT type, mtime_ns, size FROM file WHERE path = ?1",
        [path],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )
    .unwrap()
}

#[test]
fn s1_fresh_tree_no_reference() {
    let dest = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    fs::write(src.path().join("a.txt"), b"hello\n").unwrap();
    fs::create_dir(src.path().join("dir")).unwrap();
    fs::write(src.path().join("dir/b.bin"), vec![7u8; 1_000_000]).unwrap();

    let summary = run_session(dest.path(), vec![src.path().to_path_buf()], vec![]);

    assert!(summary.reference_set.is_none());
    let conn = open_catalog(&summary.destination_set);

    let count: i64 = conn.query_row("SELECT COUNT(*) FROM file", [], |r| r.get(0)).unwrap();
    assert_eq!(count, 4); // '/', '/a.txt', '/dir', '/dir/b.bin'

    let (kind, _mtime, size) = file_row(&conn, "/a.txt");
    assert_eq!(kind, "F");
    assert_eq!(size, 6);

    let blocks: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM block WHERE file = (SELECT id FROM file WHERE path = '/a.txt')",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(blocks, 1);
}

#[test]
fn s2_unchanged_rerun_hardlinks_blocks() {
    let dest = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    fs::write(src.path().join("a.txt"), b"hello\n").unwrap();
    fs::write(src.path().join("c.txt"), b"goodbye\n").unwrap();

    let first = run_session(dest.path(), vec![src.path().to_path_buf()], vec![]);
    assert_eq!(first.counters.changed_files, 2);

    let second = run_session(dest.path(), vec![src.path().to_path_buf()], vec![]);
    assert_eq!(second.counters.unchanged_files, 2);
    assert_eq!(second.counters.changed_files, 0);

    // Every block in the new set must be a hard link to one in the first.
    let conn = open_catalog(&second.destination_set);
    let mut stmt = conn.prepare("SELECT hash FROM block").unwrap();
    let hashes: Vec<String> = stmt
        .query_map([], |r| r.get(0))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert!(!hashes.is_empty());
    for hash in hashes {
        let (hh, rest) = blockvault::hash::shard(&hash);
        let path = second.destination_set.join(hh).join(rest);
        let meta = fs::metadata(&path).unwrap();
        assert!(meta.nlink() >= 2, "block {hash} was not shared across sets");
    }
}

#[test]
fn s3_in_place_modification_rehashes_only_changed_file() {
    let dest = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    fs::write(src.path().join("a.txt"), b"hello\n").unwrap();
    fs::write(src.path().join("b.txt"), b"stable\n").unwrap();

    run_session(dest.path(), vec![src.path().to_path_buf()], vec![]);

    // Ensure a distinct mtime from the first write.
    std::thread::sleep(std::time::Duration::from_millis(10));
    fs::write(src.path().join("a.txt"), b"hello world\n").unwrap();

    let summary = run_session(dest.path(), vec![src.path().to_path_buf()], vec![]);
    assert_eq!(summary.counters.changed_files, 1);
    assert_eq!(summary.counters.unchanged_files, 1);
}

#[test]
fn s4_symlink_recorded_without_blocks() {
    let dest = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    fs::write(src.path().join("a.txt"), b"hello\n").unwrap();
    std::os::unix::fs::symlink("/a.txt", src.path().join("link")).unwrap();

    let summary = run_session(dest.path(), vec![src.path().to_path_buf()], vec![]);
    let conn = open_catalog(&summary.destination_set);

    let (kind, link): (String, Option<String>) = conn
        .query_row(
            "SELECT type, link FROM file WHERE path = '/link'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(kind, "S");
    assert_eq!(link.as_deref(), Some("/a.txt"));

    let blocks: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM block WHERE file = (SELECT id FROM file WHERE path = '/link')",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(blocks, 0);
    assert_eq!(summary.counters.symbolic_links, 1);
}

#[test]
fn s5_exclude_skips_subtree_but_keeps_directory_row() {
    let dest = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    fs::create_dir(src.path().join("dir")).unwrap();
    fs::write(src.path().join("dir/skip.txt"), b"nope\n").unwrap();
    fs::write(src.path().join("keep.txt"), b"yes\n").unwrap();

    let summary = run_session(
        dest.path(),
        vec![src.path().to_path_buf()],
        vec!["/dir/**".to_string()],
    );
    let conn = open_catalog(&summary.destination_set);

    let dir_exists: i64 = conn
        .query_row("SELECT COUNT(*) FROM file WHERE path = '/dir'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(dir_exists, 1);

    let descendant_exists: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM file WHERE path = '/dir/skip.txt'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(descendant_exists, 0);
    assert_eq!(summary.counters.excluded_paths, 1);
}

#[test]
fn destination_inside_source_is_not_descended_into() {
    let src = TempDir::new().unwrap();
    let dest = src.path().join("backups");
    fs::create_dir(&dest).unwrap();
    fs::write(src.path().join("a.txt"), b"hello\n").unwrap();

    let summary = run_session(&dest, vec![src.path().to_path_buf()], vec![]);
    let conn = open_catalog(&summary.destination_set);

    let backups_row: i64 = conn
        .query_row("SELECT COUNT(*) FROM file WHERE path = '/backups'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(backups_row, 0);
}

#[test]
fn dry_run_leaves_destination_untouched() {
    let dest = TempDir::new().unwrap();
    let src = TempDir::new().unwrap();
    fs::write(src.path().join("a.txt"), b"hello\n").unwrap();

    let config = SessionConfig {
        destination: dest.path().to_path_buf(),
        sources: vec![src.path().to_path_buf()],
        exclude: ExcludeSet::compile(&[]).unwrap(),
        dry_run: true,
        progress: Box::new(SilentProgress),
    };
    match session::run(config, Arc::new(AtomicBool::new(false))).unwrap() {
        RunOutcome::Completed(summary) => {
            assert_eq!(summary.counters.changed_files, 1);
        }
        RunOutcome::Interrupted => panic!("unexpected interrupt"),
    }

    let entries: Vec<_> = fs::read_dir(dest.path()).unwrap().collect();
    assert!(entries.is_empty(), "dry run must not create anything under destination");
}
