//! Marker error-message, atomic-write-safety, and layout integration tests.
//! Storage: <git_dir>/branch-syncer/<encoded-branch>.json

use assert_fs::prelude::*;
use branchsync_core::{
    marker,
    types::{BranchName, BranchTarget, DaemonRecord},
    CoreError,
};
use predicates::prelude::predicate;
use std::fs;

fn main_branch() -> BranchName {
    BranchName::from("main")
}

fn record(pid: u32, branch: &str) -> DaemonRecord {
    DaemonRecord::new(pid, BranchTarget::new("/code/app", branch))
}

// ---------------------------------------------------------------------------
// 1. Read error messages
// ---------------------------------------------------------------------------

#[test]
fn read_corrupt_marker_returns_parse_error_with_path() {
    let git_dir = assert_fs::TempDir::new().expect("tempdir");
    git_dir.child("branch-syncer/main.json").write_str("{\"pid\": \"nope\"").expect("write");

    let err = marker::read_marker_at(git_dir.path(), &main_branch()).unwrap_err();
    assert!(matches!(err, CoreError::MarkerParse { .. }), "got: {err}");
    assert!(err.to_string().contains("main.json"), "must contain file path, got: {err}");
}

#[test]
fn remove_if_owned_clears_corrupt_marker() {
    let git_dir = assert_fs::TempDir::new().expect("tempdir");
    let child = git_dir.child("branch-syncer/main.json");
    child.write_str("garbage").expect("write");

    let removed = marker::remove_marker_if_owned(git_dir.path(), &main_branch(), 77).expect("remove");
    assert!(removed);
    child.assert(predicate::path::missing());
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn interrupted_write_leaves_previous_marker_intact() {
    let git_dir = assert_fs::TempDir::new().expect("tempdir");
    let path = marker::write_marker_at(git_dir.path(), &record(5, "main")).expect("write");
    let original_bytes = fs::read(&path).expect("read original");

    // Simulate crash: .tmp written but process died before rename
    let tmp = path.with_file_name("main.json.tmp");
    fs::write(&tmp, b"CRASH - INCOMPLETE WRITE").expect("write crash tmp");

    assert_eq!(original_bytes, fs::read(&path).expect("read after crash"));
    let listed = marker::list_markers_at(git_dir.path()).expect("list");
    assert_eq!(listed.len(), 1, ".tmp orphans are not markers");
    assert_eq!(listed[0].pid, 5);
}

#[test]
fn rewrite_replaces_previous_owner() {
    let git_dir = assert_fs::TempDir::new().expect("tempdir");
    marker::write_marker_at(git_dir.path(), &record(5, "main")).expect("first");
    marker::write_marker_at(git_dir.path(), &record(6, "main")).expect("second");

    let loaded = marker::read_marker_at(git_dir.path(), &main_branch())
        .expect("read")
        .expect("present");
    assert_eq!(loaded.pid, 6);
}

// ---------------------------------------------------------------------------
// 3. Layout
// ---------------------------------------------------------------------------

#[test]
fn marker_lands_under_git_dir_with_private_mode() {
    let git_dir = assert_fs::TempDir::new().expect("tempdir");
    marker::write_marker_at(git_dir.path(), &record(9, "release/1.0")).expect("write");

    let child = git_dir.child("branch-syncer/release%2F1.0.json");
    child.assert(predicate::path::exists());
    child.assert(predicate::str::contains("\"branch\": \"release/1.0\""));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(child.path()).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "expected 0600, got {mode:o}");
    }
}

#[test]
fn list_returns_every_branch() {
    let git_dir = assert_fs::TempDir::new().expect("tempdir");
    for (pid, branch) in [(1, "main"), (2, "feature/a"), (3, "dev")] {
        marker::write_marker_at(git_dir.path(), &record(pid, branch)).expect("write");
    }

    let mut branches: Vec<String> = marker::list_markers_at(git_dir.path())
        .expect("list")
        .into_iter()
        .map(|r| r.target.branch.0)
        .collect();
    branches.sort();
    assert_eq!(branches, vec!["dev", "feature/a", "main"]);
}
