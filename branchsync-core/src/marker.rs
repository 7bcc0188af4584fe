//! Durable per-branch daemon markers.
//!
//! # Storage layout
//!
//! ```text
//! <git_dir>/
//!   branch-syncer/            (mode 0700, created on first daemon start)
//!     main.json               (one marker per live daemon, mode 0600)
//!     feature%2Fx.json        (`/` in branch names is escaped)
//!     logs/
//!       main.log
//! ```
//!
//! Markers are advisory: a crashed daemon leaves its marker behind, so
//! readers must confirm the recorded pid is alive before trusting one.
//! Every function takes the git directory explicitly; nothing here looks at
//! the current working directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{io_err, CoreError};
use crate::types::{BranchName, DaemonRecord};

/// Directory name under the git directory that holds markers and logs.
pub const MARKER_DIR: &str = "branch-syncer";

const MARKER_EXT: &str = "json";

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<git_dir>/branch-syncer/`: pure, no I/O.
pub fn marker_dir_at(git_dir: &Path) -> PathBuf {
    git_dir.join(MARKER_DIR)
}

/// `<git_dir>/branch-syncer/`: creates the directory (mode `0700`) if absent.
pub fn ensure_marker_dir_at(git_dir: &Path) -> Result<PathBuf, CoreError> {
    let dir = marker_dir_at(git_dir);
    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

/// Flatten a branch name into a single path component.
///
/// `%` is escaped first so the encoding stays injective.
pub fn encode_branch(branch: &BranchName) -> String {
    branch.as_str().replace('%', "%25").replace('/', "%2F")
}

/// `<git_dir>/branch-syncer/<encoded-branch>.json`: pure, no I/O.
pub fn marker_path_at(git_dir: &Path, branch: &BranchName) -> PathBuf {
    marker_dir_at(git_dir).join(format!("{}.{MARKER_EXT}", encode_branch(branch)))
}

// ---------------------------------------------------------------------------
// 2. Read
// ---------------------------------------------------------------------------

/// Load the marker for `branch`, or `None` when no marker file exists.
pub fn read_marker_at(
    git_dir: &Path,
    branch: &BranchName,
) -> Result<Option<DaemonRecord>, CoreError> {
    read_marker_file(&marker_path_at(git_dir, branch))
}

fn read_marker_file(path: &Path) -> Result<Option<DaemonRecord>, CoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(path, err)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| CoreError::MarkerParse {
            path: path.to_path_buf(),
            source,
        })
}

/// Every parseable marker under `<git_dir>/branch-syncer/`, sorted by file name.
///
/// Corrupt markers cannot name a live daemon and are removed best-effort.
pub fn list_markers_at(git_dir: &Path) -> Result<Vec<DaemonRecord>, CoreError> {
    let dir = marker_dir_at(git_dir);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
        Err(err) => return Err(io_err(&dir, err)),
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|ext| ext.to_str()) == Some(MARKER_EXT))
        .collect();
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        match read_marker_file(&path) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(CoreError::MarkerParse { path, source }) => {
                tracing::warn!(path = %path.display(), error = %source, "removing corrupt daemon marker");
                let _ = fs::remove_file(&path);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// 3. Write (atomic)
// ---------------------------------------------------------------------------

/// Atomically write `record` to its marker path.
///
/// Write flow: serialize → `.json.tmp` sibling → `chmod 0600` → `rename`.
pub fn write_marker_at(git_dir: &Path, record: &DaemonRecord) -> Result<PathBuf, CoreError> {
    ensure_marker_dir_at(git_dir)?;
    let path = marker_path_at(git_dir, &record.target.branch);
    let tmp_path = path.with_extension(format!("{MARKER_EXT}.tmp"));

    let json = serde_json::to_string_pretty(record)?;
    fs::write(&tmp_path, json).map_err(|e| io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    fs::rename(&tmp_path, &path).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// 4. Remove
// ---------------------------------------------------------------------------

/// Delete the marker for `branch`. Returns `false` if it was already gone.
pub fn remove_marker_at(git_dir: &Path, branch: &BranchName) -> Result<bool, CoreError> {
    let path = marker_path_at(git_dir, branch);
    match fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_err(&path, err)),
    }
}

/// Delete the marker for `branch` only if it still records `pid`.
///
/// A daemon that exits after a successor has taken over must not erase the
/// successor's marker.
pub fn remove_marker_if_owned(
    git_dir: &Path,
    branch: &BranchName,
    pid: u32,
) -> Result<bool, CoreError> {
    match read_marker_at(git_dir, branch) {
        Ok(Some(record)) if record.pid == pid => remove_marker_at(git_dir, branch),
        Ok(_) => Ok(false),
        // Unreadable marker: nobody can own it.
        Err(CoreError::MarkerParse { .. }) => remove_marker_at(git_dir, branch),
        Err(err) => Err(err),
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BranchTarget;
    use tempfile::TempDir;

    fn record(pid: u32, branch: &str) -> DaemonRecord {
        DaemonRecord::new(pid, BranchTarget::new("/code/app", branch))
    }

    #[test]
    fn marker_path_is_correct() {
        let git_dir = TempDir::new().expect("tempdir");
        let path = marker_path_at(git_dir.path(), &BranchName::from("main"));
        assert!(path.ends_with("branch-syncer/main.json"));
    }

    #[test]
    fn nested_branch_names_stay_flat() {
        assert_eq!(encode_branch(&BranchName::from("feature/x")), "feature%2Fx");
        assert_eq!(encode_branch(&BranchName::from("100%/y")), "100%25%2Fy");
    }

    #[test]
    fn marker_dir_created_with_perms() {
        let git_dir = TempDir::new().expect("tempdir");
        let dir = ensure_marker_dir_at(git_dir.path()).expect("ensure");
        assert!(dir.exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o700);
        }
    }

    #[test]
    fn write_and_read_marker() {
        let git_dir = TempDir::new().expect("tempdir");
        let rec = record(101, "feature/x");
        write_marker_at(git_dir.path(), &rec).expect("write");
        let loaded = read_marker_at(git_dir.path(), &BranchName::from("feature/x"))
            .expect("read")
            .expect("present");
        assert_eq!(loaded, rec);
    }

    #[test]
    fn atomic_write_cleans_up_tmp() {
        let git_dir = TempDir::new().expect("tempdir");
        let path = write_marker_at(git_dir.path(), &record(1, "main")).expect("write");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn read_missing_marker_is_none() {
        let git_dir = TempDir::new().expect("tempdir");
        let loaded = read_marker_at(git_dir.path(), &BranchName::from("main")).expect("read");
        assert!(loaded.is_none());
    }

    #[test]
    fn list_skips_logs_and_removes_corrupt_markers() {
        let git_dir = TempDir::new().expect("tempdir");
        write_marker_at(git_dir.path(), &record(2, "main")).expect("write");
        write_marker_at(git_dir.path(), &record(3, "dev")).expect("write");
        let dir = marker_dir_at(git_dir.path());
        fs::create_dir_all(dir.join("logs")).expect("logs dir");
        fs::write(dir.join("logs").join("main.log"), "log line").expect("log");
        fs::write(dir.join("broken.json"), "{ not json").expect("corrupt");

        let records = list_markers_at(git_dir.path()).expect("list");
        let pids: Vec<u32> = records.iter().map(|r| r.pid).collect();
        assert_eq!(pids, vec![3, 2], "sorted by file name: dev.json, main.json");
        assert!(!dir.join("broken.json").exists(), "corrupt marker purged");
    }

    #[test]
    fn list_without_marker_dir_is_empty() {
        let git_dir = TempDir::new().expect("tempdir");
        assert!(list_markers_at(git_dir.path()).expect("list").is_empty());
    }

    #[test]
    fn remove_if_owned_respects_pid() {
        let git_dir = TempDir::new().expect("tempdir");
        let branch = BranchName::from("main");
        write_marker_at(git_dir.path(), &record(10, "main")).expect("write");

        assert!(!remove_marker_if_owned(git_dir.path(), &branch, 11).expect("foreign"));
        assert!(marker_path_at(git_dir.path(), &branch).exists());

        assert!(remove_marker_if_owned(git_dir.path(), &branch, 10).expect("owned"));
        assert!(!marker_path_at(git_dir.path(), &branch).exists());
        assert!(!remove_marker_at(git_dir.path(), &branch).expect("already gone"));
    }
}
