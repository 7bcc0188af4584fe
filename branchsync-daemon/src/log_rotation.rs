//! Generations of a branch's daemon log.
//!
//! A daemon writes through the descriptor `start` hands it, so a log is only
//! rotated by [`spawn_daemon`](crate::spawn_daemon), before the new daemon
//! for that branch exists. Generations sit next to the live log:
//! `feature%2Fx.log`, `feature%2Fx.log.1` (newest) … `feature%2Fx.log.<keep>`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use branchsync_core::BranchName;

use crate::error::{io_err, DaemonError};
use crate::paths;

/// Size a branch log may reach before the next `start` rotates it (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Rotated generations kept per branch.
pub const KEPT_GENERATIONS: usize = 5;

/// Size limit and retention for the logs under one git directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRotation {
    max_bytes: u64,
    keep: usize,
}

impl Default for LogRotation {
    fn default() -> Self {
        Self::new(MAX_LOG_BYTES, KEPT_GENERATIONS)
    }
}

impl LogRotation {
    pub fn new(max_bytes: u64, keep: usize) -> Self {
        Self { max_bytes, keep }
    }

    /// Shift `branch`'s log into generation 1 once it has outgrown the limit.
    ///
    /// Returns whether anything moved. The live log is left absent; the next
    /// daemon's log file is created on open.
    pub fn rotate(&self, git_dir: &Path, branch: &BranchName) -> Result<bool, DaemonError> {
        let live = paths::log_path(git_dir, branch);
        let size = match fs::metadata(&live) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(io_err(&live, err)),
        };
        if size < self.max_bytes {
            return Ok(false);
        }

        if self.keep == 0 {
            fs::remove_file(&live).map_err(|e| io_err(&live, e))?;
            return Ok(true);
        }

        // Renaming onto the oldest generation replaces it.
        for n in (1..self.keep).rev() {
            move_if_present(&generation(&live, n), &generation(&live, n + 1))?;
        }
        move_if_present(&live, &generation(&live, 1))?;
        Ok(true)
    }
}

/// Rotate with the default limits. Failures are logged, never fatal to `start`.
pub fn rotate_branch_log(git_dir: &Path, branch: &BranchName) {
    match LogRotation::default().rotate(git_dir, branch) {
        Ok(true) => tracing::info!(%branch, "rotated branch log"),
        Ok(false) => {}
        Err(err) => tracing::warn!(%branch, error = %err, "branch log rotation failed"),
    }
}

/// `<live>.<n>`
pub fn generation(live: &Path, n: usize) -> PathBuf {
    let mut name = live.as_os_str().to_owned();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

fn move_if_present(from: &Path, to: &Path) -> Result<(), DaemonError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(from, err)),
    }
}
