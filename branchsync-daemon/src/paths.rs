use std::path::{Path, PathBuf};
use std::time::Duration;

use branchsync_core::{marker, BranchName};

/// Hidden subcommand the detached process is re-executed with.
pub const DAEMON_SUBCOMMAND: &str = "__daemon";

pub const LOGS_DIR: &str = "logs";

/// How often `start` checks whether the spawned daemon registered itself.
pub const STARTUP_POLL: Duration = Duration::from_millis(20);
/// How long `start` waits for the spawned daemon's marker.
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// How often `stop` re-probes a signalled daemon.
pub const STOP_POLL: Duration = Duration::from_millis(50);

pub fn logs_dir(git_dir: &Path) -> PathBuf {
    marker::marker_dir_at(git_dir).join(LOGS_DIR)
}

pub fn log_path(git_dir: &Path, branch: &BranchName) -> PathBuf {
    logs_dir(git_dir).join(format!("{}.log", marker::encode_branch(branch)))
}
