//! Daemon process lifecycle: spawn, detach, register, signal.
//!
//! `start` re-executes the current binary with [`DAEMON_SUBCOMMAND`] and
//! waits until the child has written its marker. The child detaches into its
//! own session, re-checks the singleton, writes the marker, and removes it
//! again when its [`DaemonGuard`] drops.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use branchsync_core::{marker, BranchName, DaemonRecord, RepoHandle};

use crate::error::{io_err, DaemonError};
use crate::log_rotation;
use crate::paths::{self, DAEMON_SUBCOMMAND, STARTUP_POLL, STARTUP_TIMEOUT, STOP_POLL};

/// Exit code of a daemon whose loop ended on a terminal outcome.
pub const EXIT_TERMINAL: i32 = 3;

/// Everything the detached process needs to run one branch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonOptions {
    pub repo: RepoHandle,
    pub branch: BranchName,
    pub remote: String,
    pub interval: Duration,
}

impl DaemonOptions {
    /// Arguments following [`DAEMON_SUBCOMMAND`] on the re-executed command line.
    pub fn to_args(&self) -> Vec<OsString> {
        vec![
            "--repo".into(),
            self.repo.root.clone().into(),
            "--git-dir".into(),
            self.repo.git_dir.clone().into(),
            "--branch".into(),
            self.branch.as_str().into(),
            "--remote".into(),
            self.remote.clone().into(),
            "--interval".into(),
            self.interval.as_secs().max(1).to_string().into(),
        ]
    }
}

/// What `start` observed after spawning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Spawned {
    /// The daemon registered itself and is polling.
    Running(DaemonRecord),
    /// The daemon registered, ran its first iteration, and stopped on a terminal outcome.
    Stopped { log: PathBuf },
}

// ---------------------------------------------------------------------------
// Parent side
// ---------------------------------------------------------------------------

/// Spawn a detached daemon from `exe` and wait for it to register.
///
/// Output is flushed first so buffered text is not duplicated into the child.
/// The child's stdout and stderr go to the branch's log file.
pub fn spawn_daemon(exe: &Path, options: &DaemonOptions) -> Result<Spawned, DaemonError> {
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    let git_dir = &options.repo.git_dir;
    let target = options.repo.target(options.branch.clone());
    let log = paths::log_path(git_dir, &options.branch);
    marker::ensure_marker_dir_at(git_dir)?;
    let logs = paths::logs_dir(git_dir);
    fs::create_dir_all(&logs).map_err(|e| io_err(&logs, e))?;
    log_rotation::rotate_branch_log(git_dir, &options.branch);

    let stdout = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log)
        .map_err(|e| io_err(&log, e))?;
    let stderr = stdout.try_clone().map_err(|e| io_err(&log, e))?;

    let mut child = Command::new(exe)
        .arg(DAEMON_SUBCOMMAND)
        .args(options.to_args())
        .current_dir(&options.repo.root)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .map_err(|e| io_err(exe, e))?;
    let pid = child.id();
    tracing::debug!(pid, %target, "spawned daemon process");

    let deadline = Instant::now() + STARTUP_TIMEOUT;
    loop {
        // Parse errors here mean the child is mid-write; poll again.
        if let Ok(Some(record)) = marker::read_marker_at(git_dir, &options.branch) {
            if record.pid == pid {
                return Ok(Spawned::Running(record));
            }
        }

        if let Some(status) = child.try_wait().map_err(|e| io_err(exe, e))? {
            return match status.code() {
                Some(EXIT_TERMINAL) => Ok(Spawned::Stopped { log }),
                _ => Err(DaemonError::StartupFailed {
                    target,
                    status: status.to_string(),
                    log,
                }),
            };
        }

        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(DaemonError::StartupTimeout {
                target,
                timeout_ms: STARTUP_TIMEOUT.as_millis(),
                log,
            });
        }
        std::thread::sleep(STARTUP_POLL);
    }
}

// ---------------------------------------------------------------------------
// Child side
// ---------------------------------------------------------------------------

/// Registration of the current process as the daemon for one branch.
///
/// Dropping the guard removes the marker, unless another process owns it by then.
#[derive(Debug)]
pub struct DaemonGuard {
    git_dir: PathBuf,
    record: DaemonRecord,
}

impl DaemonGuard {
    pub fn record(&self) -> &DaemonRecord {
        &self.record
    }
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        match marker::remove_marker_if_owned(&self.git_dir, &self.record.target.branch, self.record.pid) {
            Ok(true) => tracing::debug!(pid = self.record.pid, "daemon marker removed"),
            Ok(false) => {}
            Err(err) => tracing::warn!(error = %err, "failed to remove daemon marker"),
        }
    }
}

/// Register the current process as the daemon for `branch`.
///
/// With `detach`, the process first leaves its parent's session so it
/// outlives the launching terminal. Fails with [`DaemonError::AlreadyRunning`]
/// when another live process owns the marker.
pub fn daemonize(
    repo: &RepoHandle,
    branch: &BranchName,
    detach: bool,
) -> Result<DaemonGuard, DaemonError> {
    if detach {
        match nix::unistd::setsid() {
            Ok(sid) => tracing::debug!(sid = sid.as_raw(), "detached into new session"),
            Err(errno) => tracing::warn!(error = %errno, "setsid failed; staying in current session"),
        }
    }

    let pid = std::process::id();
    match marker::read_marker_at(&repo.git_dir, branch) {
        Ok(Some(existing)) if existing.pid != pid && is_alive(existing.pid) => {
            return Err(DaemonError::AlreadyRunning {
                target: existing.target,
                pid: existing.pid,
            });
        }
        Ok(_) => {}
        // Corrupt marker: overwritten below.
        Err(err) => tracing::warn!(error = %err, "replacing unreadable daemon marker"),
    }

    let record = DaemonRecord::new(pid, repo.target(branch.clone()));
    let path = marker::write_marker_at(&repo.git_dir, &record)?;
    tracing::info!(pid, target = %record.target, marker = %path.display(), "daemon registered");

    Ok(DaemonGuard {
        git_dir: repo.git_dir.clone(),
        record,
    })
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Zero-effect liveness probe. `EPERM` means the process exists under another user.
pub fn is_alive(pid: u32) -> bool {
    let Some(pid) = to_pid(pid) else {
        return false;
    };
    match kill(pid, None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Ask a daemon to finish its current iteration and exit.
///
/// Returns `false` when the process is already gone.
pub fn request_shutdown(record: &DaemonRecord) -> Result<bool, DaemonError> {
    let Some(pid) = to_pid(record.pid) else {
        return Ok(false);
    };
    match kill(pid, Signal::SIGTERM) {
        Ok(()) => {
            tracing::debug!(pid = record.pid, target = %record.target, "sent SIGTERM");
            Ok(true)
        }
        Err(Errno::ESRCH) => Ok(false),
        Err(source) => Err(DaemonError::Signal {
            pid: record.pid,
            source,
        }),
    }
}

/// Poll until `pid` is gone or `timeout` elapses. Returns whether it exited.
pub fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while is_alive(pid) {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(STOP_POLL);
    }
    true
}

fn to_pid(pid: u32) -> Option<Pid> {
    i32::try_from(pid).ok().filter(|raw| *raw > 0).map(Pid::from_raw)
}
