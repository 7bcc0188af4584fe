//! Discovery of running daemons.
//!
//! The registry algorithm is the same for every scope: ask a
//! [`ProcessDirectory`] for candidate records, probe each through a
//! [`ProcessControl`], purge the dead ones, and order the rest by
//! repository then branch. Only the directory differs:
//!
//! - [`MarkerDirectory`] scans one repository's marker files.
//! - [`ProcessTable`] enumerates daemon processes host-wide.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sysinfo::{Pid, ProcessRefreshKind, System, UpdateKind};

use branchsync_core::{marker, BranchName, BranchTarget, DaemonRecord};

use crate::error::DaemonError;
use crate::lifecycle;
use crate::paths::DAEMON_SUBCOMMAND;

/// How long `stop` waits for a signalled daemon by default.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Source of candidate daemon records. Candidates may be stale.
pub trait ProcessDirectory: Send + Sync {
    fn candidates(&self) -> Result<Vec<DaemonRecord>, DaemonError>;

    /// Forget a record whose process is gone.
    fn purge(&self, stale: &DaemonRecord) -> Result<(), DaemonError>;
}

/// Liveness probing and termination of daemon processes.
pub trait ProcessControl: Send + Sync {
    fn is_alive(&self, record: &DaemonRecord) -> bool;

    /// Request cooperative shutdown. `false` when the process is already gone.
    fn terminate(&self, record: &DaemonRecord) -> Result<bool, DaemonError>;

    /// Block until the process exits or `timeout` elapses.
    fn wait_for_exit(&self, record: &DaemonRecord, timeout: Duration) -> bool;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct DaemonRegistry {
    directory: Box<dyn ProcessDirectory>,
    control: Box<dyn ProcessControl>,
    stop_timeout: Option<Duration>,
}

impl DaemonRegistry {
    pub fn new(
        directory: impl ProcessDirectory + 'static,
        control: impl ProcessControl + 'static,
    ) -> Self {
        Self {
            directory: Box::new(directory),
            control: Box::new(control),
            stop_timeout: None,
        }
    }

    /// Daemons registered under one repository's git directory.
    pub fn for_repository(git_dir: &Path) -> Self {
        Self::new(MarkerDirectory::new(git_dir), Signals)
    }

    /// Every daemon process on this host.
    pub fn host_wide() -> Self {
        Self::new(ProcessTable, Signals)
    }

    /// Make `stop_one`/`stop_all` wait up to `timeout` for each signalled daemon to exit.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = Some(timeout);
        self
    }

    /// Live daemons in scope, ordered by repository then branch.
    ///
    /// Candidates whose process is gone are purged and left out.
    pub fn list(&self) -> Result<Vec<DaemonRecord>, DaemonError> {
        let mut seen = HashSet::new();
        let mut live = Vec::new();
        for record in self.directory.candidates()? {
            if !self.control.is_alive(&record) {
                tracing::debug!(pid = record.pid, target = %record.target, "purging stale daemon record");
                if let Err(err) = self.directory.purge(&record) {
                    tracing::warn!(pid = record.pid, error = %err, "failed to purge stale daemon record");
                }
                continue;
            }
            if seen.insert(record.pid) {
                live.push(record);
            }
        }
        live.sort_by(|a, b| a.target.cmp(&b.target).then(a.pid.cmp(&b.pid)));
        Ok(live)
    }

    pub fn find(&self, target: &BranchTarget) -> Result<Option<DaemonRecord>, DaemonError> {
        Ok(self.list()?.into_iter().find(|record| &record.target == target))
    }

    /// Stop the daemon serving `target`. `false` when none is running.
    pub fn stop_one(&self, target: &BranchTarget) -> Result<bool, DaemonError> {
        match self.find(target)? {
            Some(record) => self.stop(&record),
            None => Ok(false),
        }
    }

    /// Stop every live daemon in scope. Returns how many were signalled.
    ///
    /// A daemon that cannot be signalled is reported and skipped.
    pub fn stop_all(&self) -> Result<usize, DaemonError> {
        let mut stopped = 0;
        for record in self.list()? {
            match self.stop(&record) {
                Ok(true) => stopped += 1,
                Ok(false) => {}
                Err(err) => tracing::warn!(pid = record.pid, target = %record.target, error = %err, "failed to stop daemon"),
            }
        }
        Ok(stopped)
    }

    fn stop(&self, record: &DaemonRecord) -> Result<bool, DaemonError> {
        if !self.control.terminate(record)? {
            return Ok(false);
        }
        tracing::info!(pid = record.pid, target = %record.target, "requested daemon shutdown");
        if let Some(timeout) = self.stop_timeout {
            if !self.control.wait_for_exit(record, timeout) {
                tracing::warn!(
                    pid = record.pid,
                    timeout_secs = timeout.as_secs(),
                    "daemon still running after shutdown request"
                );
            }
        }
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Marker-file directory (repository scope)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MarkerDirectory {
    git_dir: PathBuf,
}

impl MarkerDirectory {
    pub fn new(git_dir: impl Into<PathBuf>) -> Self {
        Self {
            git_dir: git_dir.into(),
        }
    }
}

impl ProcessDirectory for MarkerDirectory {
    fn candidates(&self) -> Result<Vec<DaemonRecord>, DaemonError> {
        Ok(marker::list_markers_at(&self.git_dir)?)
    }

    fn purge(&self, stale: &DaemonRecord) -> Result<(), DaemonError> {
        marker::remove_marker_if_owned(&self.git_dir, &stale.target.branch, stale.pid)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Process table (host scope)
// ---------------------------------------------------------------------------

/// Host-wide enumeration of processes running [`DAEMON_SUBCOMMAND`].
///
/// Best effort: processes whose command line is unreadable are invisible.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTable;

/// Target and marker location parsed from a daemon's command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonCommandLine {
    pub target: BranchTarget,
    pub git_dir: Option<PathBuf>,
}

struct Sighting {
    pid: u32,
    start_time: u64,
    git_dir: Option<PathBuf>,
}

impl ProcessDirectory for ProcessTable {
    fn candidates(&self) -> Result<Vec<DaemonRecord>, DaemonError> {
        let mut sys = System::new();
        sys.refresh_processes_specifics(command_lines());

        // Threads of one daemon may show up as separate entries sharing its command line.
        let mut by_target: BTreeMap<BranchTarget, Vec<Sighting>> = BTreeMap::new();
        for (pid, process) in sys.processes() {
            if let Some(cmdline) = parse_daemon_argv(process.cmd()) {
                by_target.entry(cmdline.target).or_default().push(Sighting {
                    pid: pid.as_u32(),
                    start_time: process.start_time(),
                    git_dir: cmdline.git_dir,
                });
            }
        }

        let mut records = Vec::with_capacity(by_target.len());
        for (target, mut sightings) in by_target {
            sightings.sort_by_key(|s| s.pid);
            if let Some(record) = registered_record(&target, &sightings) {
                records.push(record);
                continue;
            }
            if let Some(first) = sightings.first() {
                records.push(DaemonRecord {
                    pid: first.pid,
                    target,
                    started_at: started_at(first.start_time),
                });
            }
        }
        Ok(records)
    }

    /// Nothing to forget: a dead process is already gone from the table.
    fn purge(&self, _stale: &DaemonRecord) -> Result<(), DaemonError> {
        Ok(())
    }
}

/// The marker record for `target`, if it names one of the sighted pids.
fn registered_record(target: &BranchTarget, sightings: &[Sighting]) -> Option<DaemonRecord> {
    let git_dir = sightings.iter().find_map(|s| s.git_dir.as_ref())?;
    let record = marker::read_marker_at(git_dir, &target.branch).ok().flatten()?;
    let owned = record.target == *target && sightings.iter().any(|s| s.pid == record.pid);
    owned.then_some(record)
}

/// Command lines are not loaded by a default process refresh.
fn command_lines() -> ProcessRefreshKind {
    ProcessRefreshKind::new().with_cmd(UpdateKind::Always)
}

fn started_at(start_time: u64) -> DateTime<Utc> {
    i64::try_from(start_time)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_default()
}

/// Parse `<exe> __daemon --repo R [--git-dir G] --branch B …`.
///
/// Accepts both `--flag value` and `--flag=value`.
pub fn parse_daemon_argv(argv: &[String]) -> Option<DaemonCommandLine> {
    let start = argv.iter().position(|arg| arg == DAEMON_SUBCOMMAND)?;
    let mut repo = None;
    let mut git_dir = None;
    let mut branch = None;

    let mut args = argv[start + 1..].iter();
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag, Some(value.to_string())),
            _ => (arg.as_str(), None),
        };
        let slot = match flag {
            "--repo" => &mut repo,
            "--git-dir" => &mut git_dir,
            "--branch" => &mut branch,
            _ => continue,
        };
        *slot = inline.or_else(|| args.next().cloned());
    }

    Some(DaemonCommandLine {
        target: BranchTarget::new(repo?, BranchName::from(branch?)),
        git_dir: git_dir.map(PathBuf::from),
    })
}

// ---------------------------------------------------------------------------
// OS signals
// ---------------------------------------------------------------------------

/// [`ProcessControl`] over real process ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct Signals;

impl ProcessControl for Signals {
    fn is_alive(&self, record: &DaemonRecord) -> bool {
        lifecycle::is_alive(record.pid) && !pid_reused(record)
    }

    fn terminate(&self, record: &DaemonRecord) -> Result<bool, DaemonError> {
        if pid_reused(record) {
            return Ok(false);
        }
        lifecycle::request_shutdown(record)
    }

    fn wait_for_exit(&self, record: &DaemonRecord, timeout: Duration) -> bool {
        lifecycle::wait_for_exit(record.pid, timeout)
    }
}

/// True when `record.pid` now runs something other than this daemon.
///
/// An unreadable command line is given the benefit of the doubt.
fn pid_reused(record: &DaemonRecord) -> bool {
    let pid = Pid::from_u32(record.pid);
    let mut sys = System::new();
    if !sys.refresh_process_specifics(pid, command_lines()) {
        return false;
    }
    let Some(process) = sys.process(pid) else {
        return false;
    };
    if process.cmd().is_empty() {
        return false;
    }
    match parse_daemon_argv(process.cmd()) {
        Some(cmdline) => cmdline.target != record.target,
        None => true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
