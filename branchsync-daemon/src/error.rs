use std::path::PathBuf;

use thiserror::Error;

use branchsync_core::BranchTarget;

/// Error surface for daemon lifecycle, registry, and runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("marker error: {0}")]
    Core(#[from] branchsync_core::CoreError),

    #[error("git error: {0}")]
    Vcs(#[from] branchsync_git::VcsError),

    #[error("a syncer is already running for {target} (pid {pid})")]
    AlreadyRunning { target: BranchTarget, pid: u32 },

    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },

    #[error("syncer for {target} exited during startup ({status}); see {}", .log.display())]
    StartupFailed {
        target: BranchTarget,
        status: String,
        log: PathBuf,
    },

    #[error("syncer for {target} did not register within {timeout_ms} ms; see {}", .log.display())]
    StartupTimeout {
        target: BranchTarget,
        timeout_ms: u128,
        log: PathBuf,
    },

    #[error("daemon runtime error: {0}")]
    Runtime(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
