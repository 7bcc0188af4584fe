//! `git-branch-syncer __daemon`: the detached syncer process.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use branchsync_core::{BranchName, RepoHandle};
use branchsync_daemon::{start_blocking, DaemonOptions, StopReason, EXIT_TERMINAL};

/// Arguments written by `start` when it re-executes the binary.
#[derive(Args, Debug)]
pub struct DaemonArgs {
    #[arg(long)]
    pub repo: PathBuf,

    #[arg(long)]
    pub git_dir: PathBuf,

    #[arg(long)]
    pub branch: String,

    #[arg(long)]
    pub remote: String,

    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,
}

impl DaemonArgs {
    pub fn run(self) -> Result<()> {
        let options = DaemonOptions {
            repo: RepoHandle::new(self.repo, self.git_dir),
            branch: BranchName::from(self.branch),
            remote: self.remote,
            interval: Duration::from_secs(self.interval),
        };
        run_daemon(options, true)
    }
}

/// Run the syncer loop in this process.
///
/// A loop ended by a terminal outcome exits with [`EXIT_TERMINAL`] so
/// `start` can tell it apart from a crash.
pub fn run_daemon(options: DaemonOptions, detach: bool) -> Result<()> {
    let target = options.repo.target(options.branch.clone());
    let report = start_blocking(options, detach)
        .with_context(|| format!("syncer for {target} exited with error"))?;
    if report.stop == StopReason::Terminal {
        std::process::exit(EXIT_TERMINAL);
    }
    Ok(())
}
