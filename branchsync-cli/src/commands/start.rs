//! `git-branch-syncer start [BRANCH] [--interval SECS] [--remote NAME] [--foreground]`

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use branchsync_daemon::{paths, spawn_daemon, DaemonError, DaemonOptions, DaemonRegistry, Spawned};
use branchsync_git::Vcs;

use super::{ensure_remote, load_config, open_repository, resolve_branch};

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Branch to keep in sync (defaults to the checked-out branch).
    pub branch: Option<String>,

    /// Seconds between polls (defaults to `interval_secs` from the config, 5).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Remote to fetch from (defaults to `remote` from the config, origin).
    #[arg(long)]
    pub remote: Option<String>,

    /// Run in this terminal instead of detaching.
    #[arg(long)]
    pub foreground: bool,
}

impl StartArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let git = open_repository()?;
        let branch = resolve_branch(&git, self.branch.as_deref())?;
        let repo = git.repo().clone();
        let target = repo.target(branch.clone());

        if git.resolve_branch(&branch)?.is_none() {
            bail!("branch '{branch}' not found in {}", repo.root.display());
        }
        let remote = self.remote.unwrap_or_else(|| config.remote.clone());
        ensure_remote(&git, &remote)?;

        let registry = DaemonRegistry::for_repository(&repo.git_dir);
        if let Some(existing) = registry.find(&target)? {
            return Err(DaemonError::AlreadyRunning {
                target,
                pid: existing.pid,
            }
            .into());
        }

        let interval_secs = self.interval.unwrap_or(config.interval_secs);
        let options = DaemonOptions {
            repo,
            branch,
            remote,
            interval: Duration::from_secs(interval_secs),
        };

        if self.foreground {
            return super::daemon::run_daemon(options, false);
        }

        let exe = std::env::current_exe().context("cannot locate the git-branch-syncer executable")?;
        let spawned = spawn_daemon(&exe, &options)
            .with_context(|| format!("failed to start syncer for {target}"))?;
        match spawned {
            Spawned::Running(record) => {
                println!(
                    "{} syncing {target} from '{}' every {interval_secs}s (pid {})",
                    "✓".green(),
                    options.remote,
                    record.pid
                );
                println!(
                    "  logs: {}",
                    paths::log_path(&options.repo.git_dir, &options.branch).display()
                );
            }
            Spawned::Stopped { log } => {
                eprintln!(
                    "{} syncer for {target} stopped after its first check; see {}",
                    "!".yellow().bold(),
                    log.display()
                );
            }
        }
        Ok(())
    }
}
