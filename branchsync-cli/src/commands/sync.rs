//! `git-branch-syncer sync [BRANCH]`: one fetch and fast-forward, no daemon.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use branchsync_core::SyncOutcome;
use branchsync_git::SyncEngine;

use super::{ensure_remote, load_config, open_repository, resolve_branch};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Branch to sync (defaults to the checked-out branch).
    pub branch: Option<String>,

    /// Remote to fetch from (defaults to `remote` from the config, origin).
    #[arg(long)]
    pub remote: Option<String>,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let git = open_repository()?;
        let branch = resolve_branch(&git, self.branch.as_deref())?;
        let remote = self.remote.unwrap_or_else(|| config.remote.clone());
        ensure_remote(&git, &remote)?;

        let target = git.repo().target(branch.clone());
        println!("Fetching '{remote}' for {target}...");
        let engine = SyncEngine::new(git, remote);
        match engine.evaluate(&branch) {
            SyncOutcome::UpToDate => println!("{} Already up to date", "✓".green()),
            SyncOutcome::Synced { commits } => println!(
                "{} Found {commits} new commit(s); fast-forwarded '{branch}'",
                "✓".green()
            ),
            terminal => bail!("{terminal} ({target})"),
        }
        Ok(())
    }
}
