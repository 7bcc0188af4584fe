//! `git-branch-syncer stop [BRANCH | all] [--host]`

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use branchsync_core::DiscoveryScope;

use super::{load_config, open_repository, registry, resolve_branch, scope};

/// Reserved target meaning every syncer in scope.
pub const ALL: &str = "all";

#[derive(Args, Debug)]
pub struct StopArgs {
    /// Branch whose syncer to stop, or `all` (defaults to the checked-out branch).
    pub target: Option<String>,

    /// Look for syncers across every repository on this host.
    #[arg(long)]
    pub host: bool,

    /// Seconds to wait for each syncer to exit.
    #[arg(long, default_value_t = 15)]
    pub timeout: u64,
}

impl StopArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let scope = scope(self.host, &config);
        let timeout = Duration::from_secs(self.timeout);

        if self.target.as_deref() == Some(ALL) {
            let stopped = registry(scope, None)?.with_stop_timeout(timeout).stop_all()?;
            let place = match scope {
                DiscoveryScope::Repository => "in this repository",
                DiscoveryScope::Host => "on this host",
            };
            if stopped == 0 {
                println!("No syncers running {place}.");
            } else {
                println!("{} stopped {stopped} syncer(s) {place}", "✓".green());
            }
            return Ok(());
        }

        let git = open_repository()?;
        let branch = resolve_branch(&git, self.target.as_deref())?;
        let target = git.repo().target(branch);
        let registry = registry(scope, Some(&git))?.with_stop_timeout(timeout);
        if registry.stop_one(&target)? {
            println!("{} stopped syncer for {target}", "✓".green());
        } else {
            println!("No syncer running for {target}.");
        }
        Ok(())
    }
}
