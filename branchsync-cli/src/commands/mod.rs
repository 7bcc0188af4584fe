//! Subcommands and the repository/config plumbing they share.

pub mod daemon;
pub mod list;
pub mod logs;
pub mod start;
pub mod stop;
pub mod sync;

use anyhow::{bail, Context, Result};

use branchsync_core::{config, BranchName, Config, DiscoveryScope};
use branchsync_daemon::DaemonRegistry;
use branchsync_git::GitCli;

pub fn load_config() -> Result<Config> {
    config::load().context("failed to load ~/.branch-syncer/config.yaml")
}

/// The repository containing the current directory.
pub fn open_repository() -> Result<GitCli> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    Ok(GitCli::discover(&cwd)?)
}

/// `requested`, or the branch checked out in `git`'s working tree.
pub fn resolve_branch(git: &GitCli, requested: Option<&str>) -> Result<BranchName> {
    if let Some(name) = requested {
        return Ok(BranchName::from(name));
    }
    match git.current_branch()? {
        Some(branch) => Ok(branch),
        None => bail!(
            "HEAD is detached in {}; name the branch to sync",
            git.repo().root.display()
        ),
    }
}

/// Fail unless `remote` is configured in `git`'s repository.
pub fn ensure_remote(git: &GitCli, remote: &str) -> Result<()> {
    let remotes = git.remotes()?;
    if !remotes.iter().any(|r| r == remote) {
        bail!(
            "remote '{remote}' is not configured in {}",
            git.repo().root.display()
        );
    }
    Ok(())
}

/// `--host` wins; otherwise the configured scope.
pub fn scope(host: bool, config: &Config) -> DiscoveryScope {
    if host {
        DiscoveryScope::Host
    } else {
        config.scope
    }
}

/// Registry for `scope`. Repository scope needs the current repository.
pub fn registry(scope: DiscoveryScope, git: Option<&GitCli>) -> Result<DaemonRegistry> {
    match scope {
        DiscoveryScope::Host => Ok(DaemonRegistry::host_wide()),
        DiscoveryScope::Repository => match git {
            Some(git) => Ok(DaemonRegistry::for_repository(&git.repo().git_dir)),
            None => Ok(DaemonRegistry::for_repository(&open_repository()?.repo().git_dir)),
        },
    }
}
