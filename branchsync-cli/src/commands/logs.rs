//! `git-branch-syncer logs [BRANCH] [--lines N]`

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use branchsync_daemon::paths;

use super::{open_repository, resolve_branch};

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Branch whose log to show (defaults to the checked-out branch).
    pub branch: Option<String>,

    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,
}

impl LogsArgs {
    pub fn run(self) -> Result<()> {
        let git = open_repository()?;
        let branch = resolve_branch(&git, self.branch.as_deref())?;
        let log = paths::log_path(&git.repo().git_dir, &branch);
        if !log.exists() {
            println!("No syncer has run for '{branch}' in this repository.");
            return Ok(());
        }

        let tail = tail_lines(&log, self.lines)?;
        println!("{}", format!("==> syncer log for '{branch}' ({}) <==", log.display()).bold());
        for line in tail {
            println!("{line}");
        }
        Ok(())
    }
}

/// The last `count` lines of `path`, oldest first.
fn tail_lines(path: &Path, count: usize) -> Result<VecDeque<String>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut tail = VecDeque::with_capacity(count);
    if count == 0 {
        return Ok(tail);
    }
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if tail.len() == count {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Ok(tail)
}
