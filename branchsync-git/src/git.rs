//! [`Vcs`] implementation that drives the `git` executable.
//!
//! Every invocation runs as `git -C <root> …` with terminal prompts disabled,
//! so a detached daemon fails fast instead of waiting on credentials.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use branchsync_core::{BranchName, RepoHandle};

use crate::error::{io_err, VcsError};
use crate::vcs::{CommitId, FastForward, GitRef, Vcs};

/// A git working copy driven through the command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: RepoHandle,
}

impl GitCli {
    /// Resolve the working copy containing `path`.
    pub fn discover(path: &Path) -> Result<Self, VcsError> {
        let output = git_command(path)
            .args(["rev-parse", "--show-toplevel", "--absolute-git-dir"])
            .output()
            .map_err(|e| io_err(path, e))?;

        if !output.status.success() {
            return Err(VcsError::NotARepository {
                path: path.to_path_buf(),
                detail: stderr_of(&output),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());
        match (lines.next(), lines.next()) {
            (Some(root), Some(git_dir)) => Ok(Self::open(RepoHandle::new(root, git_dir))),
            _ => Err(VcsError::NotARepository {
                path: path.to_path_buf(),
                detail: format!("unexpected rev-parse output: {}", stdout.trim()),
            }),
        }
    }

    /// Wrap an already-resolved repository.
    pub fn open(repo: RepoHandle) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &RepoHandle {
        &self.repo
    }

    /// The branch checked out in this working tree, `None` on a detached HEAD.
    pub fn current_branch(&self) -> Result<Option<BranchName>, VcsError> {
        let output = self.run(&["symbolic-ref", "--quiet", "--short", "HEAD"])?;
        match output.status.code() {
            Some(0) => Ok(Some(BranchName::from(stdout_of(&output)))),
            Some(1) => Ok(None),
            _ => Err(command_error(&["symbolic-ref", "HEAD"], &output)),
        }
    }

    /// Remotes configured for this repository.
    pub fn remotes(&self) -> Result<Vec<String>, VcsError> {
        let stdout = self.run_checked(&["remote"])?;
        Ok(stdout.lines().map(str::to_string).collect())
    }

    fn run(&self, args: &[&str]) -> Result<Output, VcsError> {
        git_command(&self.repo.root)
            .args(args)
            .output()
            .map_err(|e| io_err(&self.repo.root, e))
    }

    /// Run and return trimmed stdout, or [`VcsError::Command`] on non-zero exit.
    fn run_checked(&self, args: &[&str]) -> Result<String, VcsError> {
        let output = self.run(args)?;
        if output.status.success() {
            Ok(stdout_of(&output))
        } else {
            Err(command_error(args, &output))
        }
    }

    /// `rev-parse --verify --quiet <rev>^{commit}`: `None` when the rev is unknown.
    fn verify_commit(&self, rev: &str) -> Result<Option<CommitId>, VcsError> {
        let spec = format!("{rev}^{{commit}}");
        let args = ["rev-parse", "--verify", "--quiet", spec.as_str()];
        let output = self.run(&args)?;
        match output.status.code() {
            Some(0) => Ok(Some(CommitId(stdout_of(&output)))),
            Some(1) => Ok(None),
            _ => Err(command_error(&args, &output)),
        }
    }

    fn is_ancestor(&self, ancestor: &CommitId, descendant: &CommitId) -> Result<bool, VcsError> {
        let args = [
            "merge-base",
            "--is-ancestor",
            ancestor.0.as_str(),
            descendant.0.as_str(),
        ];
        let output = self.run(&args)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(command_error(&args, &output)),
        }
    }

    /// The worktree that has `refname` checked out, if any.
    fn worktree_holding(&self, refname: &str) -> Result<Option<PathBuf>, VcsError> {
        let stdout = self.run_checked(&["worktree", "list", "--porcelain"])?;
        let mut worktree = None;
        for line in stdout.lines() {
            if let Some(path) = line.strip_prefix("worktree ") {
                worktree = Some(path);
            } else if line.strip_prefix("branch ") == Some(refname) {
                return Ok(worktree.map(PathBuf::from));
            }
        }
        Ok(None)
    }

    fn count_between(&self, from: &CommitId, to: &CommitId) -> Result<usize, VcsError> {
        let range = format!("{from}..{to}");
        let args = ["rev-list", "--count", range.as_str()];
        let stdout = self.run_checked(&args)?;
        stdout.parse().map_err(|_| VcsError::Command {
            args: args.join(" "),
            status: "0".to_string(),
            stderr: format!("unexpected count output '{stdout}'"),
        })
    }
}

impl Vcs for GitCli {
    fn fetch(&self, remote: &str) -> Result<(), VcsError> {
        let output = self.run(&["fetch", "--quiet", remote])?;
        if output.status.success() {
            tracing::debug!(remote, repo = %self.repo.root.display(), "fetched");
            Ok(())
        } else {
            Err(VcsError::Transport {
                remote: remote.to_string(),
                stderr: stderr_of(&output),
            })
        }
    }

    fn resolve_branch(&self, name: &BranchName) -> Result<Option<GitRef>, VcsError> {
        let refname = format!("refs/heads/{name}");
        Ok(self
            .verify_commit(&refname)?
            .map(|oid| GitRef { refname, oid }))
    }

    fn resolve_upstream(&self, branch: &GitRef) -> Result<Option<GitRef>, VcsError> {
        let upstream = self.run_checked(&[
            "for-each-ref",
            "--format=%(upstream)",
            branch.refname.as_str(),
        ])?;
        if upstream.is_empty() {
            return Ok(None);
        }
        // Configured, but the remote branch may have been deleted.
        Ok(self
            .verify_commit(&upstream)?
            .map(|oid| GitRef { refname: upstream, oid }))
    }

    fn commits_between(&self, from: &GitRef, to: &GitRef) -> Result<Vec<CommitId>, VcsError> {
        let range = format!("{}..{}", from.oid, to.oid);
        let stdout = self.run_checked(&["rev-list", "--reverse", "--topo-order", range.as_str()])?;
        Ok(stdout.lines().map(CommitId::from).collect())
    }

    fn fast_forward_pull(
        &self,
        remote: &str,
        branch: &GitRef,
        upstream: &GitRef,
    ) -> Result<FastForward, VcsError> {
        if !self.is_ancestor(&branch.oid, &upstream.oid)? {
            tracing::debug!(
                branch = branch.short_name(),
                upstream = upstream.short_name(),
                "fast-forward impossible"
            );
            return Ok(FastForward::Rejected);
        }

        let commits = self.count_between(&branch.oid, &upstream.oid)?;
        let checked_out = self
            .current_branch()?
            .map(|current| current.as_str() == branch.short_name())
            .unwrap_or(false);

        if !checked_out {
            // Moving the ref under another worktree would leave its index staging a revert.
            if let Some(worktree) = self.worktree_holding(&branch.refname)? {
                tracing::debug!(
                    branch = branch.short_name(),
                    worktree = %worktree.display(),
                    "branch checked out elsewhere"
                );
                return Ok(FastForward::CheckedOutElsewhere(worktree));
            }
        }

        if checked_out {
            // Moves the ref, index and working tree together.
            self.run_checked(&["merge", "--ff-only", "--quiet", upstream.oid.0.as_str()])?;
        } else {
            // Compare-and-swap on the ref; the working tree belongs to another branch.
            let message = format!("branch-syncer: fast-forward from {remote}");
            self.run_checked(&[
                "update-ref",
                "-m",
                message.as_str(),
                branch.refname.as_str(),
                upstream.oid.0.as_str(),
                branch.oid.0.as_str(),
            ])?;
        }

        tracing::debug!(
            branch = branch.short_name(),
            commits,
            checked_out,
            "fast-forwarded"
        );
        Ok(FastForward::Applied(commits))
    }
}

fn git_command(dir: &Path) -> Command {
    let mut command = Command::new("git");
    command
        .arg("-C")
        .arg(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("LC_ALL", "C");
    command
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn command_error(args: &[&str], output: &Output) -> VcsError {
    VcsError::Command {
        args: args.join(" "),
        status: output.status.to_string(),
        stderr: stderr_of(output),
    }
}

