//! The version-control contract the sync engine is written against.

use std::fmt;
use std::path::PathBuf;

use branchsync_core::BranchName;

use crate::error::VcsError;

/// A full commit object id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitId(pub String);

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CommitId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A resolved reference: its full name plus the commit it pointed at when read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRef {
    /// Full refname, e.g. `refs/heads/main` or `refs/remotes/origin/main`.
    pub refname: String,
    pub oid: CommitId,
}

impl GitRef {
    pub fn new(refname: impl Into<String>, oid: impl Into<String>) -> Self {
        Self {
            refname: refname.into(),
            oid: CommitId(oid.into()),
        }
    }

    /// `refs/heads/main` → `main`, `refs/remotes/origin/main` → `origin/main`.
    pub fn short_name(&self) -> &str {
        self.refname
            .strip_prefix("refs/heads/")
            .or_else(|| self.refname.strip_prefix("refs/remotes/"))
            .unwrap_or(&self.refname)
    }
}

/// Result of a fast-forward-only pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FastForward {
    /// The branch moved forward by this many commits.
    Applied(usize),
    /// Local history is not an ancestor of upstream; nothing was changed.
    Rejected,
    /// The branch is checked out in the worktree at this path; nothing was changed.
    CheckedOutElsewhere(PathBuf),
}

/// Atomic git operations. Implementations are bound to one repository.
pub trait Vcs: Send + Sync {
    /// Update remote-tracking refs for `remote`.
    fn fetch(&self, remote: &str) -> Result<(), VcsError>;

    /// Resolve a local branch, `None` if it does not exist.
    fn resolve_branch(&self, name: &BranchName) -> Result<Option<GitRef>, VcsError>;

    /// Resolve the configured upstream of a local branch, `None` if unset or missing.
    fn resolve_upstream(&self, branch: &GitRef) -> Result<Option<GitRef>, VcsError>;

    /// Commits reachable from `to` but not from `from`, oldest first.
    fn commits_between(&self, from: &GitRef, to: &GitRef) -> Result<Vec<CommitId>, VcsError>;

    /// Move `branch` to `upstream` only if that is a fast-forward.
    fn fast_forward_pull(
        &self,
        remote: &str,
        branch: &GitRef,
        upstream: &GitRef,
    ) -> Result<FastForward, VcsError>;
}
