//! Domain types for branch synchronization daemons.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! Records are serialized to JSON markers via serde.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed local branch name (`main`, `feature/x`), never a full ref.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(pub String);

impl BranchName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for BranchName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for BranchName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Repository + target
// ---------------------------------------------------------------------------

/// A resolved git working copy. Built once at startup, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoHandle {
    /// Absolute path of the working tree root.
    pub root: PathBuf,
    /// Absolute path of the git metadata directory (`.git` or a worktree gitdir).
    pub git_dir: PathBuf,
}

impl RepoHandle {
    pub fn new(root: impl Into<PathBuf>, git_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            git_dir: git_dir.into(),
        }
    }

    pub fn target(&self, branch: BranchName) -> BranchTarget {
        BranchTarget {
            repo: self.root.clone(),
            branch,
        }
    }
}

/// The unit of singleton enforcement: one repository root plus one branch.
///
/// Field order matters: the derived `Ord` sorts by repository, then branch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BranchTarget {
    pub repo: PathBuf,
    pub branch: BranchName,
}

impl BranchTarget {
    pub fn new(repo: impl Into<PathBuf>, branch: impl Into<BranchName>) -> Self {
        Self {
            repo: repo.into(),
            branch: branch.into(),
        }
    }
}

impl fmt::Display for BranchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' in {}", self.branch, self.repo.display())
    }
}

/// The discoverable state of one running daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonRecord {
    pub pid: u32,
    #[serde(flatten)]
    pub target: BranchTarget,
    pub started_at: DateTime<Utc>,
}

impl DaemonRecord {
    pub fn new(pid: u32, target: BranchTarget) -> Self {
        Self {
            pid,
            target,
            started_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a git step failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum VcsFailure {
    /// Fetch could not reach or read from the remote.
    Transport(String),
    /// Local and upstream both have commits the other lacks.
    Diverged,
    /// The branch is checked out in another worktree, whose files would be left behind.
    CheckedOutElsewhere(PathBuf),
    /// Any other non-zero git exit.
    Command(String),
}

impl fmt::Display for VcsFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VcsFailure::Transport(msg) => write!(f, "fetch failed: {msg}"),
            VcsFailure::Diverged => {
                write!(f, "local and upstream have diverged; refusing to merge")
            }
            VcsFailure::CheckedOutElsewhere(worktree) => write!(
                f,
                "branch is checked out in another worktree at {}; refusing to move it",
                worktree.display()
            ),
            VcsFailure::Command(msg) => write!(f, "git failed: {msg}"),
        }
    }
}

/// Result of one fetch → compare → fast-forward cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum SyncOutcome {
    UpToDate,
    Synced { commits: usize },
    NoUpstream,
    NotFound,
    VcsError(VcsFailure),
    UnknownError(String),
}

impl SyncOutcome {
    /// Terminal outcomes stop the daemon; `UpToDate` and `Synced` keep it polling.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncOutcome::UpToDate | SyncOutcome::Synced { .. })
    }

    /// Snake-case tag, stable for logs and JSON.
    pub fn tag(&self) -> &'static str {
        match self {
            SyncOutcome::UpToDate => "up_to_date",
            SyncOutcome::Synced { .. } => "synced",
            SyncOutcome::NoUpstream => "no_upstream",
            SyncOutcome::NotFound => "not_found",
            SyncOutcome::VcsError(_) => "vcs_error",
            SyncOutcome::UnknownError(_) => "unknown_error",
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::UpToDate => write!(f, "already up to date"),
            SyncOutcome::Synced { commits } => write!(f, "fast-forwarded {commits} commit(s)"),
            SyncOutcome::NoUpstream => write!(f, "branch is not tracking a remote branch"),
            SyncOutcome::NotFound => write!(f, "branch not found"),
            SyncOutcome::VcsError(failure) => failure.fmt(f),
            SyncOutcome::UnknownError(msg) => write!(f, "unexpected error: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
