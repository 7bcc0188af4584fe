//! One synchronization decision for one branch.
//!
//! Shared by the one-shot `sync` command and the daemon's scheduler loop.

use branchsync_core::{BranchName, SyncOutcome, VcsFailure};

use crate::error::VcsError;
use crate::vcs::{FastForward, Vcs};

/// Runs fetch → resolve → compare → fast-forward against one repository.
#[derive(Debug)]
pub struct SyncEngine<V> {
    vcs: V,
    remote: String,
}

impl<V: Vcs> SyncEngine<V> {
    pub fn new(vcs: V, remote: impl Into<String>) -> Self {
        Self {
            vcs,
            remote: remote.into(),
        }
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Decide and apply one sync step for `branch`.
    ///
    /// Only fetch and the fast-forward touch the repository. Diverged history
    /// is never merged or rebased; it comes back as a terminal `VcsError`.
    pub fn evaluate(&self, branch: &BranchName) -> SyncOutcome {
        if let Err(err) = self.vcs.fetch(&self.remote) {
            return outcome_for(branch, err);
        }

        let local = match self.vcs.resolve_branch(branch) {
            Ok(Some(local)) => local,
            Ok(None) => {
                tracing::error!(branch = %branch, "branch not found");
                return SyncOutcome::NotFound;
            }
            Err(err) => return outcome_for(branch, err),
        };

        let upstream = match self.vcs.resolve_upstream(&local) {
            Ok(Some(upstream)) => upstream,
            Ok(None) => {
                tracing::error!(branch = %branch, "branch is not tracking a remote branch");
                return SyncOutcome::NoUpstream;
            }
            Err(err) => return outcome_for(branch, err),
        };

        let behind = match self.vcs.commits_between(&local, &upstream) {
            Ok(behind) => behind,
            Err(err) => return outcome_for(branch, err),
        };
        if behind.is_empty() {
            tracing::debug!(branch = %branch, upstream = upstream.short_name(), "already up to date");
            return SyncOutcome::UpToDate;
        }

        tracing::info!(
            branch = %branch,
            upstream = upstream.short_name(),
            commits = behind.len(),
            "found new commit(s), fast-forwarding",
        );
        match self.vcs.fast_forward_pull(&self.remote, &local, &upstream) {
            Ok(FastForward::Applied(_)) => {
                tracing::info!(branch = %branch, commits = behind.len(), "synced with remote");
                SyncOutcome::Synced {
                    commits: behind.len(),
                }
            }
            Ok(FastForward::Rejected) => {
                tracing::error!(
                    branch = %branch,
                    upstream = upstream.short_name(),
                    "local and upstream have diverged; refusing to merge",
                );
                SyncOutcome::VcsError(VcsFailure::Diverged)
            }
            Ok(FastForward::CheckedOutElsewhere(worktree)) => {
                tracing::error!(
                    branch = %branch,
                    worktree = %worktree.display(),
                    "branch is checked out in another worktree; refusing to move it",
                );
                SyncOutcome::VcsError(VcsFailure::CheckedOutElsewhere(worktree))
            }
            Err(err) => outcome_for(branch, err),
        }
    }
}

/// Fold an adapter error into the outcome the scheduler understands.
fn outcome_for(branch: &BranchName, err: VcsError) -> SyncOutcome {
    tracing::error!(branch = %branch, error = %err, "sync step failed");
    match err {
        VcsError::Transport { .. } => SyncOutcome::VcsError(VcsFailure::Transport(err.to_string())),
        VcsError::Command { .. } => SyncOutcome::VcsError(VcsFailure::Command(err.to_string())),
        VcsError::Io { .. } | VcsError::NotARepository { .. } => {
            SyncOutcome::UnknownError(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::vcs::{CommitId, GitRef};

    /// Scripted adapter that records which operations ran.
    struct ScriptedVcs {
        fetch_ok: bool,
        branch: Option<GitRef>,
        upstream: Option<GitRef>,
        behind: usize,
        fast_forward: FastForward,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedVcs {
        fn behind(behind: usize) -> Self {
            Self {
                fetch_ok: true,
                branch: Some(GitRef::new("refs/heads/main", "aaa")),
                upstream: Some(GitRef::new("refs/remotes/origin/main", "bbb")),
                behind,
                fast_forward: FastForward::Applied(behind),
                calls: Mutex::new(vec![]),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().expect("calls lock").clone()
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().expect("calls lock").push(call);
        }
    }

    impl Vcs for ScriptedVcs {
        fn fetch(&self, remote: &str) -> Result<(), VcsError> {
            self.record("fetch");
            if self.fetch_ok {
                Ok(())
            } else {
                Err(VcsError::Transport {
                    remote: remote.to_string(),
                    stderr: "could not resolve host".to_string(),
                })
            }
        }

        fn resolve_branch(&self, _name: &BranchName) -> Result<Option<GitRef>, VcsError> {
            self.record("resolve_branch");
            Ok(self.branch.clone())
        }

        fn resolve_upstream(&self, _branch: &GitRef) -> Result<Option<GitRef>, VcsError> {
            self.record("resolve_upstream");
            Ok(self.upstream.clone())
        }

        fn commits_between(&self, _from: &GitRef, _to: &GitRef) -> Result<Vec<CommitId>, VcsError> {
            self.record("commits_between");
            Ok((0..self.behind).map(|i| CommitId(format!("c{i}"))).collect())
        }

        fn fast_forward_pull(
            &self,
            _remote: &str,
            _branch: &GitRef,
            _upstream: &GitRef,
        ) -> Result<FastForward, VcsError> {
            self.record("fast_forward_pull");
            Ok(self.fast_forward.clone())
        }
    }

    fn main_branch() -> BranchName {
        BranchName::from("main")
    }

    #[test]
    fn new_commits_are_fast_forwarded() {
        let engine = SyncEngine::new(ScriptedVcs::behind(3), "origin");
        assert_eq!(engine.evaluate(&main_branch()), SyncOutcome::Synced { commits: 3 });
        assert_eq!(
            engine.vcs().calls(),
            vec![
                "fetch",
                "resolve_branch",
                "resolve_upstream",
                "commits_between",
                "fast_forward_pull"
            ]
        );
    }

    #[test]
    fn up_to_date_never_pulls() {
        let engine = SyncEngine::new(ScriptedVcs::behind(0), "origin");
        assert_eq!(engine.evaluate(&main_branch()), SyncOutcome::UpToDate);
        assert!(!engine.vcs().calls().contains(&"fast_forward_pull"));
    }

    #[test]
    fn rejected_fast_forward_is_divergence() {
        let mut vcs = ScriptedVcs::behind(1);
        vcs.fast_forward = FastForward::Rejected;
        let engine = SyncEngine::new(vcs, "origin");
        let outcome = engine.evaluate(&main_branch());
        assert_eq!(outcome, SyncOutcome::VcsError(VcsFailure::Diverged));
        assert!(outcome.is_terminal());
    }

    #[test]
    fn branch_held_by_another_worktree_is_terminal() {
        let mut vcs = ScriptedVcs::behind(1);
        vcs.fast_forward = FastForward::CheckedOutElsewhere("/work/wt".into());
        let engine = SyncEngine::new(vcs, "origin");
        let outcome = engine.evaluate(&main_branch());
        assert_eq!(
            outcome,
            SyncOutcome::VcsError(VcsFailure::CheckedOutElsewhere("/work/wt".into()))
        );
        assert!(outcome.is_terminal());
        assert!(outcome.to_string().contains("/work/wt"));
    }

    #[test]
    fn fetch_failure_stops_before_resolving() {
        let mut vcs = ScriptedVcs::behind(2);
        vcs.fetch_ok = false;
        let engine = SyncEngine::new(vcs, "origin");
        match engine.evaluate(&main_branch()) {
            SyncOutcome::VcsError(VcsFailure::Transport(msg)) => {
                assert!(msg.contains("could not resolve host"), "got: {msg}")
            }
            other => panic!("expected transport failure, got {other:?}"),
        }
        assert_eq!(engine.vcs().calls(), vec!["fetch"]);
    }

    #[test]
    fn missing_branch_is_not_found_after_fetch() {
        let mut vcs = ScriptedVcs::behind(2);
        vcs.branch = None;
        let engine = SyncEngine::new(vcs, "origin");
        assert_eq!(engine.evaluate(&main_branch()), SyncOutcome::NotFound);
        assert_eq!(engine.vcs().calls(), vec!["fetch", "resolve_branch"]);
    }

    #[test]
    fn missing_upstream_is_no_upstream() {
        let mut vcs = ScriptedVcs::behind(2);
        vcs.upstream = None;
        let engine = SyncEngine::new(vcs, "origin");
        assert_eq!(engine.evaluate(&main_branch()), SyncOutcome::NoUpstream);
        assert!(!engine.vcs().calls().contains(&"commits_between"));
    }

    #[rstest::rstest]
    #[case::transport(
        VcsError::Transport { remote: "origin".into(), stderr: "connection refused".into() },
        "vcs_error"
    )]
    #[case::command(
        VcsError::Command { args: "merge --ff-only".into(), status: "exit status: 128".into(), stderr: "index.lock exists".into() },
        "vcs_error"
    )]
    #[case::spawn(
        VcsError::Io {
            path: "/repo".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "git not on PATH"),
        },
        "unknown_error"
    )]
    #[case::vanished_repo(
        VcsError::NotARepository { path: "/repo".into(), detail: "gone".into() },
        "unknown_error"
    )]
    fn adapter_errors_map_to_terminal_outcomes(#[case] err: VcsError, #[case] tag: &str) {
        let detail = err.to_string();
        let outcome = outcome_for(&main_branch(), err);
        assert_eq!(outcome.tag(), tag);
        assert!(outcome.is_terminal());
        assert!(outcome.to_string().contains(&detail), "got: {outcome}");
    }
}
