//! Fixed-interval loop driving one [`SyncEngine`] inside the daemon.
//!
//! Shutdown is a [`CancellationToken`]: the signal task cancels it, and so
//! does a terminal outcome. The token is checked between iterations and
//! interrupts the sleep, never a running iteration.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use branchsync_core::{BranchName, SyncOutcome};
use branchsync_git::{SyncEngine, Vcs};

/// One decision cycle for a branch. Implemented by [`SyncEngine`].
pub trait Evaluate: Send + Sync + 'static {
    fn evaluate(&self, branch: &BranchName) -> SyncOutcome;
}

impl<V: Vcs + 'static> Evaluate for SyncEngine<V> {
    fn evaluate(&self, branch: &BranchName) -> SyncOutcome {
        SyncEngine::evaluate(self, branch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown was requested from outside the loop.
    Cancelled,
    /// The last outcome was terminal.
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopReport {
    pub iterations: u64,
    pub last_outcome: Option<SyncOutcome>,
    pub stop: StopReason,
}

/// Run `engine` for `branch` every `interval` until cancelled or a terminal outcome.
///
/// Each iteration runs on the blocking pool and always completes, so a fetch
/// or pull is never abandoned half way.
pub async fn run_loop<E: Evaluate>(
    engine: Arc<E>,
    branch: BranchName,
    interval: Duration,
    cancel: CancellationToken,
) -> LoopReport {
    let mut iterations = 0;
    let mut last_outcome = None;

    while !cancel.is_cancelled() {
        let task_engine = Arc::clone(&engine);
        let task_branch = branch.clone();
        let outcome = tokio::task::spawn_blocking(move || task_engine.evaluate(&task_branch))
            .await
            .unwrap_or_else(|err| SyncOutcome::UnknownError(format!("sync task failed: {err}")));
        iterations += 1;
        log_outcome(&branch, iterations, &outcome);

        let terminal = outcome.is_terminal();
        last_outcome = Some(outcome);
        if terminal {
            cancel.cancel();
            return LoopReport {
                iterations,
                last_outcome,
                stop: StopReason::Terminal,
            };
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    LoopReport {
        iterations,
        last_outcome,
        stop: StopReason::Cancelled,
    }
}

fn log_outcome(branch: &BranchName, iteration: u64, outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::UpToDate => {
            tracing::debug!(%branch, iteration, outcome = outcome.tag(), "{outcome}")
        }
        SyncOutcome::Synced { commits } => {
            tracing::info!(%branch, iteration, commits, outcome = outcome.tag(), "{outcome}")
        }
        _ => tracing::error!(%branch, iteration, outcome = outcome.tag(), "{outcome}; stopping"),
    }
}
