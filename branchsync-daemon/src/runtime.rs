//! Entry point of the detached daemon process.

use std::sync::Arc;

use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio_util::sync::CancellationToken;

use branchsync_git::{GitCli, SyncEngine};

use crate::error::{io_err, DaemonError};
use crate::lifecycle::{self, DaemonOptions};
use crate::scheduler::{self, LoopReport};

/// Build a current-thread runtime and run the daemon until it stops.
///
/// `detach` moves the process into its own session; foreground runs keep
/// the terminal and get coloured log output.
pub fn start_blocking(options: DaemonOptions, detach: bool) -> Result<LoopReport, DaemonError> {
    init_tracing(!detach);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(options, detach))
}

/// Register, poll, and unregister.
///
/// Signal handlers are installed before the marker is written, so a `stop`
/// that finds the marker always reaches a handler.
pub async fn run(options: DaemonOptions, detach: bool) -> Result<LoopReport, DaemonError> {
    let git = GitCli::discover(&options.repo.root)?;
    let repo = git.repo().clone();
    if repo.git_dir != options.repo.git_dir {
        tracing::warn!(
            expected = %options.repo.git_dir.display(),
            found = %repo.git_dir.display(),
            "git directory moved since start; using the rediscovered one"
        );
    }

    let signals = ShutdownSignals::install()?;
    let guard = lifecycle::daemonize(&repo, &options.branch, detach)?;
    tracing::info!(
        pid = guard.record().pid,
        branch = %options.branch,
        remote = %options.remote,
        interval_secs = options.interval.as_secs(),
        "daemon started"
    );

    let cancel = CancellationToken::new();
    let signal_handle = tokio::spawn(signals.wait(cancel.clone()));

    let engine = Arc::new(SyncEngine::new(git, options.remote.clone()));
    let report = scheduler::run_loop(engine, options.branch.clone(), options.interval, cancel.clone()).await;

    cancel.cancel();
    handle_join("signal_handler", signal_handle.await)?;
    tracing::info!(
        iterations = report.iterations,
        stop = ?report.stop,
        "daemon stopped"
    );
    drop(guard);
    Ok(report)
}

/// SIGTERM, SIGINT and SIGHUP, each folded into one cancellation.
struct ShutdownSignals {
    term: Signal,
    int: Signal,
    hup: Signal,
}

impl ShutdownSignals {
    fn install() -> Result<Self, DaemonError> {
        let install = |kind: SignalKind, name: &str| {
            signal(kind).map_err(|e| io_err(format!("{name} handler"), e))
        };
        Ok(Self {
            term: install(SignalKind::terminate(), "SIGTERM")?,
            int: install(SignalKind::interrupt(), "SIGINT")?,
            hup: install(SignalKind::hangup(), "SIGHUP")?,
        })
    }

    async fn wait(mut self, cancel: CancellationToken) -> Result<(), DaemonError> {
        let received = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = self.term.recv() => "SIGTERM",
            _ = self.int.recv() => "SIGINT",
            _ = self.hup.recv() => "SIGHUP",
        };
        tracing::info!(signal = received, "shutdown requested; finishing current iteration");
        cancel.cancel();
        Ok(())
    }
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Runtime(format!("{task} task join failure: {err}"))),
    }
}

/// Initialise the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing(ansi: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(ansi)
        .try_init();
}
