//! git-branch-syncer: keep local branches fast-forwarded to their upstream.
//!
//! # Usage
//!
//! ```text
//! git-branch-syncer start [BRANCH] [--interval SECS] [--remote NAME] [--foreground]
//! git-branch-syncer stop [BRANCH | all] [--host]
//! git-branch-syncer list [--host] [--json]
//! git-branch-syncer sync [BRANCH] [--remote NAME]
//! git-branch-syncer logs [BRANCH] [--lines N]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonArgs, list::ListArgs, logs::LogsArgs, start::StartArgs, stop::StopArgs,
    sync::SyncArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "git-branch-syncer",
    version,
    about = "Keep local git branches fast-forwarded to their upstream",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a background syncer for a branch of the current repository.
    Start(StartArgs),

    /// Stop a branch's syncer, or `all` of them.
    Stop(StopArgs),

    /// List running syncers.
    List(ListArgs),

    /// Fetch and fast-forward a branch once, in the foreground.
    Sync(SyncArgs),

    /// Print recent log lines of a branch's syncer.
    Logs(LogsArgs),

    /// Body of a detached syncer process.
    #[command(name = "__daemon", hide = true)]
    Daemon(DaemonArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Start(args) => args.run(),
        Commands::Stop(args) => args.run(),
        Commands::List(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Logs(args) => args.run(),
        Commands::Daemon(args) => args.run(),
    }
}
