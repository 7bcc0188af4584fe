//! `git-branch-syncer list [--host] [--json]`

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use branchsync_core::{DaemonRecord, DiscoveryScope};

use super::{load_config, registry, scope};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// List syncers across every repository on this host.
    #[arg(long)]
    pub host: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct SyncerRow {
    #[tabled(rename = "branch")]
    branch: String,
    #[tabled(rename = "pid")]
    pid: u32,
    #[tabled(rename = "started")]
    started: String,
    #[tabled(rename = "uptime")]
    uptime: String,
}

impl ListArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config()?;
        let scope = scope(self.host, &config);
        let records = registry(scope, None)?.list()?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&records).context("failed to serialize syncer list")?
            );
            return Ok(());
        }

        print_table(scope, records);
        Ok(())
    }
}

fn print_table(scope: DiscoveryScope, records: Vec<DaemonRecord>) {
    if records.is_empty() {
        match scope {
            DiscoveryScope::Repository => println!("No syncers running in this repository."),
            DiscoveryScope::Host => println!("No syncers running on this host."),
        }
        return;
    }

    // Records arrive ordered by repository then branch.
    let mut grouped = BTreeMap::<PathBuf, Vec<DaemonRecord>>::new();
    for record in records {
        grouped.entry(record.target.repo.clone()).or_default().push(record);
    }

    for (repo, records) in grouped {
        println!("{}", repo.display().to_string().bold());
        let rows: Vec<SyncerRow> = records
            .into_iter()
            .map(|record| SyncerRow {
                branch: record.target.branch.to_string(),
                pid: record.pid,
                started: record.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                uptime: format_age(record.started_at),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }
}

fn format_age(since: DateTime<Utc>) -> String {
    let seconds = Utc::now().signed_duration_since(since).num_seconds().max(0) as u64;
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
