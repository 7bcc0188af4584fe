//! branchsync core library: domain types, daemon markers, configuration, errors.
//!
//! - [`types`]: newtypes, targets, records and sync outcomes
//! - [`marker`]: durable per-branch daemon markers under the git directory
//! - [`config`]: optional `~/.branch-syncer/config.yaml`
//! - [`error`]: [`CoreError`]

pub mod config;
pub mod error;
pub mod marker;
pub mod types;

pub use config::{Config, DiscoveryScope};
pub use error::CoreError;
pub use types::{
    BranchName, BranchTarget, DaemonRecord, RepoHandle, SyncOutcome, VcsFailure,
};
