//! # branchsync-git
//!
//! The git adapter and the fetch → compare → fast-forward decision.
//!
//! Build a [`SyncEngine`] over a [`GitCli`] (or any [`Vcs`]) and call
//! [`SyncEngine::evaluate`] once per poll; every failure comes back as a
//! [`SyncOutcome`](branchsync_core::SyncOutcome) variant rather than an error.

pub mod engine;
pub mod error;
pub mod git;
pub mod vcs;

pub use engine::SyncEngine;
pub use error::VcsError;
pub use git::GitCli;
pub use vcs::{CommitId, FastForward, GitRef, Vcs};
