//! branchsync daemon: detached per-branch sync loops and their discovery.
//!
//! - [`lifecycle`]: spawn, detach, register, signal
//! - [`registry`]: list, find, and stop running daemons
//! - [`scheduler`]: the cancellable polling loop
//! - [`start_blocking`]: the daemon process entry point

mod error;
pub mod lifecycle;
pub mod log_rotation;
pub mod paths;
pub mod registry;
mod runtime;
pub mod scheduler;

pub use error::DaemonError;
pub use lifecycle::{spawn_daemon, DaemonOptions, Spawned, EXIT_TERMINAL};
pub use registry::{DaemonRegistry, ProcessControl, ProcessDirectory};
pub use runtime::{init_tracing, run, start_blocking};
pub use scheduler::{LoopReport, StopReason};
