//! Error types for branchsync-git.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from driving the `git` executable.
#[derive(Debug, Error)]
pub enum VcsError {
    /// `path` is not inside a git working tree.
    #[error("not in a git repository: {path} ({detail})")]
    NotARepository { path: PathBuf, detail: String },

    /// The `git` executable could not be started at all.
    #[error("failed to run git in {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Fetching from the remote failed (network, auth, missing remote).
    #[error("fetch from '{remote}' failed: {stderr}")]
    Transport { remote: String, stderr: String },

    /// Any other git invocation that exited non-zero.
    #[error("`git {args}` failed ({status}): {stderr}")]
    Command {
        args: String,
        status: String,
        stderr: String,
    },
}

/// Convenience constructor for [`VcsError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> VcsError {
    VcsError::Io {
        path: path.into(),
        source,
    }
}
