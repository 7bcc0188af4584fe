//! Optional user configuration at `~/.branch-syncer/config.yaml`.
//!
//! Every field has a default, so a missing file (or an empty one) yields
//! [`Config::default`]. Command-line flags override whatever is loaded here.
//!
//! ```yaml
//! interval_secs: 5
//! remote: origin
//! scope: repository   # or `host`
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};

pub const DEFAULT_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_REMOTE: &str = "origin";

/// Where `list` and `stop all` look for daemons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryScope {
    /// Markers under the current repository's git directory.
    #[default]
    Repository,
    /// Every daemon process on this host.
    Host,
}

impl fmt::Display for DiscoveryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryScope::Repository => write!(f, "repository"),
            DiscoveryScope::Host => write!(f, "host"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between poll iterations.
    pub interval_secs: u64,
    /// Remote fetched and pulled from.
    pub remote: String,
    pub scope: DiscoveryScope,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            remote: DEFAULT_REMOTE.to_string(),
            scope: DiscoveryScope::default(),
        }
    }
}

impl Config {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// `<home>/.branch-syncer/`
pub fn config_dir_at(home: &Path) -> PathBuf {
    home.join(".branch-syncer")
}

/// `<home>/.branch-syncer/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    config_dir_at(home).join("config.yaml")
}

/// Load config from `<home>/.branch-syncer/config.yaml`, defaulting when absent.
pub fn load_at(home: &Path) -> Result<Config, CoreError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(&contents).map_err(|source| {
        CoreError::ConfigParse {
            path: path.clone(),
            source,
        }
    })?;
    validate(&path, &config)?;
    Ok(config)
}

/// `load_at` convenience wrapper using `dirs::home_dir()`.
pub fn load() -> Result<Config, CoreError> {
    load_at(&home()?)
}

fn validate(path: &Path, config: &Config) -> Result<(), CoreError> {
    if config.interval_secs == 0 {
        return Err(CoreError::InvalidConfig {
            path: path.to_path_buf(),
            reason: "interval_secs must be at least 1".to_string(),
        });
    }
    if config.remote.trim().is_empty() {
        return Err(CoreError::InvalidConfig {
            path: path.to_path_buf(),
            reason: "remote must not be empty".to_string(),
        });
    }
    Ok(())
}

fn home() -> Result<PathBuf, CoreError> {
    dirs::home_dir().ok_or(CoreError::HomeNotFound)
}
