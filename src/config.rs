//!
//! Configuration for an EVM session
//!
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::errors::{Error, Result};

/// Seconds added to `block.timestamp` for each block advanced
pub const BLOCK_TIME_SECONDS: u64 = 12;

/// Default max time to wait on a single remote fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub const FORK_URL_ENV: &str = "SIMULAR_FORK_URL";
pub const FORK_BLOCK_ENV: &str = "SIMULAR_FORK_BLOCK";
pub const FORK_TIMEOUT_ENV: &str = "SIMULAR_FORK_TIMEOUT_MS";

/// Settings for a local, in-memory session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvmConfig {
    pub chain_id: u64,
    /// starting block number
    pub block_number: u64,
    /// starting block timestamp. Uses the system clock if not set
    pub timestamp: Option<u64>,
}

impl Default for EvmConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            block_number: 1,
            timestamp: None,
        }
    }
}

impl EvmConfig {
    pub(crate) fn start_timestamp(&self) -> u64 {
        self.timestamp.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default()
        })
    }
}

/// Information related to creating a fork
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateFork {
    /// the url of the RPC endpoint
    pub url: String,
    /// optional block number of the fork. If none, it will use the latest block.
    pub blocknumber: Option<u64>,
    /// max time to wait on each remote request
    pub timeout: Duration,
}

impl CreateFork {
    /// Fork at the given URL and block number
    pub fn new(url: impl Into<String>, blocknumber: Option<u64>) -> Self {
        Self {
            url: url.into(),
            blocknumber,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Fork at the given URL and use the latest block available
    pub fn latest_block(url: impl Into<String>) -> Self {
        Self::new(url, None)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read the fork settings from the environment:
    /// - `SIMULAR_FORK_URL` (required)
    /// - `SIMULAR_FORK_BLOCK` (optional, latest if not set)
    /// - `SIMULAR_FORK_TIMEOUT_MS` (optional)
    pub fn from_env() -> Result<Self> {
        let url = std::env::var(FORK_URL_ENV)
            .map_err(|_| Error::Config(format!("{FORK_URL_ENV} is not set")))?;
        let mut fork = Self::new(url, parse_env(FORK_BLOCK_ENV)?);
        if let Some(ms) = parse_env(FORK_TIMEOUT_ENV)? {
            fork.timeout = Duration::from_millis(ms);
        }
        Ok(fork)
    }
}

fn parse_env(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key} is not a number: '{raw}'"))),
        Err(_) => Ok(None),
    }
}
