//!
//! Containers for serializing EVM state information
//!
//! A [`SnapShot`] is written as json. The format carries a version number and
//! loading a snapshot written with a different version fails instead of guessing.
//!
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::{
    errors::{Error, Result},
    evm::{BaseEvm, Engine},
};

/// Current snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Source of the snapshot. Either from a fork or the local in-memory database.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum SnapShotSource {
    /// State the snapshot doesn't have is empty
    #[default]
    Memory,
    /// State the snapshot doesn't have was never fetched from the remote chain.
    /// Restored sessions fail when they touch it.
    Fork,
}

/// A single AccountRecord and it's associated storage. `SnapShot` stores
/// a map of Accounts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapShotAccountRecord {
    pub nonce: u64,
    pub balance: U256,
    pub code: Bytes,
    pub storage: BTreeMap<U256, U256>,
    /// `storage` holds every non-zero slot of the account, for example because it
    /// was created locally. Otherwise it only holds the slots read or written.
    #[serde(default)]
    pub storage_complete: bool,
}

/// The high-level objects containing all the snapshot information.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapShot {
    pub version: u32,
    pub source: SnapShotSource,
    pub block_num: u64,
    pub timestamp: u64,
    pub chain_id: u64,
    pub accounts: BTreeMap<Address, SnapShotAccountRecord>,
    #[serde(default)]
    pub block_hashes: BTreeMap<u64, B256>,
}

impl Default for SnapShot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            source: SnapShotSource::default(),
            block_num: 0,
            timestamp: 0,
            chain_id: 1,
            accounts: BTreeMap::new(),
            block_hashes: BTreeMap::new(),
        }
    }
}

#[derive(Deserialize)]
struct VersionHeader {
    version: Option<u32>,
}

impl SnapShot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::StateLoad(e.to_string()))
    }

    /// Parse a snapshot, checking the version before anything else
    pub fn from_json(raw: &str) -> Result<Self> {
        let header: VersionHeader = serde_json::from_str(raw)
            .map_err(|e| Error::StateLoad(format!("not a snapshot: {e}")))?;
        match header.version {
            Some(SNAPSHOT_VERSION) => {}
            Some(other) => {
                return Err(Error::StateLoad(format!(
                    "incompatible snapshot version {other}, expected {SNAPSHOT_VERSION}"
                )))
            }
            None => return Err(Error::StateLoad("snapshot has no version".into())),
        }
        serde_json::from_str(raw).map_err(|e| Error::StateLoad(e.to_string()))
    }
}

/// Capture the state of a session as an opaque blob
pub fn capture_snapshot<E: Engine + ?Sized>(session: &E) -> Result<String> {
    let snapshot = session.create_snapshot()?;
    info!(
        accounts = snapshot.accounts.len(),
        block = snapshot.block_num,
        "captured snapshot"
    );
    snapshot.to_json()
}

/// Start a new session from a blob made by [`capture_snapshot`]
pub fn restore_snapshot(blob: &str) -> Result<BaseEvm> {
    let snapshot = SnapShot::from_json(blob)?;
    Ok(BaseEvm::new_from_snapshot(snapshot))
}
