//!
//! Provides access to EVM storage
//!
//! All local changes live in a revm `CacheDB`. Whatever the cache doesn't have comes
//! from the backing database: nothing (in-memory), a remote fork, or nothing but
//! errors (offline replay of a fork snapshot).
//!
use alloy_primitives::{Address, U256};
use revm::{
    db::{AccountState, CacheDB, DatabaseRef, EmptyDB},
    primitives::{
        Account, AccountInfo, Bytecode, Env, HashMap as Map, ResultAndState, B256, KECCAK_EMPTY,
    },
    Database, DatabaseCommit, EvmBuilder,
};
use std::collections::BTreeMap;
use tracing::info;

use crate::{
    config::EvmConfig,
    errors::{DatabaseError, Result},
    forkdb::ForkBackend,
    snapshot::{SnapShot, SnapShotAccountRecord, SnapShotSource, SNAPSHOT_VERSION},
};

/// Where the cache goes for state it doesn't have
#[derive(Clone)]
pub enum BackingDb {
    /// Every account exists and is empty
    Empty(EmptyDB),
    Fork(ForkBackend),
    /// Nothing outside the cache is known
    Offline,
}

impl DatabaseRef for BackingDb {
    type Error = DatabaseError;

    fn basic_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        match self {
            // always `Some` so the cache never marks an account as `NotExisting`
            BackingDb::Empty(_) => Ok(Some(AccountInfo::default())),
            BackingDb::Fork(fork) => fork.basic_ref(address),
            BackingDb::Offline => Err(DatabaseError::UncachedAccount(address)),
        }
    }

    fn code_by_hash_ref(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        match self {
            BackingDb::Empty(db) => Ok(db.code_by_hash_ref(code_hash)?),
            BackingDb::Fork(fork) => fork.code_by_hash_ref(code_hash),
            BackingDb::Offline => Err(DatabaseError::MissingCode(code_hash)),
        }
    }

    fn storage_ref(&self, address: Address, index: U256) -> Result<U256, Self::Error> {
        match self {
            BackingDb::Empty(db) => Ok(db.storage_ref(address, index)?),
            BackingDb::Fork(fork) => fork.storage_ref(address, index),
            BackingDb::Offline => Err(DatabaseError::UncachedStorage(address, index)),
        }
    }

    fn block_hash_ref(&self, number: U256) -> Result<B256, Self::Error> {
        match self {
            BackingDb::Empty(db) => Ok(db.block_hash_ref(number)?),
            BackingDb::Fork(fork) => fork.block_hash_ref(number),
            BackingDb::Offline => Err(DatabaseError::UncachedBlockHash(number)),
        }
    }
}

// Used by the EVM to access storage. The EVM delegates transact() to this module.
pub struct StorageBackend {
    db: CacheDB<BackingDb>,
    source: SnapShotSource,
    pub block_number: u64,
    pub timestamp: u64,
    pub chain_id: u64,
}

impl Default for StorageBackend {
    fn default() -> Self {
        StorageBackend::new(&EvmConfig::default())
    }
}

impl StorageBackend {
    /// In-memory storage
    pub fn new(config: &EvmConfig) -> Self {
        Self {
            db: CacheDB::new(BackingDb::Empty(EmptyDB::default())),
            source: SnapShotSource::Memory,
            block_number: config.block_number,
            timestamp: config.start_timestamp(),
            chain_id: config.chain_id,
        }
    }

    /// Storage backed by a remote fork, starting at the fork block
    pub fn fork(backend: ForkBackend) -> Self {
        let block = backend.block();
        Self {
            db: CacheDB::new(BackingDb::Fork(backend)),
            source: SnapShotSource::Fork,
            block_number: block.number,
            timestamp: block.timestamp,
            chain_id: block.chain_id,
        }
    }

    /// Load a snapshot. Fork snapshots are replayed offline.
    pub fn from_snapshot(snapshot: SnapShot) -> Self {
        let backing = match snapshot.source {
            SnapShotSource::Memory => BackingDb::Empty(EmptyDB::default()),
            SnapShotSource::Fork => BackingDb::Offline,
        };
        let mut db = CacheDB::new(backing);

        for (addr, account) in snapshot.accounts.into_iter() {
            // note: this will populate both 'accounts' and 'contracts'
            db.insert_account_info(
                addr,
                AccountInfo {
                    balance: account.balance,
                    nonce: account.nonce,
                    code_hash: KECCAK_EMPTY,
                    code: (!account.code.is_empty()).then(|| Bytecode::new_raw(account.code)),
                },
            );

            // ... but we still need to load the account storage map
            let db_account = db.accounts.entry(addr).or_default();
            db_account.storage = account.storage.into_iter().collect();
            if account.storage_complete {
                db_account.account_state = AccountState::StorageCleared;
            }
        }
        for (number, hash) in snapshot.block_hashes {
            db.block_hashes.insert(U256::from(number), hash);
        }

        info!(
            source = ?snapshot.source,
            block = snapshot.block_num,
            "loaded snapshot"
        );
        Self {
            db,
            source: snapshot.source,
            block_number: snapshot.block_num,
            timestamp: snapshot.timestamp,
            chain_id: snapshot.chain_id,
        }
    }

    pub fn source(&self) -> SnapShotSource {
        self.source
    }

    pub fn insert_account_info(&mut self, address: Address, info: AccountInfo) {
        self.db.insert_account_info(address, info)
    }

    /// Create (or overwrite) an account. Its storage starts out empty.
    pub fn create_account(&mut self, address: Address, info: AccountInfo) {
        self.db.insert_account_info(address, info);
        let account = self.db.accounts.entry(address).or_default();
        account.storage.clear();
        account.account_state = AccountState::StorageCleared;
    }

    pub fn run_transact(&mut self, env: Box<Env>) -> Result<ResultAndState> {
        let mut evm = EvmBuilder::default()
            .with_db(&mut self.db)
            .with_env(env)
            .build();
        Ok(evm.transact()?)
    }

    /// Advance `n` blocks of `block_time` seconds each
    pub fn advance_block(&mut self, n: u64, block_time: u64) {
        self.block_number += n;
        self.timestamp += n * block_time;
    }

    /// Create a snapshot of the current state. For a fork this includes everything
    /// fetched from the remote chain so far.
    pub fn create_snapshot(&self) -> Result<SnapShot> {
        let mut accounts: BTreeMap<Address, SnapShotAccountRecord> = BTreeMap::new();
        let mut block_hashes = BTreeMap::new();

        if let BackingDb::Fork(fork) = &self.db.db {
            for (address, info) in fork.cached_accounts() {
                let code = info.code.map(|c| c.original_bytes()).unwrap_or_default();
                accounts.insert(
                    address,
                    SnapShotAccountRecord {
                        nonce: info.nonce,
                        balance: info.balance,
                        code,
                        ..Default::default()
                    },
                );
            }
            for ((address, slot), value) in fork.cached_storage() {
                // a slot is only usable offline if its account is known too
                if let Some(record) = accounts.get_mut(&address) {
                    record.storage.insert(slot, value);
                }
            }
            block_hashes.extend(fork.cached_block_hashes());
        }

        // local changes override what came from the fork
        for (address, account) in &self.db.accounts {
            let code = match &account.info.code {
                Some(code) => code.clone(),
                None => self.db.code_by_hash_ref(account.info.code_hash)?,
            };
            let record = accounts.entry(*address).or_default();
            record.nonce = account.info.nonce;
            record.balance = account.info.balance;
            record.code = code.original_bytes();
            if matches!(
                account.account_state,
                AccountState::StorageCleared | AccountState::NotExisting
            ) {
                record.storage.clear();
                record.storage_complete = true;
            }
            record.storage.extend(account.storage.iter().map(|(k, v)| (*k, *v)));
        }
        for (number, hash) in &self.db.block_hashes {
            if let Ok(number) = u64::try_from(*number) {
                block_hashes.insert(number, *hash);
            }
        }

        Ok(SnapShot {
            version: SNAPSHOT_VERSION,
            source: self.source,
            block_num: self.block_number,
            timestamp: self.timestamp,
            chain_id: self.chain_id,
            accounts,
            block_hashes,
        })
    }
}

impl DatabaseRef for StorageBackend {
    type Error = DatabaseError;

    fn basic_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        self.db.basic_ref(address)
    }

    fn code_by_hash_ref(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        self.db.code_by_hash_ref(code_hash)
    }

    fn storage_ref(&self, address: Address, index: U256) -> Result<U256, Self::Error> {
        DatabaseRef::storage_ref(&self.db, address, index)
    }

    fn block_hash_ref(&self, number: U256) -> Result<B256, Self::Error> {
        self.db.block_hash_ref(number)
    }
}

impl Database for StorageBackend {
    type Error = DatabaseError;

    fn basic(&mut self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        self.db.basic(address)
    }

    fn code_by_hash(&mut self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        self.db.code_by_hash(code_hash)
    }

    fn storage(&mut self, address: Address, index: U256) -> Result<U256, Self::Error> {
        Database::storage(&mut self.db, address, index)
    }

    fn block_hash(&mut self, number: U256) -> Result<B256, Self::Error> {
        self.db.block_hash(number)
    }
}

impl DatabaseCommit for StorageBackend {
    fn commit(&mut self, changes: Map<Address, Account>) {
        self.db.commit(changes)
    }
}
