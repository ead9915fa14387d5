//!
//! Read-through cache of remote chain state used by forked sessions.
//!
//! Every account, storage slot and block hash is fetched from the remote provider at
//! most once, at the block pinned when the fork was created. Concurrent readers of the
//! same missing key wait on a single in-flight request. Failed fetches are not cached.
//!
use alloy_primitives::{Address, U256};
use ethers_core::types::{Block, BlockId, BlockNumber, TxHash, H160, H256, U64};
use ethers_providers::{Http, Middleware, Provider, ProviderError};
use parking_lot::Mutex;
use revm::{
    primitives::{AccountInfo, Bytecode, B256},
    DatabaseRef,
};
use std::{collections::HashMap, fmt::Debug, future::Future, hash::Hash, sync::Arc, time::Duration};
use tokio::runtime::{Builder, Handle, RuntimeFlavor};
use tracing::{debug, trace, warn};

use crate::{config::CreateFork, errors::DatabaseError};

pub type HttpProvider = Provider<Http>;

/// Block information of the fork point
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ForkBlock {
    pub number: u64,
    pub timestamp: u64,
    pub chain_id: u64,
}

/// Point queries against a remote chain.
pub trait RemoteProvider: Send + Sync {
    /// Header of the given block, or of the latest block if `None`
    fn block_header(&self, number: Option<u64>) -> Result<ForkBlock, DatabaseError>;

    fn account(&self, address: Address, block: u64) -> Result<AccountInfo, DatabaseError>;

    fn storage(&self, address: Address, slot: U256, block: u64) -> Result<U256, DatabaseError>;

    fn block_hash(&self, number: u64) -> Result<B256, DatabaseError>;
}

/// [`RemoteProvider`] over a json-rpc endpoint
#[derive(Clone, Debug)]
pub struct EthersProvider {
    provider: Arc<HttpProvider>,
    timeout: Duration,
}

impl EthersProvider {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, DatabaseError> {
        let client = Provider::<Http>::try_from(url)
            .map_err(|e| DatabaseError::NetworkFetch(format!("invalid provider url '{url}': {e}")))?;
        Ok(Self {
            provider: Arc::new(client),
            timeout,
        })
    }

    // adapted from revm ethersdb
    #[inline]
    fn block_on<F>(f: F) -> Result<F::Output, DatabaseError>
    where
        F: Future + Send,
        F::Output: Send,
    {
        let runtime = || {
            Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| DatabaseError::Other(format!("failed to start runtime: {e}")))
        };
        match Handle::try_current() {
            Ok(handle) => match handle.runtime_flavor() {
                // tokio doesn't allow a current_thread runtime to block_in_place
                RuntimeFlavor::CurrentThread => std::thread::scope(move |s| {
                    s.spawn(move || runtime().map(|rt| rt.block_on(f)))
                        .join()
                        .map_err(|_| DatabaseError::Other("fetch thread panicked".into()))?
                }),
                _ => Ok(tokio::task::block_in_place(move || handle.block_on(f))),
            },
            Err(_) => Ok(runtime()?.block_on(f)),
        }
    }

    /// Run a request, bounded by the configured timeout
    fn fetch<T, F>(&self, what: String, request: F) -> Result<T, DatabaseError>
    where
        F: Future<Output = Result<T, ProviderError>> + Send,
        T: Send,
    {
        let timeout = self.timeout;
        match Self::block_on(async move { tokio::time::timeout(timeout, request).await })? {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(%e, "remote fetch of {what} failed");
                Err(DatabaseError::NetworkFetch(format!("{what}: {e}")))
            }
            Err(_) => {
                warn!(?timeout, "remote fetch of {what} timed out");
                Err(DatabaseError::NetworkFetch(format!(
                    "{what}: timed out after {timeout:?}"
                )))
            }
        }
    }
}

impl RemoteProvider for EthersProvider {
    fn block_header(&self, number: Option<u64>) -> Result<ForkBlock, DatabaseError> {
        let blockid = match number {
            Some(bn) => BlockId::from(U64::from(bn)),
            None => BlockId::from(BlockNumber::Latest),
        };
        let provider = self.provider.clone();
        let (block, chain_id) = self.fetch("fork block".into(), async move {
            let block = provider.get_block(blockid).await?;
            let chain_id = provider.get_chainid().await?;
            Ok::<_, ProviderError>((block, chain_id))
        })?;

        let block =
            block.ok_or_else(|| DatabaseError::NetworkFetch("fork block not found".into()))?;
        let number = block
            .number
            .ok_or_else(|| DatabaseError::NetworkFetch("got a pending block".into()))?;
        Ok(ForkBlock {
            number: number.as_u64(),
            timestamp: block.timestamp.as_u64(),
            chain_id: chain_id.as_u64(),
        })
    }

    fn account(&self, address: Address, block: u64) -> Result<AccountInfo, DatabaseError> {
        let add = H160::from(address.0 .0);
        let bn: Option<BlockId> = Some(BlockId::from(block));
        let provider = self.provider.clone();

        let (nonce, balance, code) = self.fetch(format!("account {address}"), async move {
            let (nonce, balance, code) = tokio::join!(
                provider.get_transaction_count(add, bn),
                provider.get_balance(add, bn),
                provider.get_code(add, bn)
            );
            Ok::<_, ProviderError>((nonce?, balance?, code?))
        })?;

        let bytecode = Bytecode::new_raw(code.0.into());
        let code_hash = bytecode.hash_slow();
        Ok(AccountInfo::new(
            U256::from_limbs(balance.0),
            nonce.as_u64(),
            code_hash,
            bytecode,
        ))
    }

    fn storage(&self, address: Address, slot: U256, block: u64) -> Result<U256, DatabaseError> {
        let add = H160::from(address.0 .0);
        let bn: Option<BlockId> = Some(BlockId::from(block));
        let index = H256::from(slot.to_be_bytes::<32>());
        let provider = self.provider.clone();

        let value = self.fetch(format!("storage {address}[{slot}]"), async move {
            provider.get_storage_at(add, index, bn).await
        })?;
        Ok(U256::from_be_bytes(value.to_fixed_bytes()))
    }

    fn block_hash(&self, number: u64) -> Result<B256, DatabaseError> {
        let provider = self.provider.clone();
        let block: Option<Block<TxHash>> = self.fetch(format!("block {number}"), async move {
            provider.get_block(BlockId::from(U64::from(number))).await
        })?;
        block
            .and_then(|b| b.hash)
            .map(|h| B256::new(h.0))
            .ok_or(DatabaseError::GetBlockHash(U256::from(number)))
    }
}

/// Map where each key is resolved at most once. Callers racing on the same
/// missing key block until the first one finishes its fetch.
struct SingleFlight<K, V> {
    slots: Mutex<HashMap<K, Arc<Mutex<Option<V>>>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn get_or_fetch<F>(&self, key: K, fetch: F) -> Result<V, DatabaseError>
    where
        F: FnOnce() -> Result<V, DatabaseError>,
    {
        let slot = self.slots.lock().entry(key.clone()).or_default().clone();
        let mut value = slot.lock();
        if let Some(v) = value.as_ref() {
            trace!(?key, "fork cache hit");
            return Ok(v.clone());
        }
        debug!(?key, "fork cache miss");
        let fetched = fetch()?;
        *value = Some(fetched.clone());
        Ok(fetched)
    }

    /// All resolved entries
    fn entries(&self) -> Vec<(K, V)> {
        let slots: Vec<_> = self
            .slots
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        slots
            .into_iter()
            .filter_map(|(k, slot)| slot.lock().clone().map(|v| (k, v)))
            .collect()
    }
}

#[derive(Default)]
struct ForkCache {
    accounts: SingleFlight<Address, AccountInfo>,
    storage: SingleFlight<(Address, U256), U256>,
    block_hashes: SingleFlight<u64, B256>,
}

/// Remote state at a fixed block. Clones share the same cache.
#[derive(Clone)]
pub struct ForkBackend {
    provider: Arc<dyn RemoteProvider>,
    cache: Arc<ForkCache>,
    block: ForkBlock,
}

impl ForkBackend {
    /// Pin the fork at `blocknumber`, or at the latest block
    pub fn new(
        provider: Arc<dyn RemoteProvider>,
        blocknumber: Option<u64>,
    ) -> Result<Self, DatabaseError> {
        let block = provider.block_header(blocknumber)?;
        debug!(?block, "created fork");
        Ok(Self {
            provider,
            cache: Arc::default(),
            block,
        })
    }

    /// Fork from a json-rpc endpoint
    pub fn from_fork(fork: &CreateFork) -> Result<Self, DatabaseError> {
        let provider = EthersProvider::new(&fork.url, fork.timeout)?;
        Self::new(Arc::new(provider), fork.blocknumber)
    }

    pub fn block(&self) -> ForkBlock {
        self.block
    }

    pub fn cached_accounts(&self) -> Vec<(Address, AccountInfo)> {
        self.cache.accounts.entries()
    }

    pub fn cached_storage(&self) -> Vec<((Address, U256), U256)> {
        self.cache.storage.entries()
    }

    pub fn cached_block_hashes(&self) -> Vec<(u64, B256)> {
        self.cache.block_hashes.entries()
    }
}

impl DatabaseRef for ForkBackend {
    type Error = DatabaseError;

    fn basic_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        let block = self.block.number;
        self.cache
            .accounts
            .get_or_fetch(address, || self.provider.account(address, block))
            .map(Some)
    }

    fn code_by_hash_ref(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        // code always arrives with its account
        self.cache
            .accounts
            .entries()
            .into_iter()
            .find(|(_, info)| info.code_hash == code_hash)
            .and_then(|(_, info)| info.code)
            .ok_or(DatabaseError::MissingCode(code_hash))
    }

    fn storage_ref(&self, address: Address, index: U256) -> Result<U256, Self::Error> {
        let block = self.block.number;
        self.cache
            .storage
            .get_or_fetch((address, index), || {
                self.provider.storage(address, index, block)
            })
    }

    fn block_hash_ref(&self, number: U256) -> Result<B256, Self::Error> {
        // no such block
        let Ok(number) = u64::try_from(number) else {
            return Ok(B256::ZERO);
        };
        self.cache
            .block_hashes
            .get_or_fetch(number, || self.provider.block_hash(number))
    }
}
