//!
//! An API to interact with an embedded Ethereum Virtual Machine.
//!
//! This is wrapper around [REVM](https://docs.rs/revm/latest/revm/index.html). [`Engine`] is the
//! boundary the contract layer drives, [`BaseEvm`] implements it over a [`StorageBackend`].
//!
use alloy_primitives::{Address, Bytes, U256};
use revm::{
    primitives::{
        Account, AccountInfo, Env, ExecutionResult, HashMap as Map, Log, Output, ResultAndState,
        TransactTo,
    },
    Database, DatabaseCommit, DatabaseRef,
};
use tracing::debug;

use crate::{
    config::{CreateFork, EvmConfig, BLOCK_TIME_SECONDS},
    errors::{Error, Result},
    forkdb::ForkBackend,
    snapshot::SnapShot,
    storage::StorageBackend,
};

/// type alias for a `revm` hashmap of `Address` => `Account`
type StateChangeSet = Map<Address, Account>;

/// Operations a contract handle needs from an execution engine.
///
/// `deploy` and `transact` either commit all of their changes or none. `call` and
/// `simulate` never change state.
pub trait Engine {
    /// Create an account with an optional balance, overwriting any existing account.
    fn create_account(&mut self, address: Address, balance: Option<U256>) -> Result<()>;

    fn get_balance(&self, address: Address) -> Result<U256>;

    /// Move `value` from `caller` to `to`. Fails with `InsufficientBalance` if
    /// `caller` can't cover it.
    fn transfer(&mut self, caller: Address, to: Address, value: U256) -> Result<()>;

    /// Deploy `code` (bytecode followed by encoded constructor args). Returns the new address.
    fn deploy(&mut self, caller: Address, code: Vec<u8>, value: U256) -> Result<Address>;

    /// Read-only call
    fn call(&mut self, to: Address, data: Vec<u8>) -> Result<CallResult>;

    /// Send a transaction and commit the changes
    fn transact(
        &mut self,
        caller: Address,
        to: Address,
        data: Vec<u8>,
        value: U256,
    ) -> Result<CallResult>;

    /// Run a transaction and throw away the changes
    fn simulate(
        &mut self,
        caller: Address,
        to: Address,
        data: Vec<u8>,
        value: U256,
    ) -> Result<CallResult>;

    /// Advance `block.number` by `blocks` and `block.timestamp` by
    /// `blocks * BLOCK_TIME_SECONDS`
    fn advance_block(&mut self, blocks: u64);

    /// Raw storage slot as 32 little-endian bytes
    fn view_storage_slot(&mut self, address: Address, slot: U256) -> Result<[u8; 32]>;

    fn create_snapshot(&self) -> Result<SnapShot>;
}

/// Container for the results of a transaction
#[derive(Clone, Debug)]
pub struct CallResult {
    /// The raw result of the call.
    pub result: Bytes,
    /// An address if the call is a TransactTo::create (deploy)
    pub address: Option<Address>,
    /// The gas used for the call
    pub gas_used: u64,
    /// Refunded gas
    pub gas_refunded: u64,
    /// The logs emitted during the call
    pub logs: Vec<Log>,
    /// Changes made to the database
    pub state_changeset: Option<StateChangeSet>,
}

/// EVM that supports in-memory, forked, and restored storage.
pub struct BaseEvm {
    backend: StorageBackend,
}

/// Create an EVM with the in-memory database
impl Default for BaseEvm {
    fn default() -> Self {
        BaseEvm::new(EvmConfig::default())
    }
}

impl BaseEvm {
    /// Create an instance of the EVM using the in-memory database
    pub fn new(config: EvmConfig) -> Self {
        Self {
            backend: StorageBackend::new(&config),
        }
    }

    /// Create an instance of the EVM backed by a remote fork
    pub fn fork(fork: &CreateFork) -> Result<Self> {
        let backend = ForkBackend::from_fork(fork)?;
        Ok(Self::fork_with_backend(backend))
    }

    /// Fork with an existing backend. Sessions made from clones of one backend
    /// share its cache of remote state.
    pub fn fork_with_backend(backend: ForkBackend) -> Self {
        Self {
            backend: StorageBackend::fork(backend),
        }
    }

    /// Create an instance of the EVM and load it's state from the `SnapShot`.
    pub fn new_from_snapshot(snap: SnapShot) -> Self {
        Self {
            backend: StorageBackend::from_snapshot(snap),
        }
    }

    pub fn block_number(&self) -> u64 {
        self.backend.block_number
    }

    pub fn timestamp(&self) -> u64 {
        self.backend.timestamp
    }

    /// Set the balance for the given `address` with the given `amount`
    pub fn set_balance(&mut self, address: Address, amount: U256) -> Result<&mut Self> {
        let mut account = self.backend.basic_ref(address)?.unwrap_or_default();
        account.balance = amount;

        self.backend.insert_account_info(address, account);
        Ok(self)
    }

    fn build_env(
        &self,
        caller: Option<Address>,
        transact_to: TransactTo,
        data: Bytes,
        value: U256,
    ) -> Box<Env> {
        let mut env = Env::default();
        env.cfg.chain_id = self.backend.chain_id;
        env.block.number = U256::from(self.backend.block_number);
        env.block.timestamp = U256::from(self.backend.timestamp);
        env.block.basefee = U256::ZERO;

        env.tx.caller = caller.unwrap_or(Address::ZERO);
        env.tx.transact_to = transact_to;
        env.tx.data = data;
        env.tx.value = value;
        env.tx.gas_price = U256::ZERO;
        env.tx.gas_priority_fee = None;
        Box::new(env)
    }

    fn execute(
        &mut self,
        caller: Option<Address>,
        transact_to: TransactTo,
        data: Vec<u8>,
        value: U256,
    ) -> Result<CallResult> {
        let env = self.build_env(caller, transact_to, data.into(), value);
        let result = self.backend.run_transact(env)?;
        process_call_result(result)
    }

    fn commit(&mut self, result: &mut CallResult) {
        if let Some(changes) = result.state_changeset.take() {
            self.backend.commit(changes);
        }
    }
}

impl Engine for BaseEvm {
    fn create_account(&mut self, address: Address, balance: Option<U256>) -> Result<()> {
        let mut info = AccountInfo::default();
        if let Some(amnt) = balance {
            info.balance = amnt;
        }
        self.backend.create_account(address, info);
        Ok(())
    }

    fn get_balance(&self, address: Address) -> Result<U256> {
        Ok(self
            .backend
            .basic_ref(address)?
            .map(|acc| acc.balance)
            .unwrap_or_default())
    }

    fn transfer(&mut self, caller: Address, to: Address, value: U256) -> Result<()> {
        let balance = self.get_balance(caller)?;
        if balance < value {
            return Err(Error::InsufficientBalance {
                address: caller,
                balance,
                required: value,
            });
        }
        self.transact(caller, to, vec![], value)?;
        Ok(())
    }

    fn deploy(&mut self, caller: Address, code: Vec<u8>, value: U256) -> Result<Address> {
        let mut call_results = self.execute(Some(caller), TransactTo::create(), code, value)?;
        let address = call_results
            .address
            .ok_or_else(|| Error::Engine("deploy did not return an address".into()))?;
        self.commit(&mut call_results);

        debug!(%caller, %address, gas_used = call_results.gas_used, "deployed contract");
        Ok(address)
    }

    fn call(&mut self, to: Address, data: Vec<u8>) -> Result<CallResult> {
        self.execute(None, TransactTo::call(to), data, U256::ZERO)
    }

    fn transact(
        &mut self,
        caller: Address,
        to: Address,
        data: Vec<u8>,
        value: U256,
    ) -> Result<CallResult> {
        let mut call_results = self.execute(Some(caller), TransactTo::call(to), data, value)?;
        self.commit(&mut call_results);

        debug!(%caller, %to, gas_used = call_results.gas_used, "transaction committed");
        Ok(call_results)
    }

    fn simulate(
        &mut self,
        caller: Address,
        to: Address,
        data: Vec<u8>,
        value: U256,
    ) -> Result<CallResult> {
        self.execute(Some(caller), TransactTo::call(to), data, value)
    }

    fn advance_block(&mut self, blocks: u64) {
        self.backend.advance_block(blocks, BLOCK_TIME_SECONDS);
        debug!(
            number = self.backend.block_number,
            timestamp = self.backend.timestamp,
            "advanced block"
        );
    }

    fn view_storage_slot(&mut self, address: Address, slot: U256) -> Result<[u8; 32]> {
        let value = Database::storage(&mut self.backend, address, slot)?;
        Ok(value.to_le_bytes::<32>())
    }

    fn create_snapshot(&self) -> Result<SnapShot> {
        self.backend.create_snapshot()
    }
}

fn process_call_result(result: ResultAndState) -> Result<CallResult> {
    let ResultAndState {
        result: exec_result,
        state: state_changeset,
    } = result;

    let (gas_refunded, gas_used, out, logs) = match exec_result {
        ExecutionResult::Success {
            gas_used,
            gas_refunded,
            output,
            logs,
            ..
        } => (gas_refunded, gas_used, output, logs),
        ExecutionResult::Revert { gas_used, output } => {
            return Err(Error::Reverted { output, gas_used })
        }
        ExecutionResult::Halt { reason, gas_used } => {
            return Err(Error::Halted {
                reason: format!("{reason:?}"),
                gas_used,
            })
        }
    };

    let (result, address) = match out {
        Output::Call(result) => (result, None),
        Output::Create(data, address) => (data, address),
    };
    Ok(CallResult {
        result,
        address,
        gas_used,
        gas_refunded,
        logs,
        state_changeset: Some(state_changeset),
    })
}
