//!
//! Errors for the abi, contract, evm and storage layers
//!
use alloy_primitives::{Address, Bytes, U256};
use revm::primitives::{EVMError, B256};
use std::convert::Infallible;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All failures surfaced to a caller of this crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to parse abi entry '{entry}': {reason}")]
    AbiParse { entry: String, reason: String },
    #[error("duplicate function name '{0}': overloaded functions are not supported")]
    DuplicateFunctionName(String),
    #[error("function '{0}' not found in the abi")]
    FunctionNotFound(String),
    #[error("wrong number of arguments: expected {expected}, got {got}")]
    ArgumentCountMismatch { expected: usize, got: usize },
    #[error("type mismatch for '{expected}': {reason}")]
    TypeMismatch { expected: String, reason: String },
    #[error("missing contract bytecode")]
    NoBytecode,
    #[error("constructor doesn't take any args")]
    ConstructorTakesNoArgs,
    #[error("caller is missing or is not a valid address: '{0}'")]
    InvalidCaller(String),
    #[error("not a valid address: '{0}'")]
    InvalidAddress(String),
    #[error("missing contract address. deploy the contract or bind an address first")]
    ContractUnbound,
    #[error("contract is already bound to {0}")]
    AlreadyBound(Address),
    #[error("insufficient balance for {address}: has {balance}, needs {required}")]
    InsufficientBalance {
        address: Address,
        balance: U256,
        required: U256,
    },
    #[error("failed to load state: {0}")]
    StateLoad(String),
    #[error("no cached state for {0}")]
    UncachedAccess(String),
    #[error("remote fetch failed: {0}")]
    NetworkFetch(String),
    #[error("execution reverted (gas used {gas_used}): 0x{}", hex::encode(.output))]
    Reverted { output: Bytes, gas_used: u64 },
    #[error("execution halted (gas used {gas_used}): {reason}")]
    Halted { reason: String, gas_used: u64 },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("engine error: {0}")]
    Engine(String),
}

impl Error {
    pub(crate) fn abi_parse(entry: impl Into<String>, reason: impl ToString) -> Self {
        Error::AbiParse {
            entry: entry.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn type_mismatch(expected: impl ToString, reason: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.to_string(),
            reason: reason.into(),
        }
    }
}

/// Wrapper for Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("code should already be loaded: {0}")]
    MissingCode(B256),
    #[error("failed to get account for {0}")]
    GetAccount(Address),
    #[error("failed to get storage for {0} at {1}")]
    GetStorage(Address, U256),
    #[error("failed to get block hash for {0}")]
    GetBlockHash(U256),
    #[error("account {0} was never cached")]
    UncachedAccount(Address),
    #[error("storage slot {1} of {0} was never cached")]
    UncachedStorage(Address, U256),
    #[error("block hash for {0} was never cached")]
    UncachedBlockHash(U256),
    #[error("{0}")]
    NetworkFetch(String),
    #[error("{0}")]
    Other(String),
}

impl From<EVMError<DatabaseError>> for DatabaseError {
    fn from(err: EVMError<DatabaseError>) -> Self {
        match err {
            EVMError::Database(err) => err,
            err => DatabaseError::Other(format!("{err:?}")),
        }
    }
}

impl From<Infallible> for DatabaseError {
    fn from(value: Infallible) -> Self {
        match value {}
    }
}

impl From<DatabaseError> for Error {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UncachedAccount(_)
            | DatabaseError::UncachedStorage(..)
            | DatabaseError::UncachedBlockHash(_) => Error::UncachedAccess(err.to_string()),
            DatabaseError::NetworkFetch(reason) => Error::NetworkFetch(reason),
            err => Error::Engine(err.to_string()),
        }
    }
}

impl From<EVMError<DatabaseError>> for Error {
    fn from(err: EVMError<DatabaseError>) -> Self {
        match err {
            EVMError::Database(err) => err.into(),
            err => Error::Engine(format!("{err:?}")),
        }
    }
}
