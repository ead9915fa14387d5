//! `simular-contract` is a library for interacting with smart contracts running in an embedded
//! Ethereum Virtual Machine.
//! It provides the following core modules:
//! - `types/codec`  : Solidity types and values, ABI encoding/decoding
//! - `signature`    : function and event signatures, selectors
//! - `abi`          : parsing ABI files, encoding/decoding calls to smart contracts
//! - `contract`     : deploy and call contracts by function name
//! - `evm`          : manipulate accounts, send transactions
//! - `storage/forkdb` : backend storage for the EVM
//! - `snapshot`     : save and restore the state of the EVM
pub mod abi;
pub mod codec;
pub mod config;
pub mod contract;
pub mod errors;
pub mod evm;
pub mod forkdb;
pub mod signature;
pub mod snapshot;
pub mod storage;
pub mod types;

// re-exports
pub use {
    abi::ContractAbi,
    config::{CreateFork, EvmConfig},
    contract::{Contract, Function},
    errors::{Error, Result},
    evm::{BaseEvm, CallResult, Engine},
    snapshot::{capture_snapshot, restore_snapshot, SnapShot},
    types::SolValue,
};

pub use alloy_dyn_abi::DynSolType;

use alloy_primitives::Address;

/// Generate the given `num` of addresses
pub fn generate_random_addresses(num: u8) -> Vec<Address> {
    (1..=num).map(Address::repeat_byte).collect()
}
