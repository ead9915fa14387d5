//! Fork mainnet, wrap some ether, and replay the result offline from a snapshot.
//!
//! Expects `SIMULAR_FORK_URL` (and optionally `SIMULAR_FORK_BLOCK`) in the
//! environment or a `.env` file.
use alloy_primitives::{address, utils::format_ether, Address, U256};
use simular_contract::{
    capture_snapshot, restore_snapshot, BaseEvm, Contract, ContractAbi, CreateFork, Engine,
    SolValue,
};
use tracing_subscriber::EnvFilter;

const WETH: &str = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";
const AGENT: Address = address!("2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b");

fn weth_abi() -> anyhow::Result<ContractAbi> {
    Ok(ContractAbi::from_human_readable(&[
        "function symbol() view returns (string)",
        "function decimals() view returns (uint8)",
        "function balanceOf(address) view returns (uint256)",
        "function deposit() payable",
        "event Deposit(address indexed dst, uint256 wad)",
    ])?)
}

fn balance_of(weth: &Contract, evm: &mut BaseEvm, who: Address) -> anyhow::Result<U256> {
    let balance = weth
        .function("balanceOf")?
        .call(evm, &[who.into()])?
        .and_then(|v| v.as_uint())
        .unwrap_or_default();
    Ok(balance)
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let fork = CreateFork::from_env()?;
    let mut evm = BaseEvm::fork(&fork)?;
    println!("forked at block {}", evm.block_number());

    let weth = Contract::at(weth_abi()?, WETH)?;
    let symbol = weth.function("symbol")?.call(&mut evm, &[])?;
    let decimals = weth.function("decimals")?.call(&mut evm, &[])?;
    if let (Some(SolValue::String(symbol)), Some(SolValue::Uint(decimals))) = (symbol, decimals) {
        println!("token: {symbol}, {decimals} decimals");
    }

    let agent = format!("{AGENT:#x}");
    evm.create_account(AGENT, Some(U256::from(10e18)))?;
    let (_, logs) = weth.function("deposit")?.transact_with_logs(
        &mut evm,
        &[],
        &agent,
        U256::from(1e18),
    )?;
    for (name, values) in logs {
        println!("event {name}: {values:?}");
    }
    let wrapped = balance_of(&weth, &mut evm, AGENT)?;
    println!("agent holds {} WETH", format_ether(wrapped));

    // the snapshot holds everything fetched so far, so the same reads work offline
    let blob = capture_snapshot(&evm)?;
    let mut offline = restore_snapshot(&blob)?;
    assert_eq!(wrapped, balance_of(&weth, &mut offline, AGENT)?);
    println!(
        "offline replay agrees: {} WETH, {} ETH left",
        format_ether(wrapped),
        format_ether(offline.get_balance(AGENT)?)
    );

    offline.advance_block(1);
    println!("advanced to block {}", offline.block_number());
    Ok(())
}
