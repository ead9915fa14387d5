//!
//! High-level handle for deploying and calling a contract
//!
//! A [`Contract`] pairs a [`ContractAbi`] with the address it is deployed at. It starts out
//! unbound and is bound exactly once, by [`Contract::deploy`] or [`Contract::bind_address`].
//! Functions are looked up by name and driven through any [`Engine`].
//!
use alloy_primitives::{Address, U256};
use std::sync::Arc;
use tracing::debug;

use crate::{
    abi::{decode_outputs, ContractAbi, DecodedLog},
    errors::{Error, Result},
    evm::{CallResult, Engine},
    signature::{FunctionSignature, Mutability},
    types::SolValue,
};

/// How a function is sent to the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// read-only, no caller
    Call,
    /// commits state
    Transact,
    /// runs like `Transact`, changes are discarded
    Simulate,
}

impl From<Mutability> for Dispatch {
    fn from(value: Mutability) -> Self {
        if value.is_read_only() {
            Dispatch::Call
        } else {
            Dispatch::Transact
        }
    }
}

/// Parse `0x` followed by 40 hex digits. Case is ignored, checksums are not checked.
pub fn parse_address(raw: &str) -> Option<Address> {
    let digits = raw.strip_prefix("0x")?;
    if digits.len() != 40 {
        return None;
    }
    let bytes = hex::decode(digits).ok()?;
    Some(Address::from_slice(&bytes))
}

fn parse_caller(raw: &str) -> Result<Address> {
    parse_address(raw).ok_or_else(|| Error::InvalidCaller(raw.to_string()))
}

#[derive(Clone, Debug)]
pub struct Contract {
    abi: Arc<ContractAbi>,
    address: Option<Address>,
}

impl Contract {
    /// Create an unbound contract
    pub fn new(abi: impl Into<Arc<ContractAbi>>) -> Self {
        Self {
            abi: abi.into(),
            address: None,
        }
    }

    /// Create a contract bound to an already deployed `address`
    pub fn at(abi: impl Into<Arc<ContractAbi>>, address: &str) -> Result<Self> {
        let address =
            parse_address(address).ok_or_else(|| Error::InvalidAddress(address.to_string()))?;
        let mut contract = Self::new(abi);
        contract.bind_address(address)?;
        Ok(contract)
    }

    /// Bind an unbound contract to `address`
    pub fn bind_address(&mut self, address: Address) -> Result<()> {
        if let Some(bound) = self.address {
            return Err(Error::AlreadyBound(bound));
        }
        self.address = Some(address);
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        self.address.is_some()
    }

    /// The address of the contract. Fails with `ContractUnbound` if it's not bound yet.
    pub fn address(&self) -> Result<Address> {
        self.address.ok_or(Error::ContractUnbound)
    }

    pub fn abi(&self) -> &ContractAbi {
        &self.abi
    }

    /// Deploy the contract and bind to the new address. Where:
    ///
    /// - `caller` is the creator (msg.sender)
    /// - `args` are the constructor arguments, if any
    /// - `value` in `wei` to send to the contract. The engine reverts if the
    /// constructor is not `payable`.
    pub fn deploy<E: Engine + ?Sized>(
        &mut self,
        engine: &mut E,
        caller: &str,
        args: &[SolValue],
        value: U256,
    ) -> Result<Address> {
        if let Some(bound) = self.address {
            return Err(Error::AlreadyBound(bound));
        }
        let caller = parse_caller(caller)?;
        let code = self.abi.encode_constructor(args)?;
        let address = engine.deploy(caller, code, value)?;
        self.bind_address(address)?;
        Ok(address)
    }

    /// Look up a function by name
    pub fn function(&self, name: &str) -> Result<Function<'_>> {
        Ok(Function {
            contract: self,
            signature: self.abi.function(name)?,
        })
    }
}

/// A function of a [`Contract`]
#[derive(Clone, Copy, Debug)]
pub struct Function<'a> {
    contract: &'a Contract,
    signature: &'a FunctionSignature,
}

impl<'a> Function<'a> {
    pub fn signature(&self) -> &FunctionSignature {
        self.signature
    }

    /// How [`Function::invoke`] sends this function, based on its mutability
    pub fn dispatch(&self) -> Dispatch {
        self.signature.mutability.into()
    }

    /// Make a read-only call to the contract, returning the decoded result. No state
    /// changes are committed and no caller is needed.
    pub fn call<E: Engine + ?Sized>(
        &self,
        engine: &mut E,
        args: &[SolValue],
    ) -> Result<Option<SolValue>> {
        let to = self.contract.address()?;
        let calldata = self.encode(args)?;
        let result = engine.call(to, calldata)?;
        self.decode(&result)
    }

    /// Send a transaction to the contract, committing any state changes.
    /// - `caller`: the address of the caller, `msg.sender`
    /// - `value` : amount of Ether to send, `msg.value`
    pub fn transact<E: Engine + ?Sized>(
        &self,
        engine: &mut E,
        args: &[SolValue],
        caller: &str,
        value: U256,
    ) -> Result<Option<SolValue>> {
        let result = self.send(engine, Dispatch::Transact, args, caller, value)?;
        self.decode(&result)
    }

    /// Same as `transact`, but the engine throws away the state changes.
    pub fn simulate<E: Engine + ?Sized>(
        &self,
        engine: &mut E,
        args: &[SolValue],
        caller: &str,
        value: U256,
    ) -> Result<Option<SolValue>> {
        let result = self.send(engine, Dispatch::Simulate, args, caller, value)?;
        self.decode(&result)
    }

    /// Same as `transact`, also returning the decoded logs that match the abi's events
    pub fn transact_with_logs<E: Engine + ?Sized>(
        &self,
        engine: &mut E,
        args: &[SolValue],
        caller: &str,
        value: U256,
    ) -> Result<(Option<SolValue>, Vec<DecodedLog>)> {
        let result = self.send(engine, Dispatch::Transact, args, caller, value)?;
        let logs = self.contract.abi.extract_logs(&result.logs);
        Ok((self.decode(&result)?, logs))
    }

    /// `call` for pure/view functions, `transact` for everything else. `caller`
    /// is only used by `transact`.
    pub fn invoke<E: Engine + ?Sized>(
        &self,
        engine: &mut E,
        args: &[SolValue],
        caller: Option<&str>,
        value: U256,
    ) -> Result<Option<SolValue>> {
        match self.dispatch() {
            Dispatch::Call => self.call(engine, args),
            _ => self.transact(engine, args, caller.unwrap_or_default(), value),
        }
    }

    fn send<E: Engine + ?Sized>(
        &self,
        engine: &mut E,
        dispatch: Dispatch,
        args: &[SolValue],
        caller: &str,
        value: U256,
    ) -> Result<CallResult> {
        let to = self.contract.address()?;
        let caller = parse_caller(caller)?;
        let calldata = self.encode(args)?;
        debug!(function = %self.signature.name, ?dispatch, %to, "sending");
        match dispatch {
            Dispatch::Call => engine.call(to, calldata),
            Dispatch::Transact => engine.transact(caller, to, calldata, value),
            Dispatch::Simulate => engine.simulate(caller, to, calldata, value),
        }
    }

    fn encode(&self, args: &[SolValue]) -> Result<Vec<u8>> {
        self.contract
            .abi
            .encode_function_input(&self.signature.name, args)
            .map(|(calldata, _)| calldata)
    }

    fn decode(&self, result: &CallResult) -> Result<Option<SolValue>> {
        decode_outputs(&self.signature.outputs, &result.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec,
        evm::{
            tests::{counter_deploy_code, test_contract_code},
            BaseEvm,
        },
        snapshot::SnapShot,
    };
    use alloy_dyn_abi::DynSolType;
    use alloy_primitives::{Bytes, Log};
    use alloy_sol_types::{sol, SolEvent};
    use rstest::*;
    use std::collections::BTreeMap;

    sol! {
        event Transfer(address indexed from, address indexed to, uint256 value);
    }

    const OWNER: &str = "0x1111111111111111111111111111111111111111";
    const OTHER: &str = "0x2222222222222222222222222222222222222222";

    #[fixture]
    fn token_abi() -> ContractAbi {
        let raw = r#"{
            "abi": [
                {"type":"constructor","stateMutability":"nonpayable","inputs":[
                    {"name":"name_","type":"string"},
                    {"name":"symbol_","type":"string"},
                    {"name":"decimals_","type":"uint8"}]},
                {"type":"function","name":"name","stateMutability":"view",
                 "inputs":[],"outputs":[{"name":"","type":"string"}]},
                {"type":"function","name":"symbol","stateMutability":"view",
                 "inputs":[],"outputs":[{"name":"","type":"string"}]},
                {"type":"function","name":"decimals","stateMutability":"view",
                 "inputs":[],"outputs":[{"name":"","type":"uint8"}]},
                {"type":"function","name":"totalSupply","stateMutability":"view",
                 "inputs":[],"outputs":[{"name":"","type":"uint256"}]},
                {"type":"function","name":"balanceOf","stateMutability":"view",
                 "inputs":[{"name":"account","type":"address"}],
                 "outputs":[{"name":"","type":"uint256"}]},
                {"type":"function","name":"mint","stateMutability":"nonpayable",
                 "inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],
                 "outputs":[]},
                {"type":"function","name":"transfer","stateMutability":"nonpayable",
                 "inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],
                 "outputs":[{"name":"","type":"bool"}]},
                {"type":"event","name":"Transfer","anonymous":false,"inputs":[
                    {"name":"from","type":"address","indexed":true},
                    {"name":"to","type":"address","indexed":true},
                    {"name":"value","type":"uint256","indexed":false}]}
            ],
            "bytecode": "0x6080604052"
        }"#;
        ContractAbi::from_full_json(raw).unwrap()
    }

    #[derive(Clone, Default)]
    struct Ledger {
        owner: Address,
        name: String,
        symbol: String,
        decimals: u8,
        supply: U256,
        balances: BTreeMap<Address, U256>,
    }

    /// Engine double that runs a token contract natively, decoding calldata with the abi
    struct TokenEngine {
        abi: ContractAbi,
        address: Address,
        ledger: Ledger,
        requests: usize,
    }

    impl TokenEngine {
        fn new(abi: ContractAbi) -> Self {
            Self {
                abi,
                address: Address::repeat_byte(0xee),
                ledger: Ledger::default(),
                requests: 0,
            }
        }

        fn lookup(&self, data: &[u8]) -> (FunctionSignature, Vec<SolValue>) {
            let function = self
                .abi
                .functions()
                .find(|f| f.selector() == data[..4])
                .unwrap()
                .clone();
            let args = codec::decode_params(&function.inputs, &data[4..]).unwrap();
            (function, args)
        }

        fn reply(
            &self,
            function: &FunctionSignature,
            values: &[SolValue],
            logs: Vec<Log>,
        ) -> CallResult {
            CallResult {
                result: codec::encode_params(&function.outputs, values).unwrap().into(),
                address: None,
                gas_used: 21_000,
                gas_refunded: 0,
                logs,
                state_changeset: None,
            }
        }

        fn transfer_log(&self, from: Address, to: Address, value: U256) -> Log {
            Log {
                address: self.address,
                data: Transfer { from, to, value }.encode_log_data(),
            }
        }

        fn write(&self, ledger: &mut Ledger, caller: Address, data: &[u8]) -> Result<CallResult> {
            let (function, args) = self.lookup(data);
            let to = args[0].as_address().unwrap();
            let amount = args[1].as_uint().unwrap();
            match function.name.as_str() {
                "mint" => {
                    if caller != ledger.owner {
                        return Err(Error::Reverted {
                            output: Bytes::new(),
                            gas_used: 21_000,
                        });
                    }
                    ledger.supply += amount;
                    *ledger.balances.entry(to).or_default() += amount;
                    let log = self.transfer_log(Address::ZERO, to, amount);
                    Ok(self.reply(&function, &[], vec![log]))
                }
                "transfer" => {
                    let from = ledger.balances.entry(caller).or_default();
                    if *from < amount {
                        return Err(Error::Reverted {
                            output: Bytes::new(),
                            gas_used: 21_000,
                        });
                    }
                    *from -= amount;
                    *ledger.balances.entry(to).or_default() += amount;
                    let log = self.transfer_log(caller, to, amount);
                    Ok(self.reply(&function, &[true.into()], vec![log]))
                }
                other => panic!("{other} is read-only"),
            }
        }
    }

    impl Engine for TokenEngine {
        fn create_account(&mut self, _address: Address, _balance: Option<U256>) -> Result<()> {
            self.requests += 1;
            Ok(())
        }

        fn get_balance(&self, _address: Address) -> Result<U256> {
            Ok(U256::ZERO)
        }

        fn transfer(&mut self, _caller: Address, _to: Address, _value: U256) -> Result<()> {
            self.requests += 1;
            Ok(())
        }

        fn deploy(&mut self, caller: Address, code: Vec<u8>, _value: U256) -> Result<Address> {
            self.requests += 1;
            let bytecode = self.abi.bytecode().unwrap();
            assert!(code.starts_with(bytecode));
            let args =
                codec::decode_params(self.abi.constructor_input_types(), &code[bytecode.len()..])?;
            self.ledger = Ledger {
                owner: caller,
                name: args[0].as_str().unwrap().to_string(),
                symbol: args[1].as_str().unwrap().to_string(),
                decimals: args[2].as_uint().unwrap().to::<u8>(),
                ..Default::default()
            };
            Ok(self.address)
        }

        fn call(&mut self, to: Address, data: Vec<u8>) -> Result<CallResult> {
            self.requests += 1;
            assert_eq!(self.address, to);
            let (function, args) = self.lookup(&data);
            let ledger = &self.ledger;
            let value: SolValue = match function.name.as_str() {
                "name" => ledger.name.clone().into(),
                "symbol" => ledger.symbol.clone().into(),
                "decimals" => ledger.decimals.into(),
                "totalSupply" => ledger.supply.into(),
                "balanceOf" => {
                    let who = args[0].as_address().unwrap();
                    ledger.balances.get(&who).copied().unwrap_or_default().into()
                }
                _ => return self.write(&mut ledger.clone(), Address::ZERO, &data),
            };
            Ok(self.reply(&function, &[value], vec![]))
        }

        fn transact(
            &mut self,
            caller: Address,
            _to: Address,
            data: Vec<u8>,
            _value: U256,
        ) -> Result<CallResult> {
            self.requests += 1;
            let mut ledger = self.ledger.clone();
            let result = self.write(&mut ledger, caller, &data)?;
            self.ledger = ledger;
            Ok(result)
        }

        fn simulate(
            &mut self,
            caller: Address,
            _to: Address,
            data: Vec<u8>,
            _value: U256,
        ) -> Result<CallResult> {
            self.requests += 1;
            self.write(&mut self.ledger.clone(), caller, &data)
        }

        fn advance_block(&mut self, _blocks: u64) {}

        fn view_storage_slot(&mut self, _address: Address, _slot: U256) -> Result<[u8; 32]> {
            Ok([0u8; 32])
        }

        fn create_snapshot(&self) -> Result<SnapShot> {
            Ok(SnapShot::default())
        }
    }

    fn uint(value: u64) -> Option<SolValue> {
        Some(SolValue::Uint(U256::from(value)))
    }

    #[test]
    fn parses_addresses() {
        assert_eq!(Some(Address::repeat_byte(0x11)), parse_address(OWNER));
        assert_eq!(
            Some(Address::repeat_byte(0xab)),
            parse_address("0xABABABABABABABABABABABABABABABABABABABAB")
        );
        assert!(parse_address("1111111111111111111111111111111111111111").is_none());
        assert!(parse_address("0x11111111111111111111111111111111111111").is_none());
        assert!(parse_address("0x111111111111111111111111111111111111111g").is_none());
        assert!(parse_address("").is_none());
    }

    #[test]
    fn dispatch_follows_mutability() {
        assert_eq!(Dispatch::Call, Mutability::View.into());
        assert_eq!(Dispatch::Call, Mutability::Pure.into());
        assert_eq!(Dispatch::Transact, Mutability::NonPayable.into());
        assert_eq!(Dispatch::Transact, Mutability::Payable.into());
    }

    #[rstest]
    fn token_lifecycle(token_abi: ContractAbi) {
        let x = Address::repeat_byte(0x33);
        let mut engine = TokenEngine::new(token_abi.clone());
        let mut token = Contract::new(token_abi);

        let address = token
            .deploy(
                &mut engine,
                OWNER,
                &["USD Coin".into(), "USDC".into(), 6u8.into()],
                U256::ZERO,
            )
            .unwrap();
        assert_eq!(address, token.address().unwrap());

        let decimals = token.function("decimals").unwrap();
        assert_eq!(Dispatch::Call, decimals.dispatch());
        assert_eq!(uint(6), decimals.call(&mut engine, &[]).unwrap());
        assert_eq!(
            Some(SolValue::String("USDC".into())),
            token.function("symbol").unwrap().call(&mut engine, &[]).unwrap()
        );

        let mint = token.function("mint").unwrap();
        assert_eq!(
            None,
            mint.transact(&mut engine, &[x.into(), 10u64.into()], OWNER, U256::ZERO)
                .unwrap()
        );
        assert_eq!(
            uint(10),
            token
                .function("balanceOf")
                .unwrap()
                .call(&mut engine, &[x.into()])
                .unwrap()
        );
        assert_eq!(
            uint(10),
            token.function("totalSupply").unwrap().call(&mut engine, &[]).unwrap()
        );

        // only the owner can mint
        assert!(matches!(
            mint.transact(&mut engine, &[x.into(), 10u64.into()], OTHER, U256::ZERO),
            Err(Error::Reverted { .. })
        ));
        assert_eq!(
            uint(10),
            token.function("totalSupply").unwrap().call(&mut engine, &[]).unwrap()
        );
    }

    #[rstest]
    fn simulate_previews_without_changes(token_abi: ContractAbi) {
        let x = Address::repeat_byte(0x33);
        let mut engine = TokenEngine::new(token_abi.clone());
        let mut token = Contract::new(token_abi);
        token
            .deploy(
                &mut engine,
                OWNER,
                &["USD Coin".into(), "USDC".into(), 6u8.into()],
                U256::ZERO,
            )
            .unwrap();

        let mint = token.function("mint").unwrap();
        assert_eq!(
            None,
            mint.simulate(&mut engine, &[x.into(), 10u64.into()], OWNER, U256::ZERO)
                .unwrap()
        );
        assert_eq!(
            uint(0),
            token.function("totalSupply").unwrap().call(&mut engine, &[]).unwrap()
        );
    }

    #[rstest]
    fn transact_returns_decoded_logs(token_abi: ContractAbi) {
        let owner = parse_address(OWNER).unwrap();
        let x = Address::repeat_byte(0x33);
        let mut engine = TokenEngine::new(token_abi.clone());
        let mut token = Contract::new(token_abi);
        token
            .deploy(
                &mut engine,
                OWNER,
                &["USD Coin".into(), "USDC".into(), 6u8.into()],
                U256::ZERO,
            )
            .unwrap();
        token
            .function("mint")
            .unwrap()
            .transact(&mut engine, &[owner.into(), 50u64.into()], OWNER, U256::ZERO)
            .unwrap();

        let (output, logs) = token
            .function("transfer")
            .unwrap()
            .transact_with_logs(&mut engine, &[x.into(), 20u64.into()], OWNER, U256::ZERO)
            .unwrap();
        assert_eq!(Some(SolValue::Bool(true)), output);
        assert_eq!(
            vec![(
                "Transfer".to_string(),
                vec![
                    SolValue::Address(owner),
                    SolValue::Address(x),
                    SolValue::Uint(U256::from(20))
                ]
            )],
            logs
        );
    }

    #[rstest]
    fn invalid_caller_fails_before_the_engine(token_abi: ContractAbi) {
        let mut engine = TokenEngine::new(token_abi.clone());
        let mut token = Contract::new(token_abi.clone());

        assert!(matches!(
            token.deploy(&mut engine, "bob", &["a".into(), "b".into(), 1u8.into()], U256::ZERO),
            Err(Error::InvalidCaller(_))
        ));
        assert!(!token.is_bound());

        let token = Contract::at(token_abi, "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee").unwrap();
        let mint = token.function("mint").unwrap();
        let args: [SolValue; 2] = [Address::ZERO.into(), 1u64.into()];
        for caller in ["", "0x1234", "0xzz11111111111111111111111111111111111111"] {
            assert!(matches!(
                mint.transact(&mut engine, &args, caller, U256::ZERO),
                Err(Error::InvalidCaller(_))
            ));
            assert!(matches!(
                mint.simulate(&mut engine, &args, caller, U256::ZERO),
                Err(Error::InvalidCaller(_))
            ));
        }
        assert!(matches!(
            mint.invoke(&mut engine, &args, None, U256::ZERO),
            Err(Error::InvalidCaller(_))
        ));
        assert_eq!(0, engine.requests);

        // view functions never need one
        assert_eq!(
            uint(0),
            token
                .function("totalSupply")
                .unwrap()
                .invoke(&mut engine, &[], None, U256::ZERO)
                .unwrap()
        );
        assert_eq!(1, engine.requests);
    }

    #[rstest]
    fn unbound_and_rebinding(token_abi: ContractAbi) {
        let mut engine = TokenEngine::new(token_abi.clone());
        let mut token = Contract::new(token_abi.clone());

        assert!(matches!(token.address(), Err(Error::ContractUnbound)));
        let supply = token.function("totalSupply").unwrap();
        assert!(matches!(
            supply.call(&mut engine, &[]),
            Err(Error::ContractUnbound)
        ));
        let mint = token.function("mint").unwrap();
        assert!(matches!(
            mint.transact(&mut engine, &[], OWNER, U256::ZERO),
            Err(Error::ContractUnbound)
        ));
        assert!(matches!(
            mint.simulate(&mut engine, &[], OWNER, U256::ZERO),
            Err(Error::ContractUnbound)
        ));
        assert_eq!(0, engine.requests);

        assert!(matches!(
            token.function("burn"),
            Err(Error::FunctionNotFound(name)) if name == "burn"
        ));

        token.bind_address(Address::repeat_byte(0xee)).unwrap();
        assert!(matches!(
            token.bind_address(Address::repeat_byte(1)),
            Err(Error::AlreadyBound(_))
        ));
        assert!(matches!(
            token.deploy(&mut engine, OWNER, &[], U256::ZERO),
            Err(Error::AlreadyBound(_))
        ));
        assert!(matches!(
            Contract::at(token_abi, "0x1234"),
            Err(Error::InvalidAddress(_))
        ));
    }

    #[rstest]
    fn argument_errors(token_abi: ContractAbi) {
        let mut engine = TokenEngine::new(token_abi.clone());
        let mut token = Contract::new(token_abi.clone());
        assert!(matches!(
            token.deploy(&mut engine, OWNER, &["USD Coin".into()], U256::ZERO),
            Err(Error::ArgumentCountMismatch {
                expected: 3,
                got: 1
            })
        ));

        let token = Contract::at(token_abi, "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee").unwrap();
        assert!(matches!(
            token
                .function("balanceOf")
                .unwrap()
                .call(&mut engine, &[true.into()]),
            Err(Error::TypeMismatch { .. })
        ));
        assert_eq!(0, engine.requests);
    }

    #[test]
    fn counter_on_the_evm() {
        let abi = ContractAbi::from_abi_bytecode(
            r#"[
                {"type":"function","name":"number","stateMutability":"view",
                 "inputs":[],"outputs":[{"name":"","type":"uint256"}]},
                {"type":"function","name":"increment","stateMutability":"nonpayable",
                 "inputs":[],"outputs":[]}
            ]"#,
            Some(counter_deploy_code()),
        )
        .unwrap();

        let mut evm = BaseEvm::default();
        evm.create_account(Address::repeat_byte(0x11), Some(U256::from(1e18)))
            .unwrap();

        let mut counter = Contract::new(abi);
        let address = counter.deploy(&mut evm, OWNER, &[], U256::ZERO).unwrap();
        let number = counter.function("number").unwrap();
        assert_eq!(uint(0), number.call(&mut evm, &[]).unwrap());

        let increment = counter.function("increment").unwrap();
        for _ in 0..99 {
            assert_eq!(None, increment.transact(&mut evm, &[], OWNER, U256::ZERO).unwrap());
        }
        assert_eq!(uint(99), number.call(&mut evm, &[]).unwrap());

        // same contract through a human-readable abi
        let readable = ContractAbi::from_human_readable(&[
            "function number() external view returns (uint256)",
            "function increment()",
        ])
        .unwrap();
        assert!(matches!(
            Contract::new(readable.clone()).deploy(&mut evm, OWNER, &[], U256::ZERO),
            Err(Error::NoBytecode)
        ));
        let bound = Contract::at(readable, &format!("{address:#x}")).unwrap();
        assert_eq!(
            uint(99),
            bound
                .function("number")
                .unwrap()
                .invoke(&mut evm, &[], None, U256::ZERO)
                .unwrap()
        );
        assert_eq!(
            None,
            bound
                .function("increment")
                .unwrap()
                .simulate(&mut evm, &[], OWNER, U256::ZERO)
                .unwrap()
        );
        assert_eq!(uint(99), number.call(&mut evm, &[]).unwrap());
    }

    #[test]
    fn test_contract_on_the_evm() {
        let abi = ContractAbi::from_abi_bytecode(
            r#"[
                {"type":"constructor","stateMutability":"payable",
                 "inputs":[{"name":"_value","type":"uint256"}]},
                {"type":"function","name":"owner","stateMutability":"view",
                 "inputs":[],"outputs":[{"name":"","type":"address"}]},
                {"type":"function","name":"value","stateMutability":"view",
                 "inputs":[],"outputs":[{"name":"","type":"uint256"}]},
                {"type":"function","name":"increment","stateMutability":"nonpayable",
                 "inputs":[],"outputs":[{"name":"","type":"uint256"}]},
                {"type":"function","name":"changeIt","stateMutability":"nonpayable",
                 "inputs":[{"name":"_input","type":"tuple","internalType":"struct ChangeIt",
                            "components":[{"name":"owner","type":"address"},
                                          {"name":"value","type":"uint256"}]}],
                 "outputs":[{"name":"","type":"bool"}]},
                {"type":"function","name":"deposit","stateMutability":"payable",
                 "inputs":[],"outputs":[]}
            ]"#,
            Some(test_contract_code()),
        )
        .unwrap();
        assert!(abi.constructor_is_payable());
        assert_eq!(
            [DynSolType::Tuple(vec![DynSolType::Address, DynSolType::Uint(256)])],
            abi.function("changeIt").unwrap().inputs[..]
        );

        let owner = parse_address(OWNER).unwrap();
        let new_owner = Address::repeat_byte(0x22);
        let mut evm = BaseEvm::default();
        evm.create_account(owner, Some(U256::from(2e18))).unwrap();

        let mut contract = Contract::new(abi);
        assert!(matches!(
            contract.deploy(&mut evm, OWNER, &[], U256::ZERO),
            Err(Error::ArgumentCountMismatch { .. })
        ));
        let address = contract
            .deploy(&mut evm, OWNER, &[1u64.into()], U256::from(1e18))
            .unwrap();
        assert_eq!(U256::from(1e18), evm.get_balance(address).unwrap());

        let call = |evm: &mut BaseEvm, name: &str| {
            contract.function(name).unwrap().call(evm, &[]).unwrap()
        };
        assert_eq!(Some(SolValue::Address(owner)), call(&mut evm, "owner"));
        assert_eq!(uint(1), call(&mut evm, "value"));

        // returns the previous value
        let increment = contract.function("increment").unwrap();
        assert_eq!(uint(1), increment.transact(&mut evm, &[], OWNER, U256::ZERO).unwrap());
        assert_eq!(uint(2), call(&mut evm, "value"));

        let change = [SolValue::Tuple(vec![new_owner.into(), 0u64.into()])];
        let change_it = contract.function("changeIt").unwrap();
        assert!(matches!(
            change_it.transact(&mut evm, &change, OTHER, U256::ZERO),
            Err(Error::Reverted { .. })
        ));
        assert_eq!(
            Some(SolValue::Bool(true)),
            change_it.simulate(&mut evm, &change, OWNER, U256::ZERO).unwrap()
        );
        assert_eq!(Some(SolValue::Address(owner)), call(&mut evm, "owner"));
        assert_eq!(
            Some(SolValue::Bool(true)),
            change_it.invoke(&mut evm, &change, Some(OWNER), U256::ZERO).unwrap()
        );
        assert_eq!(Some(SolValue::Address(new_owner)), call(&mut evm, "owner"));
        assert_eq!(uint(0), call(&mut evm, "value"));

        contract
            .function("deposit")
            .unwrap()
            .transact(&mut evm, &[], OWNER, U256::from(5))
            .unwrap();
        assert_eq!(U256::from(1e18) + U256::from(5), evm.get_balance(address).unwrap());
    }
}
