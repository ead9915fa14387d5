//!
//! Parse contract ABIs to encode/decode contract calls
//!
//! A [`ContractAbi`] is built once from one of the three artifact shapes and is
//! immutable after that. Overloaded functions are rejected.
//!
use alloy_dyn_abi::DynSolType;
use alloy_json_abi::{AbiItem, ContractObject, JsonAbi};
use alloy_primitives::{Bytes, Log};
use std::collections::BTreeMap;

use crate::{
    codec,
    errors::{Error, Result},
    signature::{strip_component_names, ConstructorSignature, EventSignature, FunctionSignature},
    types::SolValue,
};

/// Names the human-readable form can't use for a function
const RESERVED_NAMES: [&str; 3] = ["constructor", "fallback", "receive"];

/// A decoded event: the event name and its values in declaration order
pub type DecodedLog = (String, Vec<SolValue>);

#[derive(Clone, Debug, Default)]
pub struct ContractAbi {
    functions: BTreeMap<String, FunctionSignature>,
    constructor: Option<ConstructorSignature>,
    events: Vec<EventSignature>,
    fallback: bool,
    receive: bool,
    bytecode: Option<Bytes>,
}

impl ContractAbi {
    /// Parse the `abi` and `bytecode` from a compiled contract's json artifact.
    pub fn from_full_json(raw: &str) -> Result<Self> {
        let co = serde_json::from_str::<ContractObject>(raw)
            .map_err(|e| Error::abi_parse("artifact", e))?;
        let abi = co
            .abi
            .ok_or_else(|| Error::abi_parse("artifact", "abi not found"))?;
        let bytecode = co
            .bytecode
            .ok_or_else(|| Error::abi_parse("artifact", "bytecode not found"))?;
        Self::from_json_abi(&abi, Some(bytecode))
    }

    /// Parse a json `abi` array with optional bytecode. Without bytecode the
    /// contract can't be deployed, but can still be bound to an existing address.
    pub fn from_abi_bytecode(raw: &str, bytecode: Option<Vec<u8>>) -> Result<Self> {
        let abi = serde_json::from_str::<JsonAbi>(raw).map_err(|e| Error::abi_parse("abi", e))?;
        Self::from_json_abi(&abi, bytecode.map(Bytes::from))
    }

    /// Parse human-readable `function ...` and `event ...` lines. There is no
    /// constructor, fallback, receive or bytecode in this form.
    pub fn from_human_readable(lines: &[&str]) -> Result<Self> {
        let mut abi = Self::default();
        for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
            let normalized = strip_component_names(line);
            match AbiItem::parse(&normalized).map_err(|e| Error::abi_parse(line, e))? {
                AbiItem::Function(function) if RESERVED_NAMES.contains(&function.name.as_str()) => {
                    return Err(Error::abi_parse(
                        line,
                        format!("'{}' is not a function", function.name),
                    ))
                }
                AbiItem::Function(function) => {
                    abi.insert_function(FunctionSignature::try_from(function.as_ref())?)?
                }
                AbiItem::Event(event) => abi.events.push(EventSignature::try_from(event.as_ref())?),
                other => {
                    return Err(Error::abi_parse(
                        line,
                        format!(
                            "{} entries are not supported in the human-readable form",
                            other.debug_name()
                        ),
                    ))
                }
            }
        }
        if abi.functions.is_empty() && abi.events.is_empty() {
            return Err(Error::abi_parse("abi", "no entries"));
        }
        Ok(abi)
    }

    fn from_json_abi(abi: &JsonAbi, bytecode: Option<Bytes>) -> Result<Self> {
        let is_empty = abi.constructor.is_none()
            && abi.fallback.is_none()
            && abi.receive.is_none()
            && abi.functions.is_empty()
            && abi.events.is_empty()
            && abi.errors.is_empty();
        if is_empty {
            return Err(Error::abi_parse("abi", "no entries"));
        }

        let mut contract_abi = Self {
            constructor: abi
                .constructor
                .as_ref()
                .map(ConstructorSignature::try_from)
                .transpose()?,
            fallback: abi.fallback.is_some(),
            receive: abi.receive.is_some(),
            bytecode: bytecode.filter(|b| !b.is_empty()),
            ..Default::default()
        };

        for (name, overloads) in &abi.functions {
            if overloads.len() > 1 {
                return Err(Error::DuplicateFunctionName(name.clone()));
            }
            for function in overloads {
                contract_abi.insert_function(FunctionSignature::try_from(function)?)?;
            }
        }
        for event in abi.events.values().flatten() {
            contract_abi.events.push(EventSignature::try_from(event)?);
        }

        Ok(contract_abi)
    }

    fn insert_function(&mut self, function: FunctionSignature) -> Result<()> {
        if self.functions.contains_key(&function.name) {
            return Err(Error::DuplicateFunctionName(function.name));
        }
        self.functions.insert(function.name.clone(), function);
        Ok(())
    }

    /// Is there a function with the given name?
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback
    }

    pub fn has_receive(&self) -> bool {
        self.receive
    }

    /// Input types of the constructor. Empty if there is no constructor.
    pub fn constructor_input_types(&self) -> &[DynSolType] {
        self.constructor
            .as_ref()
            .map(|c| c.inputs.as_slice())
            .unwrap_or_default()
    }

    pub fn constructor_is_payable(&self) -> bool {
        self.constructor
            .as_ref()
            .is_some_and(|c| c.mutability.is_payable())
    }

    /// Return the contract bytecode
    pub fn bytecode(&self) -> Option<&[u8]> {
        self.bytecode.as_ref().map(|b| b.as_ref())
    }

    /// Look up a function by name
    pub fn function(&self, name: &str) -> Result<&FunctionSignature> {
        self.functions
            .get(name)
            .ok_or_else(|| Error::FunctionNotFound(name.to_string()))
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.functions.values()
    }

    pub fn events(&self) -> &[EventSignature] {
        &self.events
    }

    /// Encode `selector ++ args` for a call to `name`. Also returns the declared
    /// output types used to decode the result.
    pub fn encode_function_input(
        &self,
        name: &str,
        args: &[SolValue],
    ) -> Result<(Vec<u8>, &[DynSolType])> {
        let function = self.function(name)?;
        let encoded = codec::encode_params(&function.inputs, args)?;
        let calldata = [function.selector().as_slice(), encoded.as_slice()].concat();
        Ok((calldata, function.outputs.as_slice()))
    }

    /// Same as `encode_function_input` but with the arguments as text, for example:
    /// `"(1, hello, (0x1111111111111111111111111111111111111111, 5))"`.
    pub fn encode_function_str(&self, name: &str, args: &str) -> Result<(Vec<u8>, &[DynSolType])> {
        let function = self.function(name)?;
        let values = coerce_args(&function.inputs, args)?;
        self.encode_function_input(name, &values)
    }

    /// Encode the information needed to create a contract: the contract bytecode
    /// followed by the encoded constructor arguments.
    pub fn encode_constructor(&self, args: &[SolValue]) -> Result<Vec<u8>> {
        let bytecode = self.bytecode().ok_or(Error::NoBytecode)?;
        let inputs = self.constructor_input_types();
        if inputs.is_empty() {
            if !args.is_empty() {
                return Err(Error::ConstructorTakesNoArgs);
            }
            return Ok(bytecode.to_vec());
        }
        let encoded = codec::encode_params(inputs, args)?;
        Ok([bytecode, encoded.as_slice()].concat())
    }

    /// Decode the return data of `name`: `None` if the function has no outputs,
    /// the bare value for a single output, otherwise a tuple of all of them.
    pub fn decode_output(&self, name: &str, data: &[u8]) -> Result<Option<SolValue>> {
        let function = self.function(name)?;
        decode_outputs(&function.outputs, data)
    }

    /// Decode the logs emitted by this contract. Logs that don't match an event
    /// are skipped.
    pub fn extract_logs(&self, logs: &[Log]) -> Vec<DecodedLog> {
        logs.iter()
            .filter_map(|log| {
                self.events
                    .iter()
                    .find_map(|event| decode_log(event, log).map(|v| (event.name.clone(), v)))
            })
            .collect()
    }
}

/// Apply the output convention to the return data of a call
pub fn decode_outputs(outputs: &[DynSolType], data: &[u8]) -> Result<Option<SolValue>> {
    let mut values = codec::decode_params(outputs, data)?;
    Ok(match values.len() {
        0 => None,
        1 => values.pop(),
        _ => Some(SolValue::Tuple(values)),
    })
}

fn decode_log(event: &EventSignature, log: &Log) -> Option<Vec<SolValue>> {
    let decoded = event.decoder()?.decode_log_data(&log.data, true).ok()?;
    let mut indexed = decoded.indexed.into_iter();
    let mut body = decoded.body.into_iter();
    // back to declaration order
    event
        .inputs
        .iter()
        .map(|input| {
            let value = if input.indexed {
                indexed.next()
            } else {
                body.next()
            };
            codec::from_dyn(value?).ok()
        })
        .collect()
}

fn coerce_args(inputs: &[DynSolType], args: &str) -> Result<Vec<SolValue>> {
    let tuple = DynSolType::Tuple(inputs.to_vec());
    let coerced = tuple
        .coerce_str(args)
        .map_err(|e| Error::type_mismatch(tuple.sol_type_name(), e.to_string()))?;
    match codec::from_dyn(coerced)? {
        SolValue::Tuple(values) => Ok(values),
        other => Err(Error::type_mismatch(
            tuple.sol_type_name(),
            format!("got {other:?}"),
        )),
    }
}
