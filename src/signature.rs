//!
//! Canonical function, constructor and event signatures.
//!
//! Signatures are built either from the entries of a JSON abi (via `alloy-json-abi`),
//! or from human-readable lines such as:
//!
//! - `function hello(uint256, (address,bool)[]) (string)`
//! - `function total() view returns (uint256)`
//! - `event Transfer(address indexed from, address indexed to, uint256 value)`
//!
//! Type names are resolved with `alloy-dyn-abi` and then checked with
//! [`check_type`](crate::types::check_type).
//!
use alloy_dyn_abi::{DynSolEvent, DynSolType, Specifier};
use alloy_json_abi::{Constructor, Event, EventParam, Function, Param, StateMutability};
use alloy_primitives::{keccak256, B256};

use crate::{
    errors::{Error, Result},
    types::{canonical_list, canonical_name, check_type},
};

/// Most topics a log can carry
const MAX_TOPICS: usize = 4;

/// Mutability declared for a function or constructor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mutability {
    Pure,
    View,
    #[default]
    NonPayable,
    Payable,
}

impl Mutability {
    /// Pure and view functions never change state
    pub fn is_read_only(&self) -> bool {
        matches!(self, Mutability::Pure | Mutability::View)
    }

    pub fn is_payable(&self) -> bool {
        matches!(self, Mutability::Payable)
    }
}

impl From<StateMutability> for Mutability {
    fn from(value: StateMutability) -> Self {
        match value {
            StateMutability::Pure => Mutability::Pure,
            StateMutability::View => Mutability::View,
            StateMutability::NonPayable => Mutability::NonPayable,
            StateMutability::Payable => Mutability::Payable,
        }
    }
}

/// Parse a Solidity type name. `uint`/`int` are aliases for the 256 bit versions
/// and tuples may be written either as `(..)` or `tuple(..)`.
pub fn parse_type(name: &str) -> Result<DynSolType> {
    let ty = DynSolType::parse(name.trim()).map_err(|e| Error::abi_parse(name, e))?;
    check_type(&ty).map_err(|e| Error::abi_parse(name, e))?;
    Ok(ty)
}

/// Resolve the type of a json abi parameter, expanding tuple components.
pub fn param_type(param: &Param) -> Result<DynSolType> {
    checked(param.resolve(), &param.ty)
}

fn event_param_type(param: &EventParam) -> Result<DynSolType> {
    checked(param.resolve(), &param.ty)
}

fn checked(resolved: alloy_dyn_abi::Result<DynSolType>, name: &str) -> Result<DynSolType> {
    let ty = resolved.map_err(|e| Error::abi_parse(name, e))?;
    check_type(&ty).map_err(|e| Error::abi_parse(name, e))?;
    Ok(ty)
}

/// Drop the names of tuple components, which the human-readable grammar
/// doesn't allow: `((address owner, uint256 value) input)` becomes
/// `((address,uint256) input)`. Parameter names at the top level are kept.
pub(crate) fn strip_component_names(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut depth = 0usize;
    let mut started = false;
    let mut skipping = false;
    for c in line.chars() {
        match c {
            '(' => {
                depth += 1;
                started = false;
            }
            ')' | ',' => {
                skipping = false;
                if c == ')' {
                    depth = depth.saturating_sub(1);
                    started = true;
                } else {
                    started = false;
                }
            }
            c if depth >= 2 && c.is_whitespace() => {
                skipping |= started;
                continue;
            }
            _ if skipping => continue,
            _ => started = true,
        }
        out.push(c);
    }
    out
}

/// A function entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: String,
    pub inputs: Vec<DynSolType>,
    pub outputs: Vec<DynSolType>,
    pub mutability: Mutability,
}

impl FunctionSignature {
    /// `name(type,...)` with tuples expanded
    pub fn canonical(&self) -> String {
        format!("{}({})", self.name, canonical_list(&self.inputs))
    }

    /// First 4 bytes of the keccak256 hash of the canonical signature
    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.canonical());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    /// Parse a human-readable function,
    /// `function NAME(INPUTS) [visibility] [view|pure|payable] [returns] [(OUTPUTS)]`
    pub fn parse(line: &str) -> Result<Self> {
        let function = Function::parse(&strip_component_names(line.trim()))
            .map_err(|e| Error::abi_parse(line.trim(), e))?;
        Self::try_from(&function)
    }
}

impl TryFrom<&Function> for FunctionSignature {
    type Error = Error;

    fn try_from(function: &Function) -> Result<Self> {
        let in_entry = |e: Error| Error::abi_parse(format!("function {}", function.name), e);
        Ok(Self {
            name: function.name.clone(),
            inputs: function
                .inputs
                .iter()
                .map(param_type)
                .collect::<Result<_>>()
                .map_err(in_entry)?,
            outputs: function
                .outputs
                .iter()
                .map(param_type)
                .collect::<Result<_>>()
                .map_err(in_entry)?,
            mutability: function.state_mutability.into(),
        })
    }
}

/// The constructor has no name or selector.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstructorSignature {
    pub inputs: Vec<DynSolType>,
    pub mutability: Mutability,
}

impl TryFrom<&Constructor> for ConstructorSignature {
    type Error = Error;

    fn try_from(constructor: &Constructor) -> Result<Self> {
        Ok(Self {
            inputs: constructor
                .inputs
                .iter()
                .map(param_type)
                .collect::<Result<_>>()
                .map_err(|e| Error::abi_parse("constructor", e))?,
            mutability: constructor.state_mutability.into(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventInput {
    pub ty: DynSolType,
    pub indexed: bool,
}

/// An event entry. Non-anonymous events are identified by `topic0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventSignature {
    pub name: String,
    pub inputs: Vec<EventInput>,
    pub anonymous: bool,
}

impl EventSignature {
    pub fn canonical(&self) -> String {
        let types = self
            .inputs
            .iter()
            .map(|i| canonical_name(&i.ty))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}({types})", self.name)
    }

    pub fn topic0(&self) -> B256 {
        keccak256(self.canonical())
    }

    /// Number of topics a matching log carries
    pub fn topic_count(&self) -> usize {
        let indexed = self.inputs.iter().filter(|i| i.indexed).count();
        if self.anonymous {
            indexed
        } else {
            indexed + 1
        }
    }

    /// Decoder for logs emitted by this event
    pub fn decoder(&self) -> Option<DynSolEvent> {
        let (indexed, body): (Vec<&EventInput>, Vec<&EventInput>) =
            self.inputs.iter().partition(|i| i.indexed);
        DynSolEvent::new(
            (!self.anonymous).then(|| self.topic0()),
            indexed.into_iter().map(|i| i.ty.clone()).collect(),
            DynSolType::Tuple(body.into_iter().map(|i| i.ty.clone()).collect()),
        )
    }

    /// Parse a human-readable event, `event NAME(TYPE [indexed] [name], ...) [anonymous]`
    pub fn parse(line: &str) -> Result<Self> {
        let event = Event::parse(&strip_component_names(line.trim()))
            .map_err(|e| Error::abi_parse(line.trim(), e))?;
        Self::try_from(&event)
    }
}

impl TryFrom<&Event> for EventSignature {
    type Error = Error;

    fn try_from(event: &Event) -> Result<Self> {
        let entry = || format!("event {}", event.name);
        let inputs = event
            .inputs
            .iter()
            .map(|p| {
                Ok(EventInput {
                    ty: event_param_type(p)?,
                    indexed: p.indexed,
                })
            })
            .collect::<Result<_>>()
            .map_err(|e| Error::abi_parse(entry(), e))?;
        let signature = Self {
            name: event.name.clone(),
            inputs,
            anonymous: event.anonymous,
        };
        if signature.topic_count() > MAX_TOPICS {
            return Err(Error::abi_parse(entry(), "too many indexed parameters"));
        }
        Ok(signature)
    }
}
