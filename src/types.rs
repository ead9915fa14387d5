//!
//! Solidity values, and the rules a [`DynSolType`] must follow to be used by the codec
//!
use alloy_dyn_abi::DynSolType;
use alloy_primitives::{Address, I256, U256};

use crate::errors::{Error, Result};

/// Size of an ABI word in bytes
pub const WORD_SIZE: usize = 32;

/// Is `bits` one of the legal integer widths?
pub fn is_legal_int_width(bits: usize) -> bool {
    (8..=256).contains(&bits) && bits % 8 == 0
}

/// Check the type can appear in a contract signature: legal widths, no function
/// pointers or empty tuples, and a head that fits in memory.
pub fn check_type(ty: &DynSolType) -> Result<()> {
    head_size(ty).map(|_| ())
}

/// Dynamic types are encoded in the tail with an offset in the head.
pub fn is_dynamic(ty: &DynSolType) -> bool {
    match ty {
        DynSolType::Bytes | DynSolType::String | DynSolType::Array(_) => true,
        DynSolType::FixedArray(inner, _) => is_dynamic(inner),
        DynSolType::Tuple(fields) => fields.iter().any(is_dynamic),
        _ => false,
    }
}

/// Number of bytes the type occupies in the head of an enclosing sequence.
/// Fails for types [`check_type`] rejects.
pub fn head_size(ty: &DynSolType) -> Result<usize> {
    let too_large = || Error::type_mismatch(ty.sol_type_name(), "type is too large to encode");
    match ty {
        DynSolType::Uint(bits) | DynSolType::Int(bits) if !is_legal_int_width(*bits) => Err(
            Error::type_mismatch(ty.sol_type_name(), "illegal integer width"),
        ),
        DynSolType::FixedBytes(size) if !(1..=32).contains(size) => Err(Error::type_mismatch(
            ty.sol_type_name(),
            "illegal fixed bytes size",
        )),
        DynSolType::Array(inner) => head_size(inner).map(|_| WORD_SIZE),
        DynSolType::FixedArray(_, 0) => Err(Error::type_mismatch(
            ty.sol_type_name(),
            "fixed arrays need at least one element",
        )),
        DynSolType::FixedArray(inner, len) => {
            let size = head_size(inner)?.checked_mul(*len).ok_or_else(too_large)?;
            Ok(if is_dynamic(inner) { WORD_SIZE } else { size })
        }
        DynSolType::Tuple(fields) if fields.is_empty() => {
            Err(Error::type_mismatch("()", "empty tuples are not supported"))
        }
        DynSolType::Tuple(fields) => {
            let mut size = 0usize;
            for field in fields {
                size = size.checked_add(head_size(field)?).ok_or_else(too_large)?;
            }
            Ok(if is_dynamic(ty) { WORD_SIZE } else { size })
        }
        DynSolType::Address
        | DynSolType::Bool
        | DynSolType::Uint(_)
        | DynSolType::Int(_)
        | DynSolType::FixedBytes(_)
        | DynSolType::Bytes
        | DynSolType::String => Ok(WORD_SIZE),
        other => Err(Error::type_mismatch(
            other.sol_type_name(),
            "type is not supported",
        )),
    }
}

/// The canonical form used in signatures: `uint256`, `(address,bool)[]`, `(uint8)`, ...
pub fn canonical_name(ty: &DynSolType) -> String {
    match ty {
        DynSolType::Array(inner) => format!("{}[]", canonical_name(inner)),
        DynSolType::FixedArray(inner, len) => format!("{}[{len}]", canonical_name(inner)),
        DynSolType::Tuple(fields) => format!("({})", canonical_list(fields)),
        other => other.sol_type_name().into_owned(),
    }
}

/// Comma separated canonical names
pub fn canonical_list(types: &[DynSolType]) -> String {
    types
        .iter()
        .map(canonical_name)
        .collect::<Vec<_>>()
        .join(",")
}

/// A decoded (or to be encoded) Solidity value.
///
/// The value does not carry its width: the [`DynSolType`] it is encoded with, or decoded from,
/// decides that. Both fixed and dynamic arrays are represented by `Array`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SolValue {
    Bool(bool),
    Uint(U256),
    Int(I256),
    Address(Address),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<SolValue>),
    Tuple(Vec<SolValue>),
}

impl SolValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SolValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            SolValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<I256> {
        match self {
            SolValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            SolValue::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SolValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Raw bytes of either `bytes` or `bytesN`
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SolValue::Bytes(b) | SolValue::FixedBytes(b) => Some(b),
            _ => None,
        }
    }

    /// Members of an array or tuple
    pub fn as_slice(&self) -> Option<&[SolValue]> {
        match self {
            SolValue::Array(v) | SolValue::Tuple(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for SolValue {
            fn from(v: $t) -> Self {
                SolValue::Uint(U256::from(v))
            }
        })*
    };
}

macro_rules! from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for SolValue {
            fn from(v: $t) -> Self {
                SolValue::Int(i256_from_i128(v as i128))
            }
        })*
    };
}

from_unsigned!(u8, u16, u32, u64, u128, usize);
from_signed!(i8, i16, i32, i64, i128);

fn i256_from_i128(v: i128) -> I256 {
    let magnitude = I256::from_raw(U256::from(v.unsigned_abs()));
    if v < 0 {
        -magnitude
    } else {
        magnitude
    }
}

impl From<U256> for SolValue {
    fn from(v: U256) -> Self {
        SolValue::Uint(v)
    }
}

impl From<I256> for SolValue {
    fn from(v: I256) -> Self {
        SolValue::Int(v)
    }
}

impl From<bool> for SolValue {
    fn from(v: bool) -> Self {
        SolValue::Bool(v)
    }
}

impl From<Address> for SolValue {
    fn from(v: Address) -> Self {
        SolValue::Address(v)
    }
}

impl From<&str> for SolValue {
    fn from(v: &str) -> Self {
        SolValue::String(v.to_string())
    }
}

impl From<String> for SolValue {
    fn from(v: String) -> Self {
        SolValue::String(v)
    }
}

impl From<Vec<u8>> for SolValue {
    fn from(v: Vec<u8>) -> Self {
        SolValue::Bytes(v)
    }
}
