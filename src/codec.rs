//!
//! Encode and decode [`SolValue`]s to/from ABI words
//!
//! Values are checked against the declared [`DynSolType`] and converted to alloy's
//! `DynSolValue`, which does the head/tail layout. Decoding goes the other way and
//! rejects words that are not canonical for their declared width.
//!
use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{I256, U256};

use crate::{
    errors::{Error, Result},
    types::{check_type, SolValue},
};

/// Encode a single value. This is the same as encoding a parameter list of one,
/// so dynamic values are preceded by their offset word.
pub fn encode(ty: &DynSolType, value: &SolValue) -> Result<Vec<u8>> {
    check_type(ty)?;
    Ok(to_dyn(ty, value)?.abi_encode())
}

/// Encode function/constructor arguments.
pub fn encode_params(types: &[DynSolType], values: &[SolValue]) -> Result<Vec<u8>> {
    if types.len() != values.len() {
        return Err(Error::ArgumentCountMismatch {
            expected: types.len(),
            got: values.len(),
        });
    }
    let tokens = types
        .iter()
        .zip(values)
        .map(|(ty, value)| {
            check_type(ty)?;
            to_dyn(ty, value)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(DynSolValue::Tuple(tokens).abi_encode_params())
}

/// Decode a single value produced by [`encode`].
pub fn decode(ty: &DynSolType, data: &[u8]) -> Result<SolValue> {
    check_type(ty)?;
    let value = ty
        .abi_decode(data)
        .map_err(|e| Error::type_mismatch(ty.sol_type_name(), e.to_string()))?;
    from_dyn(value)
}

/// Decode a parameter list, e.g. the return data of a call.
pub fn decode_params(types: &[DynSolType], data: &[u8]) -> Result<Vec<SolValue>> {
    if types.is_empty() {
        return Ok(Vec::new());
    }
    types.iter().try_for_each(check_type)?;
    let tuple = DynSolType::Tuple(types.to_vec());
    let decoded = tuple
        .abi_decode_sequence(data)
        .map_err(|e| Error::type_mismatch(tuple.sol_type_name(), e.to_string()))?;
    match decoded {
        DynSolValue::Tuple(values) => values.into_iter().map(from_dyn).collect(),
        other => Err(Error::type_mismatch(
            tuple.sol_type_name(),
            format!("got {other:?}"),
        )),
    }
}

/// Convert to alloy's representation, checking the value fits `ty`
pub(crate) fn to_dyn(ty: &DynSolType, value: &SolValue) -> Result<DynSolValue> {
    let mismatch = |reason: String| Error::type_mismatch(ty.sol_type_name(), reason);
    Ok(match (ty, value) {
        (DynSolType::Uint(bits), _) => DynSolValue::Uint(to_uint(ty, *bits, value)?, *bits),
        (DynSolType::Int(bits), _) => DynSolValue::Int(to_int(ty, *bits, value)?, *bits),
        (DynSolType::Address, SolValue::Address(address)) => DynSolValue::Address(*address),
        (DynSolType::Bool, SolValue::Bool(b)) => DynSolValue::Bool(*b),
        (DynSolType::FixedBytes(size), SolValue::FixedBytes(bytes) | SolValue::Bytes(bytes)) => {
            if bytes.len() != *size {
                return Err(mismatch(format!(
                    "expected {size} bytes, got {}",
                    bytes.len()
                )));
            }
            let mut word = [0u8; 32];
            word.get_mut(..*size)
                .ok_or_else(|| mismatch("illegal fixed bytes size".into()))?
                .copy_from_slice(bytes);
            DynSolValue::FixedBytes(word.into(), *size)
        }
        (DynSolType::Bytes, SolValue::Bytes(bytes)) => DynSolValue::Bytes(bytes.clone()),
        (DynSolType::String, SolValue::String(s)) => DynSolValue::String(s.clone()),
        (DynSolType::Array(inner), SolValue::Array(values)) => DynSolValue::Array(
            values
                .iter()
                .map(|v| to_dyn(inner, v))
                .collect::<Result<_>>()?,
        ),
        (DynSolType::FixedArray(inner, len), SolValue::Array(values)) => {
            if values.len() != *len {
                return Err(mismatch(format!(
                    "expected {len} elements, got {}",
                    values.len()
                )));
            }
            DynSolValue::FixedArray(
                values
                    .iter()
                    .map(|v| to_dyn(inner, v))
                    .collect::<Result<_>>()?,
            )
        }
        (DynSolType::Tuple(fields), SolValue::Tuple(values)) => {
            if values.len() != fields.len() {
                return Err(mismatch(format!(
                    "expected {} fields, got {}",
                    fields.len(),
                    values.len()
                )));
            }
            DynSolValue::Tuple(
                fields
                    .iter()
                    .zip(values)
                    .map(|(t, v)| to_dyn(t, v))
                    .collect::<Result<_>>()?,
            )
        }
        (_, other) => return Err(mismatch(format!("got {other:?}"))),
    })
}

/// Convert from alloy's representation. Integers and fixed bytes must be
/// canonical for their width.
pub(crate) fn from_dyn(value: DynSolValue) -> Result<SolValue> {
    Ok(match value {
        DynSolValue::Bool(b) => SolValue::Bool(b),
        DynSolValue::Uint(v, bits) => {
            if !uint_fits(bits, v) {
                return Err(Error::type_mismatch(
                    format!("uint{bits}"),
                    "value has bits set above its width",
                ));
            }
            SolValue::Uint(v)
        }
        DynSolValue::Int(v, bits) => {
            let (min, max) = int_bounds(bits);
            if v < min || v > max {
                return Err(Error::type_mismatch(
                    format!("int{bits}"),
                    "value is not sign-extended from its width",
                ));
            }
            SolValue::Int(v)
        }
        DynSolValue::FixedBytes(word, size) => {
            let (bytes, rest) = word.split_at(size.min(32));
            if rest.iter().any(|b| *b != 0) {
                return Err(Error::type_mismatch(
                    format!("bytes{size}"),
                    "dirty low-order bytes",
                ));
            }
            SolValue::FixedBytes(bytes.to_vec())
        }
        DynSolValue::Address(a) => SolValue::Address(a),
        DynSolValue::Bytes(b) => SolValue::Bytes(b),
        DynSolValue::String(s) => SolValue::String(s),
        DynSolValue::Array(values) | DynSolValue::FixedArray(values) => {
            SolValue::Array(values.into_iter().map(from_dyn).collect::<Result<_>>()?)
        }
        DynSolValue::Tuple(values) => {
            SolValue::Tuple(values.into_iter().map(from_dyn).collect::<Result<_>>()?)
        }
        other => {
            return Err(Error::type_mismatch(
                "value",
                format!("unsupported {other:?}"),
            ))
        }
    })
}

fn uint_fits(bits: usize, value: U256) -> bool {
    bits >= 256 || (value >> bits).is_zero()
}

/// Inclusive (min, max) for a signed integer of `bits` width
fn int_bounds(bits: usize) -> (I256, I256) {
    let bits = bits.clamp(1, 256);
    let max = I256::from_raw((U256::from(1) << (bits - 1)) - U256::from(1));
    (-max - I256::ONE, max)
}

fn to_uint(ty: &DynSolType, bits: usize, value: &SolValue) -> Result<U256> {
    let raw = match value {
        SolValue::Uint(v) => *v,
        SolValue::Int(v) if !v.is_negative() => v.into_raw(),
        SolValue::Int(_) => return Err(Error::type_mismatch(ty.sol_type_name(), "negative value")),
        other => {
            return Err(Error::type_mismatch(
                ty.sol_type_name(),
                format!("got {other:?}"),
            ))
        }
    };
    if !uint_fits(bits, raw) {
        return Err(Error::type_mismatch(
            ty.sol_type_name(),
            format!("{raw} is out of range"),
        ));
    }
    Ok(raw)
}

fn to_int(ty: &DynSolType, bits: usize, value: &SolValue) -> Result<I256> {
    let (min, max) = int_bounds(bits);
    let signed = match value {
        SolValue::Int(v) => *v,
        SolValue::Uint(v) if *v <= max.into_raw() => I256::from_raw(*v),
        SolValue::Uint(v) => {
            return Err(Error::type_mismatch(
                ty.sol_type_name(),
                format!("{v} is out of range"),
            ))
        }
        other => {
            return Err(Error::type_mismatch(
                ty.sol_type_name(),
                format!("got {other:?}"),
            ))
        }
    };
    if signed < min || signed > max {
        return Err(Error::type_mismatch(
            ty.sol_type_name(),
            format!("{signed} is out of range"),
        ));
    }
    Ok(signed)
}
