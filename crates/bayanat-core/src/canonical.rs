//! Canonical CBOR encoding for deterministic serialization.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats
//!
//! Predicates are committed next to the ciphertext they gate, and every
//! node of the encryption network re-encodes the predicate it is handed.
//! Both sides must therefore produce identical bytes.

use ciborium::value::Value;

use crate::error::{CoreError, Result};
use crate::predicate::{Predicate, ReturnValueTest};
use crate::types::LedgerAddress;

/// Version tag of the predicate encoding.
pub const PREDICATE_VERSION: u8 = 1;

/// Predicate field keys (integer keys for compact encoding).
mod keys {
    pub const VERSION: u64 = 0;
    pub const CHAIN: u64 = 1;
    pub const LEDGER: u64 = 2;
    pub const METHOD: u64 = 3;
    pub const PARAMETERS: u64 = 4;
    pub const COMPARATOR: u64 = 5;
    pub const EXPECTED: u64 = 6;
}

/// Encode a predicate to canonical CBOR bytes.
pub fn predicate_bytes(predicate: &Predicate) -> Result<Vec<u8>> {
    encode_canonical(&predicate_to_value(predicate))
}

/// Decode a predicate, rejecting any encoding that is not canonical.
pub fn decode_predicate(bytes: &[u8]) -> Result<Predicate> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))?;
    let predicate = value_to_predicate(&value)?;

    if predicate_bytes(&predicate)? != bytes {
        return Err(CoreError::DecodingError(
            "predicate encoding is not canonical".into(),
        ));
    }
    Ok(predicate)
}

fn predicate_to_value(p: &Predicate) -> Value {
    let params: Vec<Value> = p.parameters.iter().map(|s| Value::Text(s.clone())).collect();

    Value::Map(vec![
        (int(keys::VERSION), Value::Integer(PREDICATE_VERSION.into())),
        (int(keys::CHAIN), Value::Text(p.chain.clone())),
        (int(keys::LEDGER), Value::Bytes(p.ledger.0.to_vec())),
        (int(keys::METHOD), Value::Text(p.method.clone())),
        (int(keys::PARAMETERS), Value::Array(params)),
        (
            int(keys::COMPARATOR),
            Value::Text(p.return_value_test.comparator.clone()),
        ),
        (
            int(keys::EXPECTED),
            Value::Text(p.return_value_test.value.clone()),
        ),
    ])
}

fn value_to_predicate(value: &Value) -> Result<Predicate> {
    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CoreError::DecodingError("expected map".into())),
    };

    let get = |key: u64| -> Option<&Value> {
        map.iter()
            .find(|(k, _)| match k {
                Value::Integer(i) => i128::from(*i) == key as i128,
                _ => false,
            })
            .map(|(_, v)| v)
    };

    let text = |key: u64, name: &str| -> Result<String> {
        match get(key) {
            Some(Value::Text(s)) => Ok(s.clone()),
            _ => Err(CoreError::DecodingError(format!("missing {}", name))),
        }
    };

    match get(keys::VERSION) {
        Some(Value::Integer(i)) if i128::from(*i) == PREDICATE_VERSION as i128 => {}
        Some(Value::Integer(i)) => {
            return Err(CoreError::DecodingError(format!(
                "unsupported predicate version {}",
                i128::from(*i)
            )))
        }
        _ => return Err(CoreError::DecodingError("missing version".into())),
    }

    let ledger = match get(keys::LEDGER) {
        Some(Value::Bytes(b)) if b.len() == 20 => {
            let mut arr = [0u8; 20];
            arr.copy_from_slice(b);
            LedgerAddress(arr)
        }
        _ => return Err(CoreError::DecodingError("invalid ledger".into())),
    };

    let parameters = match get(keys::PARAMETERS) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Text(s) => Ok(s.clone()),
                _ => Err(CoreError::DecodingError("non-text parameter".into())),
            })
            .collect::<Result<Vec<_>>>()?,
        _ => return Err(CoreError::DecodingError("missing parameters".into())),
    };

    Ok(Predicate {
        chain: text(keys::CHAIN, "chain")?,
        ledger,
        method: text(keys::METHOD, "method")?,
        parameters,
        return_value_test: ReturnValueTest {
            comparator: text(keys::COMPARATOR, "comparator")?,
            value: text(keys::EXPECTED, "expected value")?,
        },
    })
}

fn int(key: u64) -> Value {
    Value::Integer(key.into())
}

/// Encode a CBOR Value to canonical bytes.
///
/// Fails on floats, tags and any value kind without a deterministic
/// encoding.
pub fn encode_canonical(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i)?,
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item)?;
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => {
            return Err(CoreError::EncodingError(
                "floats not supported in canonical encoding".into(),
            ))
        }
        _ => {
            return Err(CoreError::EncodingError(
                "unsupported CBOR value type".into(),
            ))
        }
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) -> Result<()> {
    let n: i128 = i.into();

    if n >= 0 {
        let n = u64::try_from(n)
            .map_err(|_| CoreError::EncodingError("integer out of range".into()))?;
        encode_uint(buf, 0, n);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = u64::try_from(-1 - n)
            .map_err(|_| CoreError::EncodingError("integer out of range".into()))?;
        encode_uint(buf, 1, abs);
    }
    Ok(())
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<()> {
    let mut pairs = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}
