//! Decoded parameter values.

use std::fmt;

use alloy_primitives::{Address, B256, I256, U256};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::AbiError;
use crate::types::ParamType;

/// A typed value recovered from a log or call output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Address(Address),
    Uint(U256),
    Int(I256),
    Bool(bool),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    /// keccak256 of an indexed dynamic value; the value itself is not recoverable.
    Hash(B256),
}

impl ParamValue {
    /// Tag used in the serialized form.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Address(_) => "address",
            Self::Uint(_) => "uint",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::FixedBytes(_) => "fixedBytes",
            Self::Bytes(_) => "bytes",
            Self::String(_) => "string",
            Self::Hash(_) => "hash",
        }
    }

    /// Parse a command-line style argument as a value of type `ty`.
    ///
    /// Integers accept decimal or `0x` hex; byte types take hex.
    pub fn parse(ty: ParamType, input: &str) -> Result<Self, AbiError> {
        let bad = |reason: String| AbiError::Encode {
            param: ty.to_string(),
            reason,
        };
        let input = input.trim();
        match ty {
            ParamType::Address => input
                .parse::<Address>()
                .map(Self::Address)
                .map_err(|e| bad(format!("invalid address '{input}': {e}"))),
            ParamType::Uint(_) => input
                .parse::<U256>()
                .map(Self::Uint)
                .map_err(|e| bad(format!("invalid unsigned integer '{input}': {e}"))),
            ParamType::Int(_) => input
                .parse::<I256>()
                .map(Self::Int)
                .map_err(|e| bad(format!("invalid signed integer '{input}': {e}"))),
            ParamType::Bool => match input {
                "true" => Ok(Self::Bool(true)),
                "false" => Ok(Self::Bool(false)),
                other => Err(bad(format!("invalid bool '{other}'"))),
            },
            ParamType::FixedBytes(n) => {
                let bytes = decode_hex(input).map_err(bad)?;
                if bytes.len() != usize::from(n) {
                    return Err(bad(format!("expected {n} bytes, got {}", bytes.len())));
                }
                Ok(Self::FixedBytes(bytes))
            }
            ParamType::Bytes => decode_hex(input).map(Self::Bytes).map_err(bad),
            ParamType::String => Ok(Self::String(input.to_string())),
        }
    }
}

fn decode_hex(input: &str) -> Result<Vec<u8>, String> {
    let digits = input.strip_prefix("0x").unwrap_or(input);
    hex::decode(digits).map_err(|e| format!("invalid hex '{input}': {e}"))
}

fn hex_string(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(a) => f.write_str(&a.to_checksum(None)),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::FixedBytes(b) | Self::Bytes(b) => f.write_str(&hex_string(b)),
            Self::String(s) => f.write_str(s),
            Self::Hash(h) => f.write_str(&hex_string(h.as_slice())),
        }
    }
}

/// `{"type": "<kind>", "value": ...}`. Integers are decimal strings so no
/// precision is lost in JSON consumers.
impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ParamValue", 2)?;
        state.serialize_field("type", self.kind())?;
        match self {
            Self::Bool(b) => state.serialize_field("value", b)?,
            Self::String(s) => state.serialize_field("value", s)?,
            other => state.serialize_field("value", &other.to_string())?,
        }
        state.end()
    }
}
