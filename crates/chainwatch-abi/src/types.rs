//! Parameter, event and function descriptors.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use alloy_primitives::B256;

use crate::error::AbiError;
use crate::signature;

/// Maximum number of indexed parameters an event may declare.
pub const MAX_INDEXED: usize = 3;

/// The closed set of parameter types the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Address,
    /// Unsigned integer, width in bits (8..=256, multiple of 8).
    Uint(u16),
    /// Signed integer, width in bits (8..=256, multiple of 8).
    Int(u16),
    Bool,
    /// `bytes1` .. `bytes32`.
    FixedBytes(u8),
    /// Variable-length `bytes`.
    Bytes,
    /// Variable-length UTF-8 `string`.
    String,
}

impl ParamType {
    /// `bytes` and `string`: offset-encoded in the payload, hashed when indexed.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Bytes | Self::String)
    }

    /// Check width bounds for types constructed directly rather than parsed.
    pub fn validate(&self) -> Result<(), AbiError> {
        match *self {
            Self::Uint(bits) | Self::Int(bits) if !valid_int_width(bits) => {
                Err(AbiError::MalformedSpec(format!("invalid integer width {bits}")))
            }
            Self::FixedBytes(n) if !(1..=32).contains(&n) => {
                Err(AbiError::MalformedSpec(format!("invalid fixed bytes length {n}")))
            }
            _ => Ok(()),
        }
    }
}

fn digits(s: &str) -> Option<u16> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn valid_int_width(bits: u16) -> bool {
    (8..=256).contains(&bits) && bits % 8 == 0
}

impl FromStr for ParamType {
    type Err = AbiError;

    /// Parse an ABI type tag. `uint`/`int` without a width mean 256 bits.
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let unknown = || AbiError::MalformedSpec(format!("unsupported type '{tag}'"));
        let ty = match tag {
            "address" => Self::Address,
            "bool" => Self::Bool,
            "bytes" => Self::Bytes,
            "string" => Self::String,
            "uint" => Self::Uint(256),
            "int" => Self::Int(256),
            _ => {
                if let Some(width) = tag.strip_prefix("uint") {
                    Self::Uint(digits(width).ok_or_else(unknown)?)
                } else if let Some(width) = tag.strip_prefix("int") {
                    Self::Int(digits(width).ok_or_else(unknown)?)
                } else if let Some(len) = tag.strip_prefix("bytes") {
                    let len = digits(len).ok_or_else(unknown)?;
                    Self::FixedBytes(u8::try_from(len).map_err(|_| unknown())?)
                } else {
                    return Err(unknown());
                }
            }
        };
        ty.validate().map_err(|_| unknown())?;
        Ok(ty)
    }
}

impl fmt::Display for ParamType {
    /// Canonical name as used in signatures (`uint256`, never `uint`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => f.write_str("address"),
            Self::Uint(bits) => write!(f, "uint{bits}"),
            Self::Int(bits) => write!(f, "int{bits}"),
            Self::Bool => f.write_str("bool"),
            Self::FixedBytes(n) => write!(f, "bytes{n}"),
            Self::Bytes => f.write_str("bytes"),
            Self::String => f.write_str("string"),
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub indexed: bool,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            indexed: false,
        }
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Key used in decoded output; unnamed parameters get `arg{position}`.
    pub fn key(&self, position: usize) -> String {
        if self.name.is_empty() {
            format!("arg{position}")
        } else {
            self.name.clone()
        }
    }
}

fn canonical_signature(name: &str, params: &[ParamSpec]) -> String {
    let types: Vec<String> = params.iter().map(|p| p.ty.to_string()).collect();
    format!("{name}({})", types.join(","))
}

/// A declared event. Immutable once built; the signature hash is computed
/// on first use and cached.
#[derive(Debug, Clone)]
pub struct EventSpec {
    pub name: String,
    pub params: Vec<ParamSpec>,
    /// Anonymous events carry no signature topic and are never matched.
    pub anonymous: bool,
    hash: OnceLock<B256>,
}

impl EventSpec {
    pub fn new(name: impl Into<String>, params: Vec<ParamSpec>) -> Self {
        Self {
            name: name.into(),
            params,
            anonymous: false,
            hash: OnceLock::new(),
        }
    }

    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    /// `Name(type1,type2,...)`. Parameter names and indexed flags are excluded.
    pub fn signature(&self) -> String {
        canonical_signature(&self.name, &self.params)
    }

    pub fn signature_hash(&self) -> B256 {
        *self
            .hash
            .get_or_init(|| signature::signature_hash(&self.signature()))
    }

    pub fn indexed_count(&self) -> usize {
        self.params.iter().filter(|p| p.indexed).count()
    }

    pub(crate) fn validate(&self) -> Result<(), AbiError> {
        if self.name.is_empty() {
            return Err(AbiError::MalformedSpec("event without a name".into()));
        }
        for param in &self.params {
            param.ty.validate()?;
        }
        let indexed = self.indexed_count();
        if indexed > MAX_INDEXED {
            return Err(AbiError::MalformedSpec(format!(
                "event {} declares {indexed} indexed parameters (max {MAX_INDEXED})",
                self.name
            )));
        }
        Ok(())
    }
}

impl PartialEq for EventSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.params == other.params && self.anonymous == other.anonymous
    }
}

impl Eq for EventSpec {}

/// A declared function, used for read calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    pub name: String,
    pub inputs: Vec<ParamSpec>,
    pub outputs: Vec<ParamSpec>,
}

impl FunctionSpec {
    pub fn new(name: impl Into<String>, inputs: Vec<ParamSpec>, outputs: Vec<ParamSpec>) -> Self {
        Self {
            name: name.into(),
            inputs,
            outputs,
        }
    }

    pub fn signature(&self) -> String {
        canonical_signature(&self.name, &self.inputs)
    }

    pub fn selector(&self) -> [u8; 4] {
        signature::selector(&self.signature())
    }

    pub(crate) fn validate(&self) -> Result<(), AbiError> {
        self.inputs
            .iter()
            .chain(&self.outputs)
            .try_for_each(|p| p.ty.validate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_type_tags() {
        assert_eq!("uint".parse::<ParamType>().unwrap(), ParamType::Uint(256));
        assert_eq!("int24".parse::<ParamType>().unwrap(), ParamType::Int(24));
        assert_eq!("bytes32".parse::<ParamType>().unwrap(), ParamType::FixedBytes(32));
        assert_eq!("bytes".parse::<ParamType>().unwrap(), ParamType::Bytes);
        assert_eq!("string".parse::<ParamType>().unwrap(), ParamType::String);
    }

    #[test]
    fn rejects_unknown_and_bad_widths() {
        for tag in ["uint7", "uint264", "int0", "bytes0", "bytes33", "tuple", "address[]", "uint256[2]", "uint+8", "fixed"] {
            assert!(tag.parse::<ParamType>().is_err(), "{tag} should be rejected");
        }
    }

    #[test]
    fn canonical_signature_uses_full_widths() {
        let event = EventSpec::new(
            "Swap",
            vec![
                ParamSpec::new("sender", "address".parse().unwrap()).indexed(),
                ParamSpec::new("amount", "uint".parse().unwrap()),
            ],
        );
        assert_eq!(event.signature(), "Swap(address,uint256)");
    }

    #[test]
    fn hash_ignores_names_and_indexed_flags() {
        let a = EventSpec::new(
            "Transfer",
            vec![
                ParamSpec::new("from", ParamType::Address).indexed(),
                ParamSpec::new("to", ParamType::Address).indexed(),
                ParamSpec::new("value", ParamType::Uint(256)),
            ],
        );
        let b = EventSpec::new(
            "Transfer",
            vec![
                ParamSpec::new("src", ParamType::Address),
                ParamSpec::new("dst", ParamType::Address),
                ParamSpec::new("wad", ParamType::Uint(256)).indexed(),
            ],
        );
        assert_eq!(a.signature_hash(), b.signature_hash());
        assert_eq!(a.signature_hash(), a.signature_hash());
    }

    #[test]
    fn too_many_indexed_is_malformed() {
        let event = EventSpec::new(
            "Busy",
            (0..4)
                .map(|i| ParamSpec::new(format!("p{i}"), ParamType::Uint(256)).indexed())
                .collect(),
        );
        assert!(matches!(event.validate(), Err(AbiError::MalformedSpec(_))));
    }

    #[test]
    fn unnamed_params_get_positional_keys() {
        let p = ParamSpec::new("", ParamType::Bool);
        assert_eq!(p.key(2), "arg2");
    }
}
