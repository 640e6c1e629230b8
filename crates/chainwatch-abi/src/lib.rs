//! chainwatch-abi — contract interface descriptors and EVM log decoding.
//!
//! Supports the scalar ABI types (`address`, `uintN`, `intN`, `bool`,
//! `bytesN`) plus dynamic `bytes` and `string`. Indexed parameters are read
//! from `topics[1..]`, the rest from the head words of the log payload.
//! Indexed dynamic values are only available as their keccak256 hash.

pub mod call;
pub mod decoder;
pub mod erc20;
pub mod error;
pub mod interface;
pub mod signature;
pub mod types;
pub mod value;
pub mod word;

pub use decoder::{DecodedEvent, LogDecoder};
pub use error::{AbiError, DecodeError};
pub use interface::Interface;
pub use types::{EventSpec, FunctionSpec, ParamSpec, ParamType};
pub use value::ParamValue;
