//! Keccak-256 signature hashing.
//!
//! The signature hash of an event is the keccak256 of its canonical
//! signature string, e.g.:
//!   keccak256("Transfer(address,address,uint256)")
//!   → 0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef
//!
//! A function selector is the first four bytes of the same hash taken over
//! the function's canonical signature.

use alloy_primitives::B256;
use tiny_keccak::{Hasher, Keccak};

/// keccak256 of arbitrary bytes.
pub fn keccak256(input: &[u8]) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(input);
    hasher.finalize(&mut output);
    B256::from(output)
}

/// Hash of a canonical signature string such as `"Approval(address,address,uint256)"`.
pub fn signature_hash(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

/// 4-byte selector of a canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = signature_hash(signature);
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}
