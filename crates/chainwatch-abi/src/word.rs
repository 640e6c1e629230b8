//! Per-type decoding of 32-byte ABI words.
//!
//! Static types live directly in one word (a topic or a payload head word).
//! Dynamic types (`bytes`, `string`) keep an offset in their head word and
//! the length-prefixed data further along the payload; when indexed, their
//! topic holds only the keccak256 of the value.

use alloy_primitives::{Address, B256, I256, U256};

use crate::types::ParamType;
use crate::value::ParamValue;

pub const WORD: usize = 32;

/// Decode a static value from one word. `None` for dynamic types.
pub fn decode_static(ty: ParamType, word: &B256) -> Option<ParamValue> {
    let value = match ty {
        ParamType::Address => ParamValue::Address(Address::from_slice(&word[12..])),
        ParamType::Uint(_) => ParamValue::Uint(U256::from_be_bytes(word.0)),
        ParamType::Int(_) => ParamValue::Int(I256::from_raw(U256::from_be_bytes(word.0))),
        ParamType::Bool => ParamValue::Bool(word[WORD - 1] != 0),
        ParamType::FixedBytes(n) => ParamValue::FixedBytes(word[..usize::from(n)].to_vec()),
        ParamType::Bytes | ParamType::String => return None,
    };
    Some(value)
}

/// Decode an indexed parameter from its topic.
///
/// Dynamic types come back as [`ParamValue::Hash`].
pub fn decode_indexed_topic(ty: ParamType, topic: &B256) -> ParamValue {
    decode_static(ty, topic).unwrap_or(ParamValue::Hash(*topic))
}

/// The `index`-th head word of `data`, if the payload is long enough.
pub fn head_word(data: &[u8], index: usize) -> Option<B256> {
    let start = index.checked_mul(WORD)?;
    let end = start.checked_add(WORD)?;
    data.get(start..end).map(B256::from_slice)
}

/// Decode a dynamic value whose head word (`offset_word`) points into `data`.
///
/// Returns a human-readable reason when the offset or length runs past the
/// payload or a `string` is not UTF-8.
pub fn decode_dynamic(ty: ParamType, data: &[u8], offset_word: &B256) -> Result<ParamValue, String> {
    let offset = word_to_usize(offset_word).ok_or_else(|| format!("offset {offset_word} out of range"))?;
    let len_end = offset
        .checked_add(WORD)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| format!("offset {offset} leaves no room for a length word in {} byte payload", data.len()))?;
    let len_word = B256::from_slice(&data[offset..len_end]);
    let len = word_to_usize(&len_word).ok_or_else(|| format!("length {len_word} out of range"))?;
    let end = len_end
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| format!("length {len} at offset {offset} runs past {} byte payload", data.len()))?;
    let bytes = data[len_end..end].to_vec();

    match ty {
        ParamType::Bytes => Ok(ParamValue::Bytes(bytes)),
        ParamType::String => String::from_utf8(bytes)
            .map(ParamValue::String)
            .map_err(|e| format!("string is not valid UTF-8: {e}")),
        other => Err(format!("{other} is not a dynamic type")),
    }
}

fn word_to_usize(word: &B256) -> Option<usize> {
    usize::try_from(U256::from_be_bytes(word.0)).ok()
}

/// Left-pad a static value into one word (the inverse of [`decode_static`]).
pub fn encode_static(ty: ParamType, value: &ParamValue) -> Result<B256, String> {
    let mut word = [0u8; WORD];
    match (ty, value) {
        (ParamType::Address, ParamValue::Address(a)) => word[12..].copy_from_slice(a.as_slice()),
        (ParamType::Uint(bits), ParamValue::Uint(v)) => {
            if usize::from(bits) < 256 && v.bit_len() > usize::from(bits) {
                return Err(format!("{v} does not fit in uint{bits}"));
            }
            word = v.to_be_bytes();
        }
        (ParamType::Int(bits), ParamValue::Int(v)) => {
            // fits iff everything above the sign bit is sign extension
            let high = v.asr(usize::from(bits) - 1);
            if high != I256::ZERO && high != I256::MINUS_ONE {
                return Err(format!("{v} does not fit in int{bits}"));
            }
            word = v.into_raw().to_be_bytes();
        }
        (ParamType::Bool, ParamValue::Bool(b)) => word[WORD - 1] = u8::from(*b),
        (ParamType::FixedBytes(n), ParamValue::FixedBytes(b)) if b.len() == usize::from(n) => {
            word[..b.len()].copy_from_slice(b);
        }
        (ty, value) if ty.is_dynamic() => {
            return Err(format!("dynamic {ty} argument '{value}' is not supported"));
        }
        (ty, value) => return Err(format!("{} value '{value}' does not match {ty}", value.kind())),
    }
    Ok(B256::from(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(hex_str: &str) -> B256 {
        let mut w = [0u8; WORD];
        let bytes = hex::decode(hex_str).unwrap();
        w[WORD - bytes.len()..].copy_from_slice(&bytes);
        B256::from(w)
    }

    #[test]
    fn negative_int_is_twos_complement() {
        let minus_two = B256::from([0xff; WORD]).0;
        let mut w = minus_two;
        w[WORD - 1] = 0xfe;
        assert_eq!(
            decode_static(ParamType::Int(24), &B256::from(w)),
            Some(ParamValue::Int(I256::try_from(-2i64).unwrap()))
        );
    }

    #[test]
    fn bool_is_last_byte() {
        assert_eq!(decode_static(ParamType::Bool, &word("01")), Some(ParamValue::Bool(true)));
        assert_eq!(decode_static(ParamType::Bool, &B256::ZERO), Some(ParamValue::Bool(false)));
    }

    #[test]
    fn fixed_bytes_are_left_aligned() {
        let mut w = [0u8; WORD];
        w[..4].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(
            decode_static(ParamType::FixedBytes(4), &B256::from(w)),
            Some(ParamValue::FixedBytes(vec![1, 2, 3, 4]))
        );
    }

    #[test]
    fn indexed_string_is_hash() {
        let topic = B256::repeat_byte(0xab);
        assert_eq!(decode_indexed_topic(ParamType::String, &topic), ParamValue::Hash(topic));
    }

    #[test]
    fn dynamic_bytes_follow_offset() {
        let mut data = Vec::new();
        data.extend_from_slice(word("20").as_slice());
        data.extend_from_slice(word("03").as_slice());
        let mut tail = [0u8; WORD];
        tail[..3].copy_from_slice(b"abc");
        data.extend_from_slice(&tail);

        let head = head_word(&data, 0).unwrap();
        assert_eq!(
            decode_dynamic(ParamType::String, &data, &head).unwrap(),
            ParamValue::String("abc".into())
        );
    }

    #[test]
    fn dynamic_bad_offset_and_length() {
        let data = word("40").to_vec();
        assert!(decode_dynamic(ParamType::Bytes, &data, &word("40")).is_err());

        let mut data = word("20").to_vec();
        data.extend_from_slice(word("ff").as_slice());
        assert!(decode_dynamic(ParamType::Bytes, &data, &word("20")).is_err());

        assert!(decode_dynamic(ParamType::Bytes, &data, &B256::repeat_byte(0xff)).is_err());
    }

    #[test]
    fn head_word_past_end_is_none() {
        assert!(head_word(&[0u8; 40], 1).is_none());
        assert!(head_word(&[0u8; 64], 1).is_some());
    }

    #[test]
    fn encode_checks_widths_and_kinds() {
        assert!(encode_static(ParamType::Uint(8), &ParamValue::Uint(U256::from(256))).is_err());
        assert_eq!(
            encode_static(ParamType::Uint(8), &ParamValue::Uint(U256::from(255))).unwrap(),
            word("ff")
        );
        assert!(encode_static(ParamType::Int(8), &ParamValue::Int(I256::try_from(-129i64).unwrap())).is_err());
        assert_eq!(
            encode_static(ParamType::Int(8), &ParamValue::Int(I256::MINUS_ONE)).unwrap(),
            B256::from([0xff; WORD])
        );
        assert!(encode_static(ParamType::Bool, &ParamValue::Uint(U256::ZERO)).is_err());
        assert!(encode_static(ParamType::Bytes, &ParamValue::Bytes(vec![1])).is_err());
    }
}
