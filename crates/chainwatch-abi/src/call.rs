//! Read-call helpers: calldata encoding and return-data unpacking.

use alloy_primitives::Bytes;
use indexmap::IndexMap;

use crate::error::{AbiError, DecodeError};
use crate::types::FunctionSpec;
use crate::value::ParamValue;
use crate::word;

impl FunctionSpec {
    /// `selector ++ head words` for a call with static arguments.
    pub fn encode_input(&self, args: &[ParamValue]) -> Result<Bytes, AbiError> {
        if args.len() != self.inputs.len() {
            return Err(AbiError::Encode {
                param: self.name.clone(),
                reason: format!("expected {} arguments, got {}", self.inputs.len(), args.len()),
            });
        }
        let mut out = Vec::with_capacity(4 + word::WORD * args.len());
        out.extend_from_slice(&self.selector());
        for (position, (param, arg)) in self.inputs.iter().zip(args).enumerate() {
            let encoded = word::encode_static(param.ty, arg).map_err(|reason| AbiError::Encode {
                param: param.key(position),
                reason,
            })?;
            out.extend_from_slice(encoded.as_slice());
        }
        Ok(Bytes::from(out))
    }

    /// Unpack return data into named outputs, in declaration order.
    pub fn decode_output(&self, data: &[u8]) -> Result<IndexMap<String, ParamValue>, DecodeError> {
        let mut values = IndexMap::with_capacity(self.outputs.len());
        for (position, param) in self.outputs.iter().enumerate() {
            let key = param.key(position);
            let head = word::head_word(data, position).ok_or_else(|| {
                DecodeError::new(
                    &self.name,
                    &key,
                    format!("return data of {} bytes has no word {position}", data.len()),
                )
            })?;
            let value = match word::decode_static(param.ty, &head) {
                Some(value) => value,
                None => word::decode_dynamic(param.ty, data, &head)
                    .map_err(|reason| DecodeError::new(&self.name, &key, reason))?,
            };
            values.insert(key, value);
        }
        Ok(values)
    }
}
