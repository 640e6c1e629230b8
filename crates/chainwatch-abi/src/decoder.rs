//! `LogDecoder` — turns raw logs into typed [`DecodedEvent`]s.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, B256};
use chainwatch_core::RawLog;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::error::DecodeError;
use crate::interface::Interface;
use crate::types::EventSpec;
use crate::value::ParamValue;
use crate::word;

/// A log matched to a declared event, with its parameters decoded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedEvent {
    pub name: String,
    pub signature: B256,
    #[serde(serialize_with = "checksummed")]
    pub contract_address: Address,
    pub block_number: u64,
    pub tx_hash: B256,
    pub log_index: u64,
    /// Decoded parameters in declaration order.
    pub parameters: IndexMap<String, ParamValue>,
    pub observed_at: DateTime<Utc>,
}

fn checksummed<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&address.to_checksum(None))
}

/// Decodes logs against one [`Interface`].
///
/// Thread-safe and cheap to clone; the signature lookup is built once.
#[derive(Debug, Clone)]
pub struct LogDecoder {
    interface: Arc<Interface>,
    by_signature: Arc<HashMap<B256, usize>>,
}

impl LogDecoder {
    pub fn new(interface: Arc<Interface>) -> Self {
        let by_signature = interface
            .events()
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.anonymous)
            .map(|(idx, e)| (e.signature_hash(), idx))
            .collect();
        Self {
            interface,
            by_signature: Arc::new(by_signature),
        }
    }

    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    /// Event declared for a given `topics[0]`, if any.
    pub fn event_for(&self, signature: &B256) -> Option<&EventSpec> {
        self.by_signature
            .get(signature)
            .and_then(|idx| self.interface.events().get(*idx))
    }

    /// Decode one raw log.
    ///
    /// `Ok(None)` when the log has no topics or its signature matches no
    /// declared event. Indexed parameters whose topics are missing are
    /// omitted rather than treated as an error.
    pub fn decode(&self, log: &RawLog) -> Result<Option<DecodedEvent>, DecodeError> {
        let Some(signature) = log.topics.first() else {
            return Ok(None);
        };
        let Some(event) = self.event_for(signature) else {
            tracing::trace!(%signature, address = %log.address, "no event declared for log signature");
            return Ok(None);
        };

        let mut parameters = IndexMap::with_capacity(event.params.len());
        let mut topics = log.topics.iter().skip(1);
        let mut head = 0usize;

        for (position, param) in event.params.iter().enumerate() {
            let key = param.key(position);
            if param.indexed {
                if let Some(topic) = topics.next() {
                    parameters.insert(key, word::decode_indexed_topic(param.ty, topic));
                }
                continue;
            }

            let head_word = word::head_word(&log.data, head).ok_or_else(|| {
                DecodeError::new(
                    &event.name,
                    &key,
                    format!(
                        "payload of {} bytes has no head word {head}",
                        log.data.len()
                    ),
                )
            })?;
            head += 1;

            let value = match word::decode_static(param.ty, &head_word) {
                Some(value) => value,
                None => word::decode_dynamic(param.ty, &log.data, &head_word)
                    .map_err(|reason| DecodeError::new(&event.name, &key, reason))?,
            };
            parameters.insert(key, value);
        }

        Ok(Some(DecodedEvent {
            name: event.name.clone(),
            signature: *signature,
            contract_address: log.address,
            block_number: log.block_number,
            tx_hash: log.transaction_hash,
            log_index: log.log_index,
            parameters,
            observed_at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParamSpec, ParamType};
    use alloy_primitives::{Bytes, U256};

    fn decoder(events: Vec<EventSpec>) -> LogDecoder {
        LogDecoder::new(Arc::new(Interface::from_events(events).unwrap()))
    }

    fn log(topics: Vec<B256>, data: Vec<u8>) -> RawLog {
        RawLog {
            address: Address::repeat_byte(0x11),
            topics,
            data: Bytes::from(data),
            block_number: 7,
            transaction_hash: B256::repeat_byte(0x22),
            log_index: 3,
            removed: false,
        }
    }

    #[test]
    fn empty_topics_is_skipped() {
        let d = decoder(vec![EventSpec::new("Ping", vec![])]);
        assert!(d.decode(&log(vec![], vec![])).unwrap().is_none());
    }

    #[test]
    fn unknown_signature_is_skipped() {
        let d = decoder(vec![EventSpec::new("Ping", vec![])]);
        assert!(d.decode(&log(vec![B256::repeat_byte(9)], vec![])).unwrap().is_none());
    }

    #[test]
    fn event_without_data_params_accepts_empty_payload() {
        let spec = EventSpec::new("Ping", vec![ParamSpec::new("who", ParamType::Address).indexed()]);
        let sig = spec.signature_hash();
        let d = decoder(vec![spec]);
        let topic = B256::left_padding_from(Address::repeat_byte(0xaa).as_slice());
        let ev = d.decode(&log(vec![sig, topic], vec![])).unwrap().unwrap();
        assert_eq!(ev.parameters["who"], ParamValue::Address(Address::repeat_byte(0xaa)));
        assert_eq!(ev.block_number, 7);
        assert_eq!(ev.log_index, 3);
    }

    #[test]
    fn truncated_head_word_is_error() {
        let spec = EventSpec::new("Value", vec![ParamSpec::new("v", ParamType::Uint(256))]);
        let sig = spec.signature_hash();
        let d = decoder(vec![spec]);
        let err = d.decode(&log(vec![sig], vec![0u8; 31])).unwrap_err();
        assert_eq!(err.event, "Value");
        assert_eq!(err.param, "v");
    }

    #[test]
    fn anonymous_event_never_matches() {
        let spec = EventSpec::new("Anon", vec![]).anonymous();
        let sig = spec.signature_hash();
        let d = decoder(vec![spec]);
        assert!(d.decode(&log(vec![sig], vec![])).unwrap().is_none());
    }

    #[test]
    fn serialized_event_shape() {
        let spec = EventSpec::new("Value", vec![ParamSpec::new("v", ParamType::Uint(256))]);
        let sig = spec.signature_hash();
        let d = decoder(vec![spec]);
        let data = U256::from(5).to_be_bytes::<32>().to_vec();
        let ev = d.decode(&log(vec![sig], data)).unwrap().unwrap();
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["name"], "Value");
        assert_eq!(json["blockNumber"], 7);
        assert_eq!(json["parameters"]["v"]["value"], "5");
        assert_eq!(json["contractAddress"], Address::repeat_byte(0x11).to_checksum(None));
        assert!(json["observedAt"].is_string());
    }
}
