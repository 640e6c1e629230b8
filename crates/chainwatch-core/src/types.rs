//! Chain data as delivered by the RPC collaborator.

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

/// A raw, undecoded log entry (`eth_subscribe("logs")` / `eth_getLogs` item).
///
/// `topics[0]` is the event signature hash for non-anonymous events;
/// `data` is the ABI-encoded tuple of non-indexed parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default, with = "quantity")]
    pub block_number: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub transaction_hash: B256,
    #[serde(default, with = "quantity")]
    pub log_index: u64,
    /// Set by the node when a reorg drops a previously delivered log.
    #[serde(default)]
    pub removed: bool,
}

/// A new chain head (`eth_subscribe("newHeads")` item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    #[serde(with = "quantity")]
    pub number: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub hash: B256,
    #[serde(default, deserialize_with = "null_default")]
    pub parent_hash: B256,
    #[serde(default, with = "quantity")]
    pub timestamp: u64,
}

/// Subset of a transaction receipt used by query-by-hash callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default, with = "quantity")]
    pub block_number: u64,
    /// `1` on success, `0` on revert.
    #[serde(default, with = "quantity")]
    pub status: u64,
    #[serde(default)]
    pub logs: Vec<RawLog>,
}

/// Server-side filter for a log subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Emitting contracts (empty = any contract).
    pub addresses: Vec<Address>,
    /// Accepted values for `topics[0]` (empty = any event).
    pub event_signatures: Vec<B256>,
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.addresses.push(address);
        self
    }

    pub fn with_addresses(mut self, addresses: impl IntoIterator<Item = Address>) -> Self {
        self.addresses.extend(addresses);
        self
    }

    pub fn with_event_signatures(mut self, signatures: impl IntoIterator<Item = B256>) -> Self {
        self.event_signatures.extend(signatures);
        self
    }

    /// The filter object passed as the second `eth_subscribe` parameter.
    pub fn to_params(&self) -> Value {
        let mut filter = Map::new();
        if !self.addresses.is_empty() {
            filter.insert("address".into(), json!(self.addresses));
        }
        if !self.event_signatures.is_empty() {
            filter.insert("topics".into(), json!([self.event_signatures]));
        }
        Value::Object(filter)
    }
}

fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Hex `QUANTITY` encoding (`"0x1b4"`), tolerant of plain numbers and `null`.
pub mod quantity {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Quantity {
        Hex(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{value:#x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Option::<Quantity>::deserialize(deserializer)? {
            None => Ok(0),
            Some(Quantity::Number(n)) => Ok(n),
            Some(Quantity::Hex(s)) => parse(&s).map_err(D::Error::custom),
        }
    }

    /// Parse a `0x`-prefixed hex quantity. `"0x"` is zero.
    pub fn parse(s: &str) -> Result<u64, std::num::ParseIntError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.is_empty() {
            return Ok(0);
        }
        u64::from_str_radix(digits, 16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_log_from_subscription_payload() {
        let payload = json!({
            "address": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
            "topics": ["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"],
            "data": "0x0000000000000000000000000000000000000000000000000000000000000001",
            "blockNumber": "0x1234",
            "transactionHash": "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060",
            "logIndex": "0x2",
            "removed": false
        });
        let log: RawLog = serde_json::from_value(payload).unwrap();
        assert_eq!(log.block_number, 0x1234);
        assert_eq!(log.log_index, 2);
        assert_eq!(log.topics.len(), 1);
        assert_eq!(log.data.len(), 32);
        assert!(!log.removed);
    }

    #[test]
    fn pending_log_fields_default() {
        let payload = json!({
            "address": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
            "topics": [],
            "data": "0x",
            "blockNumber": null,
            "transactionHash": null,
            "logIndex": null
        });
        let log: RawLog = serde_json::from_value(payload).unwrap();
        assert_eq!(log.block_number, 0);
        assert_eq!(log.transaction_hash, B256::ZERO);
        assert!(log.data.is_empty());
    }

    #[test]
    fn header_from_new_heads_payload() {
        let payload = json!({
            "number": "0x1b4",
            "hash": "0xdc0818cf78f21a8e70579cb46a43643f78291264dda342ae31049421c82d21ae",
            "parentHash": "0xe99e022112df268087ea7eafaf4790497fd21dbeeb6bd7a1721df161a6657a54",
            "timestamp": "0x55ba467c",
            "miner": "0xbb7b8287f3f0a933474a79eae42cbca977791171"
        });
        let header: BlockHeader = serde_json::from_value(payload).unwrap();
        assert_eq!(header.number, 436);
        assert_eq!(header.timestamp, 0x55ba467c);
    }

    #[test]
    fn empty_filter_is_empty_object() {
        assert_eq!(LogFilter::new().to_params(), json!({}));
    }

    #[test]
    fn filter_with_address_and_signature() {
        let address: Address = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".parse().unwrap();
        let filter = LogFilter::new()
            .with_address(address)
            .with_event_signatures([B256::repeat_byte(0x11)]);
        let params = filter.to_params();
        assert_eq!(params["address"].as_array().unwrap().len(), 1);
        assert_eq!(params["topics"][0].as_array().unwrap().len(), 1);
    }

    #[test]
    fn quantity_parse_edge_cases() {
        assert_eq!(quantity::parse("0x").unwrap(), 0);
        assert_eq!(quantity::parse("0xff").unwrap(), 255);
        assert!(quantity::parse("0xzz").is_err());
    }
}
