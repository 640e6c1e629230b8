//! Log decoding against real-world shaped ERC-20 and custom events.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use chainwatch_abi::{erc20::erc20, Interface, LogDecoder, ParamValue};
use chainwatch_core::RawLog;

fn topic_for(address: Address) -> B256 {
    B256::left_padding_from(address.as_slice())
}

fn transfer_log(topics: Vec<B256>, value: U256) -> RawLog {
    RawLog {
        address: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".parse().unwrap(),
        topics,
        data: Bytes::from(value.to_be_bytes::<32>().to_vec()),
        block_number: 19_000_000,
        transaction_hash: B256::repeat_byte(0x5c),
        log_index: 12,
        removed: false,
    }
}

#[test]
fn transfer_round_trip() {
    let iface = Arc::new(erc20().unwrap());
    let decoder = LogDecoder::new(Arc::clone(&iface));

    let from = Address::repeat_byte(0x01);
    let to = Address::repeat_byte(0x02);
    let value = U256::from(1_000_000u64);
    let sig = iface.signature_hash("Transfer").unwrap();

    let event = decoder
        .decode(&transfer_log(vec![sig, topic_for(from), topic_for(to)], value))
        .unwrap()
        .expect("transfer should match");

    assert_eq!(event.name, "Transfer");
    assert_eq!(event.signature, sig);
    assert_eq!(event.block_number, 19_000_000);
    assert_eq!(event.log_index, 12);
    let keys: Vec<_> = event.parameters.keys().map(String::as_str).collect();
    assert_eq!(keys, ["from", "to", "value"]);
    assert_eq!(event.parameters["from"], ParamValue::Address(from));
    assert_eq!(event.parameters["to"], ParamValue::Address(to));
    assert_eq!(event.parameters["value"], ParamValue::Uint(value));
}

#[test]
fn missing_trailing_topic_is_tolerated() {
    let iface = Arc::new(erc20().unwrap());
    let decoder = LogDecoder::new(Arc::clone(&iface));
    let sig = iface.signature_hash("Transfer").unwrap();

    let event = decoder
        .decode(&transfer_log(vec![sig, topic_for(Address::repeat_byte(0x01))], U256::from(9)))
        .unwrap()
        .unwrap();

    assert!(event.parameters.contains_key("from"));
    assert!(!event.parameters.contains_key("to"));
    assert_eq!(event.parameters["value"], ParamValue::Uint(U256::from(9)));
}

#[test]
fn dynamic_payload_and_indexed_string_hash() {
    let abi = r#"[{
        "type": "event", "name": "Note", "anonymous": false,
        "inputs": [
            { "name": "tag",    "type": "string",  "indexed": true  },
            { "name": "amount", "type": "int64",   "indexed": false },
            { "name": "memo",   "type": "bytes",   "indexed": false },
            { "name": "ok",     "type": "bool",    "indexed": false }
        ]
    }]"#;
    let iface = Arc::new(Interface::parse(abi).unwrap());
    let decoder = LogDecoder::new(Arc::clone(&iface));
    let sig = iface.signature_hash("Note").unwrap();
    let tag_hash = chainwatch_abi::signature::keccak256(b"groceries");

    // head: amount, offset(memo)=0x60, ok ; tail: len=2, 0xbeef
    let data = hex::decode(concat!(
        "fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff6",
        "0000000000000000000000000000000000000000000000000000000000000060",
        "0000000000000000000000000000000000000000000000000000000000000001",
        "0000000000000000000000000000000000000000000000000000000000000002",
        "beef000000000000000000000000000000000000000000000000000000000000"
    ))
    .unwrap();

    let log = RawLog {
        address: Address::ZERO,
        topics: vec![sig, tag_hash],
        data: Bytes::from(data),
        block_number: 1,
        transaction_hash: B256::ZERO,
        log_index: 0,
        removed: false,
    };
    let event = decoder.decode(&log).unwrap().unwrap();

    assert_eq!(event.parameters["tag"], ParamValue::Hash(tag_hash));
    assert_eq!(event.parameters["amount"].to_string(), "-10");
    assert_eq!(event.parameters["memo"], ParamValue::Bytes(vec![0xbe, 0xef]));
    assert_eq!(event.parameters["ok"], ParamValue::Bool(true));
}

#[test]
fn dynamic_payload_with_bad_offset_fails() {
    let abi = r#"[{"type":"event","name":"Blob","anonymous":false,
        "inputs":[{"name":"payload","type":"bytes","indexed":false}]}]"#;
    let iface = Arc::new(Interface::parse(abi).unwrap());
    let decoder = LogDecoder::new(Arc::clone(&iface));
    let sig = iface.signature_hash("Blob").unwrap();

    let mut data = vec![0u8; 32];
    data[31] = 0x80;
    let log = RawLog {
        address: Address::ZERO,
        topics: vec![sig],
        data: Bytes::from(data),
        block_number: 1,
        transaction_hash: B256::ZERO,
        log_index: 0,
        removed: false,
    };
    let err = decoder.decode(&log).unwrap_err();
    assert_eq!(err.event, "Blob");
    assert_eq!(err.param, "payload");
}

#[test]
fn more_than_three_indexed_is_malformed() {
    let abi = r#"[{"type":"event","name":"Wide","anonymous":false,"inputs":[
        {"name":"a","type":"uint256","indexed":true},
        {"name":"b","type":"uint256","indexed":true},
        {"name":"c","type":"uint256","indexed":true},
        {"name":"d","type":"uint256","indexed":true}
    ]}]"#;
    assert!(matches!(
        Interface::parse(abi),
        Err(chainwatch_abi::AbiError::MalformedSpec(_))
    ));
}

#[test]
fn unknown_type_tag_is_malformed() {
    let abi = r#"[{"type":"event","name":"Odd","anonymous":false,"inputs":[
        {"name":"a","type":"uint7","indexed":false}
    ]}]"#;
    assert!(matches!(
        Interface::parse(abi),
        Err(chainwatch_abi::AbiError::MalformedSpec(_))
    ));
}
