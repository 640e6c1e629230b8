//! Decode pipeline: streamed items → [`LogDecoder`] → [`EventStore`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chainwatch_abi::LogDecoder;
use serde::Serialize;

use crate::store::EventStore;
use crate::subscription::{StreamConsumer, StreamItem};

#[derive(Debug, Default)]
struct Counters {
    headers: AtomicU64,
    logs: AtomicU64,
    decoded: AtomicU64,
    unmatched: AtomicU64,
    removed: AtomicU64,
    failed: AtomicU64,
    latest_head: AtomicU64,
}

/// Point-in-time pipeline counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub headers: u64,
    pub logs: u64,
    pub decoded: u64,
    /// Logs with no topics or an undeclared signature.
    pub unmatched: u64,
    /// Logs retracted by a reorg.
    pub removed: u64,
    /// Matched logs whose payload did not decode.
    pub failed: u64,
    pub latest_head: u64,
}

/// Consumes subscription items: logs are decoded and appended, headers
/// only advance the observed chain head.
#[derive(Debug, Clone)]
pub struct Pipeline {
    decoder: LogDecoder,
    store: Arc<EventStore>,
    counters: Arc<Counters>,
}

impl Pipeline {
    pub fn new(decoder: LogDecoder, store: Arc<EventStore>) -> Self {
        Self {
            decoder,
            store,
            counters: Arc::default(),
        }
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    pub fn stats(&self) -> PipelineStats {
        let c = &self.counters;
        PipelineStats {
            headers: c.headers.load(Ordering::Relaxed),
            logs: c.logs.load(Ordering::Relaxed),
            decoded: c.decoded.load(Ordering::Relaxed),
            unmatched: c.unmatched.load(Ordering::Relaxed),
            removed: c.removed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            latest_head: c.latest_head.load(Ordering::Relaxed),
        }
    }
}

impl StreamConsumer for Pipeline {
    fn on_item(&self, item: StreamItem) {
        let c = &self.counters;
        match item {
            StreamItem::Header(header) => {
                c.headers.fetch_add(1, Ordering::Relaxed);
                c.latest_head.fetch_max(header.number, Ordering::Relaxed);
                tracing::debug!(number = header.number, hash = %header.hash, "new head");
            }
            StreamItem::Log(log) => {
                c.logs.fetch_add(1, Ordering::Relaxed);
                if log.removed {
                    c.removed.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(tx = %log.transaction_hash, log_index = log.log_index, "dropping removed log");
                    return;
                }
                match self.decoder.decode(&log) {
                    Ok(Some(event)) => {
                        c.decoded.fetch_add(1, Ordering::Relaxed);
                        tracing::info!(
                            event = %event.name,
                            block = event.block_number,
                            tx = %event.tx_hash,
                            "decoded event"
                        );
                        self.store.append(event);
                    }
                    Ok(None) => {
                        c.unmatched.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        c.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %e, tx = %log.transaction_hash, "log decode failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes, B256, U256};
    use chainwatch_core::{BlockHeader, RawLog};
    use std::num::NonZeroUsize;

    fn pipeline() -> (Pipeline, B256) {
        let iface = Arc::new(chainwatch_abi::erc20::erc20().unwrap());
        let sig = iface.signature_hash("Transfer").unwrap();
        let store = Arc::new(EventStore::new(NonZeroUsize::new(10).unwrap()));
        (Pipeline::new(LogDecoder::new(iface), store), sig)
    }

    fn transfer(sig: B256, data: Vec<u8>, removed: bool) -> RawLog {
        RawLog {
            address: Address::repeat_byte(0x11),
            topics: vec![sig, B256::ZERO, B256::ZERO],
            data: Bytes::from(data),
            block_number: 99,
            transaction_hash: B256::repeat_byte(1),
            log_index: 0,
            removed,
        }
    }

    #[test]
    fn counts_every_outcome() {
        let (p, sig) = pipeline();
        let amount = U256::from(5).to_be_bytes::<32>().to_vec();

        p.on_item(StreamItem::Log(transfer(sig, amount.clone(), false)));
        p.on_item(StreamItem::Log(transfer(sig, amount, true)));
        p.on_item(StreamItem::Log(transfer(sig, vec![1, 2, 3], false)));
        p.on_item(StreamItem::Log(transfer(B256::repeat_byte(7), vec![], false)));
        p.on_item(StreamItem::Header(BlockHeader {
            number: 120,
            hash: B256::ZERO,
            parent_hash: B256::ZERO,
            timestamp: 0,
        }));

        let stats = p.stats();
        assert_eq!(stats.logs, 4);
        assert_eq!(stats.decoded, 1);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.unmatched, 1);
        assert_eq!(stats.headers, 1);
        assert_eq!(stats.latest_head, 120);
        assert_eq!(p.store().len(), 1);
        assert_eq!(p.store().latest_block(), 99);
    }
}
