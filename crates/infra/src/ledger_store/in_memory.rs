use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use stockledger_core::ExpectedVersion;
use stockledger_inventory::{LEDGER_STREAM_TYPE, ProductId, StockEvent, StoredStockEvent};

use super::r#trait::{LedgerStore, ensure_single_stream};
use crate::error::StoreError;

/// In-memory append-only ledger.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    streams: RwLock<HashMap<ProductId, Vec<StoredStockEvent>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredStockEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number()).unwrap_or(0)
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(
        &self,
        product_id: ProductId,
        events: Vec<StockEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredStockEvent>, StoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }
        ensure_single_stream(product_id, &events)?;

        let mut streams = self
            .streams
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        let stream = streams.entry(product_id).or_default();
        let current = Self::current_version(stream);

        expected_version
            .check(current)
            .map_err(|e| StoreError::Concurrency(format!("product {product_id}: {e}")))?;

        let recorded_at = Utc::now();
        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredStockEvent::new(
                Uuid::now_v7(),
                product_id.0,
                LEDGER_STREAM_TYPE,
                next,
                recorded_at,
                e,
            );
            next += 1;
            stream.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    async fn events_for(
        &self,
        product_id: ProductId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredStockEvent>, StoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        let mut events: Vec<StoredStockEvent> = streams
            .get(&product_id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|e| since.is_none_or(|t| e.payload().occurred_at >= t))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        events.sort_by_key(|e| (e.payload().occurred_at, e.sequence_number()));
        Ok(events)
    }

    async fn stream_version(&self, product_id: ProductId) -> Result<u64, StoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        Ok(streams
            .get(&product_id)
            .map(|s| Self::current_version(s))
            .unwrap_or(0))
    }
}
