use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockledger_core::ExpectedVersion;
use stockledger_inventory::{ProductId, StockEvent, StoredStockEvent};

use crate::error::StoreError;

/// Append-only, product-scoped stock ledger.
///
/// ## Streams
///
/// The stream key is the product id. Within a stream, events carry strictly increasing
/// sequence numbers (1, 2, 3, ...) assigned by the store. A product with no events has
/// stream version 0.
///
/// ## Append Semantics
///
/// `append()`:
/// - Rejects batches containing events for another product
/// - Checks optimistic concurrency against the current stream version
/// - Assigns sequence numbers starting at `current_version + 1`
/// - Persists the batch atomically (all or nothing)
///
/// ## Load Semantics
///
/// `events_for()` returns events ordered by `occurred_at`, then by sequence number.
/// With `since`, only events that occurred at or after that instant are returned.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn append(
        &self,
        product_id: ProductId,
        events: Vec<StockEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredStockEvent>, StoreError>;

    async fn events_for(
        &self,
        product_id: ProductId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredStockEvent>, StoreError>;

    /// Highest sequence number in the stream, 0 when empty.
    async fn stream_version(&self, product_id: ProductId) -> Result<u64, StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn append(
        &self,
        product_id: ProductId,
        events: Vec<StockEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredStockEvent>, StoreError> {
        (**self).append(product_id, events, expected_version).await
    }

    async fn events_for(
        &self,
        product_id: ProductId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredStockEvent>, StoreError> {
        (**self).events_for(product_id, since).await
    }

    async fn stream_version(&self, product_id: ProductId) -> Result<u64, StoreError> {
        (**self).stream_version(product_id).await
    }
}

/// Reject batches that mix streams.
pub(crate) fn ensure_single_stream(
    product_id: ProductId,
    events: &[StockEvent],
) -> Result<(), StoreError> {
    for (idx, e) in events.iter().enumerate() {
        if e.product_id != product_id {
            return Err(StoreError::InvalidAppend(format!(
                "event at index {idx} targets product {}, batch is for {product_id}",
                e.product_id
            )));
        }
    }
    Ok(())
}
