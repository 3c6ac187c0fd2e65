//! Stock derived from the ledger.

use tracing::{error, instrument};

use stockledger_inventory::{ProductId, StockBreakdown, stock_level};

use crate::error::EngineError;
use crate::ledger_store::LedgerStore;

/// Ledger level together with the stream version it was computed at.
///
/// Appending with `ExpectedVersion::Exact(version)` guarantees nothing moved between
/// the read and the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub version: u64,
    pub level: i64,
}

/// Replays a product's ledger on demand.
#[derive(Debug, Clone)]
pub struct StockCalculator<L> {
    ledger: L,
}

impl<L: LedgerStore> StockCalculator<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    /// Current stock. A negative value is returned as is and logged.
    pub async fn calculate(&self, product_id: ProductId) -> Result<i64, EngineError> {
        Ok(self.snapshot(product_id).await?.level)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn snapshot(&self, product_id: ProductId) -> Result<LedgerSnapshot, EngineError> {
        let events = self.ledger.events_for(product_id, None).await?;
        let version = events.iter().map(|e| e.sequence_number()).max().unwrap_or(0);
        let level = stock_level(events.iter().map(|e| e.payload())).map_err(|err| {
            error!(product_id = %product_id, version, error = %err, "ledger total out of range");
            EngineError::from(err)
        })?;

        if level < 0 {
            error!(
                product_id = %product_id,
                level,
                version,
                "ledger sums to negative stock"
            );
        }

        Ok(LedgerSnapshot { version, level })
    }

    pub async fn breakdown(&self, product_id: ProductId) -> Result<StockBreakdown, EngineError> {
        let events = self.ledger.events_for(product_id, None).await?;
        Ok(StockBreakdown::from_events(
            product_id,
            events.iter().map(|e| e.payload()),
        ))
    }
}
