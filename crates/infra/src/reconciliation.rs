//! Rebuild cached counters from the ledger.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use stockledger_inventory::{ProductId, SyncFailure, SyncReport, SyncSummary};

use crate::calculator::StockCalculator;
use crate::error::EngineError;
use crate::ledger_store::LedgerStore;
use crate::locks::ProductLocks;
use crate::product_store::ProductStore;

/// Overwrites `current_stock` with the replayed ledger value.
///
/// Idempotent: a second run over an unchanged ledger reports zero drift. Holds the
/// product lock between the replay and the counter write.
#[derive(Debug, Clone)]
pub struct ReconciliationService<P, L> {
    products: P,
    calculator: StockCalculator<L>,
    locks: Arc<ProductLocks>,
}

impl<P, L> ReconciliationService<P, L>
where
    P: ProductStore,
    L: LedgerStore,
{
    pub fn new(products: P, ledger: L, locks: Arc<ProductLocks>) -> Self {
        Self {
            products,
            calculator: StockCalculator::new(ledger),
            locks,
        }
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn sync_product(&self, product_id: ProductId) -> Result<SyncReport, EngineError> {
        let _guard = self.locks.acquire(product_id).await;
        let product = self
            .products
            .get(product_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("product {product_id}")))?;

        let recalculated = self.calculator.calculate(product_id).await?;
        self.products
            .set_current_stock(product_id, recalculated)
            .await?;

        let report = SyncReport::compare(product_id, product.current_stock, recalculated);
        if report.drifted() {
            warn!(
                product_id = %product_id,
                previous = report.previous,
                recalculated = report.recalculated,
                delta = report.delta,
                "cached stock counter drifted from ledger"
            );
        }
        Ok(report)
    }

    /// Reconcile every product. A product that fails is reported in `failed` and the
    /// rest of the catalog is still processed; only a failure to list products aborts.
    #[instrument(skip(self))]
    pub async fn sync_all(&self) -> Result<SyncSummary, EngineError> {
        let products = self.products.list().await?;
        let mut reports = Vec::with_capacity(products.len());
        let mut failed = Vec::new();
        for product in products {
            match self.sync_product(product.id).await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    error!(product_id = %product.id, error = %err, "product reconciliation failed");
                    failed.push(SyncFailure {
                        product_id: product.id,
                        error: err.to_string(),
                    });
                }
            }
        }

        let summary = SyncSummary::from_outcomes(reports, failed);
        info!(
            checked = summary.checked,
            corrected = summary.corrected,
            failed = summary.failed.len(),
            total_delta = summary.total_delta,
            "stock reconciliation finished"
        );
        Ok(summary)
    }
}
