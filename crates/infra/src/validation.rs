//! Pre-flight checks against live ledger stock.

use tracing::{debug, instrument};

use stockledger_inventory::{
    ProductId, Quantity, StockOperation, ValidationOutcome, apply_delta, evaluate,
};

use crate::calculator::{LedgerSnapshot, StockCalculator};
use crate::error::EngineError;
use crate::ledger_store::LedgerStore;
use crate::product_store::ProductStore;

/// Answers "may this movement proceed?" from the ledger, never from the cached counter.
#[derive(Debug, Clone)]
pub struct ValidationGate<P, L> {
    products: P,
    calculator: StockCalculator<L>,
}

impl<P, L> ValidationGate<P, L>
where
    P: ProductStore,
    L: LedgerStore,
{
    pub fn new(products: P, ledger: L) -> Self {
        Self {
            products,
            calculator: StockCalculator::new(ledger),
        }
    }

    /// Outcome only; refusals are an `Ok` with `allowed == false`.
    pub async fn validate(
        &self,
        product_id: ProductId,
        quantity: Quantity,
        operation: StockOperation,
    ) -> Result<ValidationOutcome, EngineError> {
        Ok(self.check(product_id, quantity, operation).await?.0)
    }

    /// Outcome plus the snapshot it was computed from, for writers that append next.
    #[instrument(
        skip(self),
        fields(product_id = %product_id, quantity = %quantity, operation = operation.as_str())
    )]
    pub(crate) async fn check(
        &self,
        product_id: ProductId,
        quantity: Quantity,
        operation: StockOperation,
    ) -> Result<(ValidationOutcome, LedgerSnapshot), EngineError> {
        if self.products.get(product_id).await?.is_none() {
            return Err(EngineError::not_found(format!("product {product_id}")));
        }

        let snapshot = self.calculator.snapshot(product_id).await?;
        if operation.is_additive() {
            apply_delta(snapshot.level, quantity.as_delta()).map_err(|_| {
                EngineError::validation(format!(
                    "{} of {quantity} would overflow stock level {}",
                    operation.as_str(),
                    snapshot.level
                ))
            })?;
        }
        let outcome = evaluate(snapshot.level, quantity, operation);
        if !outcome.allowed {
            debug!(available = snapshot.level, "movement refused");
        }
        Ok((outcome, snapshot))
    }
}
