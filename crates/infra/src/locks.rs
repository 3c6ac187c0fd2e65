//! Per-product write serialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use stockledger_inventory::ProductId;

/// Slot count above which idle slots are dropped on the next acquire.
const PRUNE_ABOVE: usize = 256;

/// One async mutex per product.
///
/// Writers for the same product queue behind each other; different products never
/// contend. Within one process this closes the read-check-append window. Across
/// processes the ledger's expected-version check still catches the race.
///
/// A slot nobody holds or waits on is referenced only by the map and may be dropped.
#[derive(Debug, Default)]
pub struct ProductLocks {
    slots: Mutex<HashMap<ProductId, Arc<AsyncMutex<()>>>>,
}

impl ProductLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, product_id: ProductId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            if slots.len() > PRUNE_ABOVE {
                slots.retain(|id, slot| *id == product_id || Arc::strong_count(slot) > 1);
            }
            slots.entry(product_id).or_default().clone()
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
