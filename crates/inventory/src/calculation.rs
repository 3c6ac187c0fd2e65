//! Ledger replay: the only place stock is derived.

use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult};

use crate::product::ProductId;
use crate::stock_event::{StockEvent, StockEventKind};

/// Warehouse stock implied by a set of events.
///
/// A plain sum of deltas, so replay order never matters. A negative result means the
/// ledger itself is inconsistent and is returned as is. The sum is accumulated in
/// `i128`; only a total outside the `i64` range is an error.
pub fn stock_level<'a>(events: impl IntoIterator<Item = &'a StockEvent>) -> DomainResult<i64> {
    let total: i128 = events.into_iter().map(|e| i128::from(e.delta)).sum();
    i64::try_from(total).map_err(|_| out_of_range())
}

/// `level + delta`, or an error when the result leaves the `i64` range.
pub fn apply_delta(level: i64, delta: i64) -> DomainResult<i64> {
    level.checked_add(delta).ok_or_else(out_of_range)
}

fn out_of_range() -> DomainError {
    DomainError::invariant("stock level would exceed the representable range")
}

/// Per-kind decomposition of a product's ledger.
///
/// Counters saturate at their bounds; `stock_level` is the authoritative total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockBreakdown {
    pub product_id: ProductId,
    /// Purchase receipts.
    pub received: u64,
    /// Sales, deposits and refills served from the warehouse.
    pub sold: u64,
    /// Still in employee custody.
    pub assigned_outstanding: i64,
    /// Cylinder returns plus assignment returns.
    pub returned: u64,
    pub issued: u64,
    pub employee_sold: u64,
    pub assignment_returned: u64,
    pub cylinder_returned: u64,
    pub adjustments: i64,
    pub available: i64,
    pub event_count: usize,
}

impl StockBreakdown {
    pub fn empty(product_id: ProductId) -> Self {
        Self {
            product_id,
            received: 0,
            sold: 0,
            assigned_outstanding: 0,
            returned: 0,
            issued: 0,
            employee_sold: 0,
            assignment_returned: 0,
            cylinder_returned: 0,
            adjustments: 0,
            available: 0,
            event_count: 0,
        }
    }

    pub fn from_events<'a>(
        product_id: ProductId,
        events: impl IntoIterator<Item = &'a StockEvent>,
    ) -> Self {
        let mut b = Self::empty(product_id);
        for e in events {
            b.record(e);
        }
        b
    }

    fn record(&mut self, e: &StockEvent) {
        let q = e.quantity;
        match e.kind {
            StockEventKind::PurchaseReceipt => self.received = self.received.saturating_add(q),
            StockEventKind::Sale | StockEventKind::Deposit | StockEventKind::Refill => {
                self.sold = self.sold.saturating_add(q)
            }
            StockEventKind::CylinderReturn => {
                self.cylinder_returned = self.cylinder_returned.saturating_add(q)
            }
            StockEventKind::AssignmentIssued => self.issued = self.issued.saturating_add(q),
            StockEventKind::AssignmentReturned => {
                self.assignment_returned = self.assignment_returned.saturating_add(q)
            }
            StockEventKind::EmployeeSale => {
                self.employee_sold = self.employee_sold.saturating_add(q)
            }
            StockEventKind::Adjustment => {
                self.adjustments = self.adjustments.saturating_add(e.delta)
            }
        }

        self.returned = self.cylinder_returned.saturating_add(self.assignment_returned);
        let outstanding = i128::from(self.issued)
            - i128::from(self.assignment_returned)
            - i128::from(self.employee_sold);
        self.assigned_outstanding = saturate(outstanding);
        self.available = self.available.saturating_add(e.delta);
        self.event_count += 1;
    }
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}
