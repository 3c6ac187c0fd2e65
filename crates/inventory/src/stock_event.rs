use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, EmployeeId};
use stockledger_events::{Event, EventEnvelope};

use crate::assignment::AssignmentId;
use crate::product::ProductId;
use crate::quantity::Quantity;

/// Stream type under which product ledgers are stored.
pub const LEDGER_STREAM_TYPE: &str = "stock.product";

/// What kind of business operation moved stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockEventKind {
    PurchaseReceipt,
    Sale,
    Deposit,
    Refill,
    CylinderReturn,
    AssignmentIssued,
    AssignmentReturned,
    EmployeeSale,
    Adjustment,
}

/// Direction a kind moves warehouse stock in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StockEffect {
    Inbound,
    Outbound,
    /// Recorded for audit only (stock already left the warehouse).
    Neutral,
    /// Sign carried by the event itself.
    Signed,
}

impl StockEventKind {
    pub const ALL: [StockEventKind; 9] = [
        StockEventKind::PurchaseReceipt,
        StockEventKind::Sale,
        StockEventKind::Deposit,
        StockEventKind::Refill,
        StockEventKind::CylinderReturn,
        StockEventKind::AssignmentIssued,
        StockEventKind::AssignmentReturned,
        StockEventKind::EmployeeSale,
        StockEventKind::Adjustment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StockEventKind::PurchaseReceipt => "purchase_receipt",
            StockEventKind::Sale => "sale",
            StockEventKind::Deposit => "deposit",
            StockEventKind::Refill => "refill",
            StockEventKind::CylinderReturn => "cylinder_return",
            StockEventKind::AssignmentIssued => "assignment_issued",
            StockEventKind::AssignmentReturned => "assignment_returned",
            StockEventKind::EmployeeSale => "employee_sale",
            StockEventKind::Adjustment => "adjustment",
        }
    }

    pub fn effect(self) -> StockEffect {
        match self {
            StockEventKind::PurchaseReceipt
            | StockEventKind::CylinderReturn
            | StockEventKind::AssignmentReturned => StockEffect::Inbound,
            StockEventKind::Sale
            | StockEventKind::Deposit
            | StockEventKind::Refill
            | StockEventKind::AssignmentIssued => StockEffect::Outbound,
            StockEventKind::EmployeeSale => StockEffect::Neutral,
            StockEventKind::Adjustment => StockEffect::Signed,
        }
    }
}

impl core::str::FromStr for StockEventKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StockEventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown stock event kind: {s}")))
    }
}

impl core::fmt::Display for StockEventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operation that caused an event, e.g. `sale` + the sale document id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub operation: String,
    pub reference: Option<String>,
}

impl SourceRef {
    pub fn new(operation: impl Into<String>, reference: Option<String>) -> Self {
        Self {
            operation: operation.into(),
            reference,
        }
    }
}

/// One immutable change to a product's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockEvent {
    pub product_id: ProductId,
    pub kind: StockEventKind,
    /// Unsigned magnitude of the movement.
    pub quantity: u64,
    /// Signed effect on warehouse stock; what the calculator sums.
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
    pub source: SourceRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<EmployeeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<AssignmentId>,
}

/// A ledger event as returned by a store.
pub type StoredStockEvent = EventEnvelope<StockEvent>;

impl StockEvent {
    /// Build an event whose sign follows from its kind.
    ///
    /// Adjustments carry their own sign and must go through [`StockEvent::adjustment`].
    pub fn new(
        product_id: ProductId,
        kind: StockEventKind,
        quantity: Quantity,
        source: SourceRef,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let delta = match kind.effect() {
            StockEffect::Inbound => quantity.as_delta(),
            StockEffect::Outbound => -quantity.as_delta(),
            StockEffect::Neutral => 0,
            StockEffect::Signed => {
                return Err(DomainError::validation(
                    "adjustments must be built with an explicit signed delta",
                ));
            }
        };

        Ok(Self {
            product_id,
            kind,
            quantity: quantity.get(),
            delta,
            occurred_at,
            source,
            employee_id: None,
            assignment_id: None,
        })
    }

    /// Compensating correction. History is never edited; a wrong entry is offset.
    pub fn adjustment(
        product_id: ProductId,
        delta: i64,
        reason: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(DomainError::validation("adjustment reason cannot be empty"));
        }

        Ok(Self {
            product_id,
            kind: StockEventKind::Adjustment,
            quantity: delta.unsigned_abs(),
            delta,
            occurred_at,
            source: SourceRef::new("adjustment", Some(reason)),
            employee_id: None,
            assignment_id: None,
        })
    }

    pub fn with_employee(mut self, employee_id: EmployeeId) -> Self {
        self.employee_id = Some(employee_id);
        self
    }

    pub fn with_assignment(mut self, assignment_id: AssignmentId) -> Self {
        self.assignment_id = Some(assignment_id);
        self
    }
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self.kind {
            StockEventKind::PurchaseReceipt => "stock.purchase_receipt",
            StockEventKind::Sale => "stock.sale",
            StockEventKind::Deposit => "stock.deposit",
            StockEventKind::Refill => "stock.refill",
            StockEventKind::CylinderReturn => "stock.cylinder_return",
            StockEventKind::AssignmentIssued => "stock.assignment_issued",
            StockEventKind::AssignmentReturned => "stock.assignment_returned",
            StockEventKind::EmployeeSale => "stock.employee_sale",
            StockEventKind::Adjustment => "stock.adjustment",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
