//! Stock ledger domain (event-sourced).
//!
//! Products, ledger events, employee assignments and the pure rules that derive stock
//! from them. No IO, no storage, no HTTP.

pub mod allocation;
pub mod assignment;
pub mod calculation;
pub mod product;
pub mod quantity;
pub mod reconcile;
pub mod stock_event;
pub mod validation;

pub use allocation::{fifo_queue, plan_fifo, Allocation, AllocationPlan, ShortfallPolicy};
pub use assignment::{
    AssignStock, AssignmentCommand, AssignmentDeducted, AssignmentEvent, AssignmentId,
    AssignmentReceived, AssignmentReturned, AssignmentStatus, DeductAssignment,
    ReceiveAssignment, ReturnAssignment, StockAssigned, StockAssignment,
};
pub use calculation::{apply_delta, stock_level, StockBreakdown};
pub use product::{NewProduct, Product, ProductId};
pub use quantity::Quantity;
pub use reconcile::{Diagnostic, SyncFailure, SyncReport, SyncSummary};
pub use stock_event::{
    SourceRef, StockEffect, StockEvent, StockEventKind, StoredStockEvent, LEDGER_STREAM_TYPE,
};
pub use validation::{evaluate, StockOperation, ValidationOutcome, REASON_INSUFFICIENT_STOCK};
