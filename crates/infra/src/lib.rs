//! Infrastructure layer: stores (in-memory + Postgres), ledger services and the engine.

pub mod allocator;
pub mod assignment_store;
pub mod calculator;
pub mod engine;
pub mod error;
pub mod ledger_store;
pub mod locks;
pub mod product_store;
pub mod reconciliation;
pub mod validation;


pub use allocator::{AllocationResult, AssignmentAllocator};
pub use assignment_store::{
    AssignmentFilter, AssignmentStore, InMemoryAssignmentStore, PostgresAssignmentStore,
};
pub use calculator::{LedgerSnapshot, StockCalculator};
pub use engine::{
    AssignmentTransition, DynStockLedgerEngine, EmployeeSale, EngineConfig, OPENING_BALANCE,
    ProductRegistration, StockLedgerEngine, StockMovement,
};
pub use error::{EngineError, StoreError};
pub use ledger_store::{InMemoryLedgerStore, LedgerStore, PostgresLedgerStore};
pub use locks::ProductLocks;
pub use product_store::{InMemoryProductStore, PostgresProductStore, ProductStore};
pub use reconciliation::ReconciliationService;
pub use validation::ValidationGate;
