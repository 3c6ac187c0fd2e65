//! Append-only stock ledger.
//!
//! One stream per product. Events are never updated or deleted; corrections are new
//! `adjustment` events.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::LedgerStore;
