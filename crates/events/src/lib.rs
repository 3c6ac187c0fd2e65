//! Event primitives shared by the ledger domain and its stores.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;
