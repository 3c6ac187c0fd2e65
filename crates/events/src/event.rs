use chrono::{DateTime, Utc};

/// A fact that happened to the business.
///
/// Events are immutable, carry a schema version and are only ever appended.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted name (e.g. "stock.sale").
    fn event_type(&self) -> &'static str;

    fn version(&self) -> u32;

    /// Business time, as opposed to the time the store recorded it.
    fn occurred_at(&self) -> DateTime<Utc>;
}
