//! Value objects: compared by value, never by identity.

/// Marker for immutable domain values.
///
/// Two value objects holding the same attributes are interchangeable. To "change" one,
/// build a new instance.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
