//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity**: two `Money` amounts of 500 are the same
/// amount, whereas two cart lines for the same product are the same line even
/// if their quantities differ (see [`crate::Entity`]).
///
/// Value objects are immutable; "changing" one means producing a new value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
