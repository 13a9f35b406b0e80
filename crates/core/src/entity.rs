//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Cart lines are entities keyed by product id: adding the same product twice
/// mutates one line instead of creating a second.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
