//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Read-model rows implement this so stores can key them without a separate
/// key parameter.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
