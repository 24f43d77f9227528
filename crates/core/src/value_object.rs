//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity; two instances holding the same values are
/// the same value. `Quantity` is the main one in this workspace:
///
/// ```ignore
/// let a = Quantity::new(dec!(2.50))?;
/// let b = Quantity::new(dec!(2.5))?;
/// assert_eq!(a, b);
/// ```
///
/// Value objects are immutable: operations return new values instead of
/// mutating in place.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
