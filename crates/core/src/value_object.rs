//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are compared by their attribute values.
/// They are copied, never shared: a fulfillment stage that hands an
/// [`AttributeSet`](crate::AttributeSet) downstream hands over a clone, so a
/// later correction on one record never leaks into another.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
