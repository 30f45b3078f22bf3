//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Lots, stock moves and purchase lines are entities: two records with equal
/// attributes are still distinct physical units.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Both values are versions of the same record.
    fn same_identity(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
