//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Pickup points, receptions and products are all entities: a reception keeps
/// its identity while its status and product list change.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
