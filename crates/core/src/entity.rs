//! Entity trait: identity + continuity across state changes.

use std::collections::HashMap;

/// Entity marker + minimal interface.
///
/// Identities are surrogate keys assigned by the store on insert, so an
/// entity value only exists once it has been persisted.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + Ord + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}

/// Key entities by their identifier. Later duplicates replace earlier ones.
pub fn index_by_id<E: Entity>(entities: impl IntoIterator<Item = E>) -> HashMap<E::Id, E> {
    entities.into_iter().map(|e| (e.id(), e)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Row(u32, &'static str);

    impl Entity for Row {
        type Id = u32;

        fn id(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn index_keys_by_identity() {
        let index = index_by_id([Row(2, "b"), Row(1, "a"), Row(2, "c")]);
        assert_eq!(index.len(), 2);
        assert_eq!(index[&1], Row(1, "a"));
        assert_eq!(index[&2], Row(2, "c"));
    }
}
