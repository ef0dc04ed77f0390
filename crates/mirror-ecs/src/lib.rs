//! Mirror ECS -- sparse-set Entity Component storage.
//!
//! Every component type gets its own [`ComponentStore`](store::ComponentStore):
//! a sparse index addressed by entity index pointing into two packed, gap-free
//! arrays (owning entity ids and component values). Insert, lookup and
//! removal are O(1); iteration walks the packed arrays linearly. The
//! [`Registry`](registry::Registry) owns one store per type plus the
//! generational entity allocator.
//!
//! # Quick Start
//!
//! ```
//! use mirror_ecs::prelude::*;
//!
//! #[derive(Debug, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Debug, PartialEq)]
//! struct Velocity { dx: f32, dy: f32 }
//!
//! let mut registry = Registry::new();
//! let entity = registry.create_entity().unwrap();
//! registry.add_component(entity, Position { x: 0.0, y: 0.0 }).unwrap();
//! registry.add_component(entity, Velocity { dx: 1.0, dy: 0.0 }).unwrap();
//!
//! for (_entity, pos, vel) in registry.join::<Position, Velocity>() {
//!     assert_eq!(pos.x + vel.dx, 1.0);
//! }
//!
//! registry.destroy_entity(entity).unwrap();
//! assert!(registry.get_component::<Position>(entity).is_err());
//! ```
//!
//! # Iteration order
//!
//! Removal swaps the last dense slot into the hole, so the order a store
//! iterates in changes whenever something is removed. Hold on to
//! [`EntityId`](entity::EntityId)s, never to positions within a store.

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod registry;
pub mod sparse;
pub mod store;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by store and registry operations.
///
/// All of these are recoverable caller errors. A desynchronised sparse/dense
/// pair is not reported here: it panics, because the store can no longer be
/// trusted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The targeted store has no value for this entity.
    #[error("entity {entity} has no {component} component")]
    NotFound {
        entity: entity::EntityId,
        /// Short type name of the component that was looked up.
        component: &'static str,
    },

    /// The entity was never created, has been destroyed, or its index is
    /// held by a newer generation.
    #[error("entity {entity} is not alive (never created, destroyed, or stale)")]
    InvalidEntity { entity: entity::EntityId },

    /// An allocation or sparse index growth would pass a configured bound.
    #[error("capacity exceeded: requested {requested}, maximum is {max}")]
    CapacityExceeded { requested: u64, max: u64 },
}

impl EcsError {
    /// `NotFound` for component type `T`.
    pub(crate) fn not_found<T: ?Sized>(entity: entity::EntityId) -> Self {
        Self::NotFound {
            entity,
            component: component::short_type_name(std::any::type_name::<T>()),
        }
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentTypeId};
    pub use crate::entity::{EntityAllocator, EntityId};
    pub use crate::registry::{Registry, RegistryConfig};
    pub use crate::sparse::SparseIndex;
    pub use crate::store::{ComponentStore, ErasedStore};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Score(u32);

    // -- integer store scenario ---------------------------------------------

    #[test]
    fn integer_store_scenario() {
        let e = |i| EntityId::new(i, 0);
        let mut ints: ComponentStore<i32> = ComponentStore::new();

        ints.insert(e(5), 42).unwrap();
        ints.insert(e(0), 100).unwrap();
        assert_eq!(ints.get(e(5)), Ok(&42));
        assert_eq!(ints.get(e(0)), Ok(&100));

        ints.insert(e(3), 1).unwrap();
        ints.insert(e(4), 2).unwrap();
        ints.remove(e(4)).unwrap();

        assert_eq!(ints.get(e(5)), Ok(&42));
        assert!(!ints.contains(e(4)));
        assert!(ints.check_invariants());
    }

    // -- registry lifecycle -------------------------------------------------

    #[test]
    fn entity_component_set_is_union_of_stores() {
        let mut reg = Registry::new();
        let e = reg.create_entity().unwrap();
        reg.add_component(e, Position { x: 1.0, y: 2.0 }).unwrap();
        reg.add_component(e, Score(7)).unwrap();

        let names = reg.components_of(e);
        assert_eq!(names, vec!["Position", "Score"]);
    }

    #[test]
    fn mutate_through_store_reference() {
        let mut reg = Registry::new();
        let e = reg.create_entity().unwrap();
        reg.add_component(e, Score(0)).unwrap();

        for (_, score) in reg.store::<Score>().iter_mut() {
            score.0 += 10;
        }

        assert_eq!(reg.get_component::<Score>(e), Ok(&Score(10)));
    }

    #[test]
    fn despawn_middle_entity_keeps_others_intact() {
        let mut reg = Registry::new();
        let e1 = reg.create_entity().unwrap();
        let e2 = reg.create_entity().unwrap();
        let e3 = reg.create_entity().unwrap();
        for (i, &e) in [e1, e2, e3].iter().enumerate() {
            reg.add_component(e, Position { x: i as f32, y: i as f32 })
                .unwrap();
        }

        reg.destroy_entity(e2).unwrap();

        assert_eq!(reg.entity_count(), 2);
        assert_eq!(
            reg.get_component::<Position>(e1),
            Ok(&Position { x: 0.0, y: 0.0 })
        );
        assert_eq!(
            reg.get_component::<Position>(e3),
            Ok(&Position { x: 2.0, y: 2.0 })
        );
        assert!(reg.store::<Position>().check_invariants());
    }

    #[test]
    fn scale_10k_entities() {
        let mut reg = Registry::new();
        let mut entities = Vec::with_capacity(10_000);
        for i in 0..10_000u32 {
            let e = reg.create_entity().unwrap();
            reg.add_component(e, Position { x: i as f32, y: i as f32 * 2.0 })
                .unwrap();
            reg.add_component(e, Velocity { dx: 1.0, dy: -1.0 }).unwrap();
            entities.push(e);
        }

        assert_eq!(reg.join::<Position, Velocity>().count(), 10_000);

        for (_, vel) in reg.store::<Velocity>().iter_mut() {
            vel.dx *= 2.0;
            vel.dy *= 2.0;
        }
        assert_eq!(
            reg.get_component::<Velocity>(entities[0]),
            Ok(&Velocity { dx: 2.0, dy: -2.0 })
        );

        for &e in entities.iter().take(5_000) {
            reg.destroy_entity(e).unwrap();
        }

        assert_eq!(reg.join::<Position, Velocity>().count(), 5_000);
        assert_eq!(reg.entity_count(), 5_000);
        assert!(reg.store::<Position>().check_invariants());
        assert!(reg.store::<Velocity>().check_invariants());
    }

    #[test]
    fn errors_are_distinguishable() {
        let mut reg = Registry::with_config(RegistryConfig {
            max_entities: Some(1),
        });
        let e = reg.create_entity().unwrap();

        let not_found = reg.get_component::<Score>(e).unwrap_err();
        assert!(matches!(not_found, EcsError::NotFound { .. }));

        let capacity = reg.create_entity().unwrap_err();
        assert!(matches!(capacity, EcsError::CapacityExceeded { .. }));

        reg.destroy_entity(e).unwrap();
        let invalid = reg.get_component::<Score>(e).unwrap_err();
        assert!(matches!(invalid, EcsError::InvalidEntity { .. }));
        assert_eq!(
            invalid.to_string(),
            "entity 0v0 is not alive (never created, destroyed, or stale)"
        );
    }
}
