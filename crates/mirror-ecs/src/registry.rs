//! The [`Registry`] owns the entity/component universe: the entity allocator
//! (authoritative set of live ids) and exactly one [`ComponentStore`] per
//! component type, kept type-erased behind [`ErasedStore`] and keyed by
//! [`ComponentTypeId`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::component::{Component, ComponentTypeId};
use crate::entity::{EntityAllocator, EntityId};
use crate::store::{ComponentStore, ErasedStore};
use crate::EcsError;

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Limits applied to a [`Registry`]. Missing fields deserialize to their
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Maximum number of distinct entity indices. `None` means unbounded.
    /// Every store's sparse index is bounded to match.
    pub max_entities: Option<u32>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Entity lifecycle plus type-keyed access to component stores.
///
/// Stores are created lazily the first time a component type is touched
/// through a `&mut self` method and live as long as the registry.
/// Read-only methods never create stores; they report
/// [`EcsError::NotFound`] (or `None`) instead.
pub struct Registry {
    entities: EntityAllocator,
    stores: HashMap<ComponentTypeId, Box<dyn ErasedStore>>,
    config: RegistryConfig,
}

impl Registry {
    /// An empty, unbounded registry.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// An empty registry with the given limits.
    pub fn with_config(config: RegistryConfig) -> Self {
        let entities = match config.max_entities {
            Some(max) => EntityAllocator::with_max_entities(max),
            None => EntityAllocator::new(),
        };
        Self {
            entities,
            stores: HashMap::new(),
            config,
        }
    }

    /// The limits this registry was built with.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Create an entity with no components. The id may reuse the index of a
    /// destroyed entity, with a newer generation.
    ///
    /// # Errors
    ///
    /// [`EcsError::CapacityExceeded`] when `max_entities` is reached.
    pub fn create_entity(&mut self) -> Result<EntityId, EcsError> {
        let entity = self.entities.allocate()?;
        trace!(%entity, "created entity");
        Ok(entity)
    }

    /// Remove `entity` from every store that holds it, then release its id
    /// for reuse. Stores without the entity are left alone.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] if `entity` was never created or is
    /// already destroyed.
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<(), EcsError> {
        if !self.entities.is_alive(entity) {
            return Err(EcsError::InvalidEntity { entity });
        }

        // Values written through a stale handle of this index go too.
        let mut removed = 0usize;
        for store in self.stores.values_mut() {
            if let Some(occupant) = store.occupant(entity.index()) {
                if occupant.generation() <= entity.generation() && store.remove_entity(occupant) {
                    removed += 1;
                }
            }
        }
        self.entities.deallocate(entity);

        debug!(%entity, components = removed, "destroyed entity");
        Ok(())
    }

    /// Whether `entity` is live.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Live entities in ascending index order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter()
    }

    fn ensure_alive(&self, entity: EntityId) -> Result<(), EcsError> {
        if self.entities.is_alive(entity) {
            Ok(())
        } else {
            Err(EcsError::InvalidEntity { entity })
        }
    }

    // -- store access -------------------------------------------------------

    /// Create the store for `T` now rather than on first use.
    pub fn register_component<T: Component>(&mut self) -> &mut ComponentStore<T> {
        self.store::<T>()
    }

    /// The store for `T`, created if this is the first time `T` is seen.
    pub fn store<T: Component>(&mut self) -> &mut ComponentStore<T> {
        let max_entities = self.config.max_entities;
        let key = ComponentTypeId::of::<T>();
        let store = self.stores.entry(key).or_insert_with(|| {
            debug!(component = key.short_name(), "created component store");
            let store = match max_entities {
                Some(max) => ComponentStore::<T>::with_max_index(max.saturating_sub(1)),
                None => ComponentStore::<T>::new(),
            };
            Box::new(store) as Box<dyn ErasedStore>
        });
        store
            .as_any_mut()
            .downcast_mut::<ComponentStore<T>>()
            .expect("store keyed by TypeId holds a different component type")
    }

    /// The store for `T` if it exists.
    pub fn try_store<T: Component>(&self) -> Option<&ComponentStore<T>> {
        self.stores
            .get(&ComponentTypeId::of::<T>())
            .and_then(|s| s.as_any().downcast_ref::<ComponentStore<T>>())
    }

    /// The store for `T` if it exists, mutably. Never creates one.
    pub fn try_store_mut<T: Component>(&mut self) -> Option<&mut ComponentStore<T>> {
        self.stores
            .get_mut(&ComponentTypeId::of::<T>())
            .and_then(|s| s.as_any_mut().downcast_mut::<ComponentStore<T>>())
    }

    /// Borrow the stores for two distinct component types mutably at the
    /// same time, creating either if needed.
    ///
    /// # Panics
    ///
    /// Panics if `A` and `B` are the same type.
    pub fn with_store_pair<A, B, R>(
        &mut self,
        f: impl FnOnce(&mut ComponentStore<A>, &mut ComponentStore<B>) -> R,
    ) -> R
    where
        A: Component,
        B: Component,
    {
        let key_a = ComponentTypeId::of::<A>();
        let key_b = ComponentTypeId::of::<B>();
        assert!(
            key_a != key_b,
            "with_store_pair needs two distinct component types, got {key_b} twice"
        );

        self.store::<A>();
        self.store::<B>();

        // Both stores stay in the map; disjoint entries are borrowed together.
        let mut a = None;
        let mut b = None;
        for (key, store) in self.stores.iter_mut() {
            if *key == key_a {
                a = store.as_any_mut().downcast_mut::<ComponentStore<A>>();
            } else if *key == key_b {
                b = store.as_any_mut().downcast_mut::<ComponentStore<B>>();
            }
        }
        match (a, b) {
            (Some(a), Some(b)) => f(a, b),
            _ => unreachable!("stores for {key_a} and {key_b} were created above"),
        }
    }

    // -- component wrappers -------------------------------------------------

    /// Attach `value` to `entity`, replacing (and returning) any existing
    /// `T` on it.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] if `entity` is not live, plus whatever
    /// [`ComponentStore::insert`] reports.
    pub fn add_component<T: Component>(
        &mut self,
        entity: EntityId,
        value: T,
    ) -> Result<Option<T>, EcsError> {
        self.ensure_alive(entity)?;
        self.store::<T>().insert(entity, value)
    }

    /// Detach and return `entity`'s `T`. Other stores are untouched.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] if `entity` is not live,
    /// [`EcsError::NotFound`] if it has no `T`.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> Result<T, EcsError> {
        self.ensure_alive(entity)?;
        self.store::<T>().remove(entity)
    }

    /// `entity`'s `T`.
    ///
    /// # Errors
    ///
    /// As for [`remove_component`](Self::remove_component).
    pub fn get_component<T: Component>(&self, entity: EntityId) -> Result<&T, EcsError> {
        self.ensure_alive(entity)?;
        match self.try_store::<T>() {
            Some(store) => store.get(entity),
            None => Err(EcsError::not_found::<T>(entity)),
        }
    }

    /// `entity`'s `T`, mutably.
    ///
    /// # Errors
    ///
    /// As for [`remove_component`](Self::remove_component).
    pub fn get_component_mut<T: Component>(
        &mut self,
        entity: EntityId,
    ) -> Result<&mut T, EcsError> {
        self.ensure_alive(entity)?;
        match self.try_store_mut::<T>() {
            Some(store) => store.get_mut(entity),
            None => Err(EcsError::not_found::<T>(entity)),
        }
    }

    /// Whether `entity` has a `T`.
    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        self.try_store::<T>()
            .is_some_and(|store| store.contains(entity))
    }

    /// Entities holding both an `A` and a `B`, in `A`'s dense order.
    pub fn join<A: Component, B: Component>(
        &self,
    ) -> impl Iterator<Item = (EntityId, &A, &B)> + '_ {
        self.try_store::<A>()
            .zip(self.try_store::<B>())
            .into_iter()
            .flat_map(|(a, b)| {
                a.iter()
                    .filter_map(move |(entity, va)| b.get(entity).ok().map(|vb| (entity, va, vb)))
            })
    }

    // -- diagnostics --------------------------------------------------------

    /// Number of component stores created so far.
    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    /// Short type names of every store, sorted.
    pub fn component_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            self.stores.values().map(|s| s.component_name()).collect();
        names.sort_unstable();
        names
    }

    /// Every component type `entity` currently has, sorted by name.
    pub fn components_of(&self, entity: EntityId) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .stores
            .values()
            .filter(|s| s.contains(entity))
            .map(|s| s.component_name())
            .collect();
        names.sort_unstable();
        names
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("entities", &self.entities.len())
            .field("stores", &self.component_names())
            .field("config", &self.config)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

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
    struct Health(i32);

    #[test]
    fn create_entity_has_no_components() {
        let mut reg = Registry::new();
        reg.register_component::<Position>();
        let e = reg.create_entity().unwrap();
        assert!(reg.is_alive(e));
        assert!(!reg.has_component::<Position>(e));
        assert!(reg.components_of(e).is_empty());
    }

    #[test]
    fn first_ids_are_sequential() {
        let mut reg = Registry::new();
        let ids: Vec<u32> = (0..3).map(|_| reg.create_entity().unwrap().index()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn add_and_get_component() {
        let mut reg = Registry::new();
        let e = reg.create_entity().unwrap();
        reg.add_component(e, Position { x: 10.0, y: 20.0 }).unwrap();
        assert_eq!(
            reg.get_component::<Position>(e),
            Ok(&Position { x: 10.0, y: 20.0 })
        );
    }

    #[test]
    fn store_is_lazily_created_once() {
        let mut reg = Registry::new();
        assert!(reg.try_store::<Health>().is_none());
        reg.store::<Health>();
        reg.store::<Health>();
        assert_eq!(reg.store_count(), 1);
        assert!(reg.try_store::<Health>().is_some());
    }

    #[test]
    fn read_only_access_does_not_create_stores() {
        let mut reg = Registry::new();
        let e = reg.create_entity().unwrap();
        assert!(matches!(
            reg.get_component::<Health>(e),
            Err(EcsError::NotFound { component: "Health", .. })
        ));
        assert!(!reg.has_component::<Health>(e));
        assert!(reg.get_component_mut::<Health>(e).is_err());
        assert_eq!(reg.store_count(), 0);
    }

    #[test]
    fn remove_component_touches_only_that_store() {
        let mut reg = Registry::new();
        let e = reg.create_entity().unwrap();
        reg.add_component(e, Position { x: 1.0, y: 1.0 }).unwrap();
        reg.add_component(e, Health(3)).unwrap();

        assert_eq!(reg.remove_component::<Health>(e), Ok(Health(3)));
        assert!(!reg.has_component::<Health>(e));
        assert!(reg.has_component::<Position>(e));
    }

    #[test]
    fn remove_missing_component_is_not_found() {
        let mut reg = Registry::new();
        let e = reg.create_entity().unwrap();
        assert!(matches!(
            reg.remove_component::<Health>(e),
            Err(EcsError::NotFound { .. })
        ));
    }

    #[test]
    fn destroy_clears_every_store_and_skips_absent_ones() {
        let mut reg = Registry::new();
        let a = reg.create_entity().unwrap();
        let b = reg.create_entity().unwrap();
        reg.add_component(a, Position { x: 0.0, y: 0.0 }).unwrap();
        reg.add_component(a, Velocity { dx: 1.0, dy: 1.0 }).unwrap();
        reg.add_component(b, Position { x: 5.0, y: 5.0 }).unwrap();
        reg.store::<Health>();

        reg.destroy_entity(a).unwrap();

        assert!(!reg.is_alive(a));
        assert_eq!(reg.store::<Position>().len(), 1);
        assert!(reg.store::<Velocity>().is_empty());
        assert_eq!(
            reg.get_component::<Position>(b),
            Ok(&Position { x: 5.0, y: 5.0 })
        );
    }

    #[test]
    fn destroy_entity_without_components() {
        let mut reg = Registry::new();
        reg.register_component::<Position>();
        reg.register_component::<Health>();
        let e = reg.create_entity().unwrap();
        assert!(reg.destroy_entity(e).is_ok());
    }

    #[test]
    fn destroy_twice_is_invalid_entity() {
        let mut reg = Registry::new();
        let e = reg.create_entity().unwrap();
        reg.destroy_entity(e).unwrap();
        assert_eq!(reg.destroy_entity(e), Err(EcsError::InvalidEntity { entity: e }));
    }

    #[test]
    fn destroy_never_created_is_invalid_entity() {
        let mut reg = Registry::new();
        let ghost = EntityId::new(12, 0);
        assert!(matches!(
            reg.destroy_entity(ghost),
            Err(EcsError::InvalidEntity { .. })
        ));
    }

    #[test]
    fn stale_handle_is_rejected_after_recycle() {
        let mut reg = Registry::new();
        let old = reg.create_entity().unwrap();
        reg.add_component(old, Health(1)).unwrap();
        reg.destroy_entity(old).unwrap();

        let new = reg.create_entity().unwrap();
        assert_eq!(new.index(), old.index());
        reg.add_component(new, Health(2)).unwrap();

        assert!(matches!(
            reg.get_component::<Health>(old),
            Err(EcsError::InvalidEntity { .. })
        ));
        assert!(matches!(
            reg.add_component(old, Health(9)),
            Err(EcsError::InvalidEntity { .. })
        ));
        assert_eq!(reg.get_component::<Health>(new), Ok(&Health(2)));
    }

    #[test]
    fn stale_write_through_store_does_not_block_live_entity() {
        let mut reg = Registry::new();
        let old = reg.create_entity().unwrap();
        reg.destroy_entity(old).unwrap();
        let new = reg.create_entity().unwrap();
        assert_eq!(new.index(), old.index());

        assert_eq!(reg.store::<Health>().insert(old, Health(1)), Ok(None));
        assert_eq!(reg.add_component(new, Health(2)), Ok(None));
        assert_eq!(reg.get_component::<Health>(new), Ok(&Health(2)));
        assert!(!reg.has_component::<Health>(old));
        assert_eq!(reg.store::<Health>().len(), 1);

        assert!(matches!(
            reg.store::<Health>().insert(old, Health(3)),
            Err(EcsError::InvalidEntity { .. })
        ));

        reg.destroy_entity(new).unwrap();
        assert!(reg.store::<Health>().is_empty());
    }

    #[test]
    fn destroy_sweeps_value_left_by_stale_handle() {
        let mut reg = Registry::new();
        let old = reg.create_entity().unwrap();
        reg.destroy_entity(old).unwrap();
        let new = reg.create_entity().unwrap();

        reg.store::<Health>().insert(old, Health(1)).unwrap();
        assert!(!reg.has_component::<Health>(new));

        reg.destroy_entity(new).unwrap();
        assert!(reg.store::<Health>().is_empty());
        assert!(reg.store::<Health>().check_invariants());
    }

    #[test]
    fn max_entities_bounds_creation() {
        let mut reg = Registry::with_config(RegistryConfig {
            max_entities: Some(2),
        });
        let a = reg.create_entity().unwrap();
        reg.create_entity().unwrap();
        assert!(matches!(
            reg.create_entity(),
            Err(EcsError::CapacityExceeded { .. })
        ));
        reg.destroy_entity(a).unwrap();
        let c = reg.create_entity().unwrap();
        reg.add_component(c, Health(1)).unwrap();
    }

    #[test]
    fn join_yields_entities_in_both_stores() {
        let mut reg = Registry::new();
        let moving = reg.create_entity().unwrap();
        let still = reg.create_entity().unwrap();
        reg.add_component(moving, Position { x: 0.0, y: 0.0 }).unwrap();
        reg.add_component(moving, Velocity { dx: 2.0, dy: 0.0 }).unwrap();
        reg.add_component(still, Position { x: 9.0, y: 9.0 }).unwrap();

        let joined: Vec<_> = reg.join::<Position, Velocity>().collect();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].0, moving);
        assert_eq!(joined[0].2, &Velocity { dx: 2.0, dy: 0.0 });

        assert_eq!(reg.join::<Position, Health>().count(), 0);
    }

    #[test]
    fn store_pair_allows_mutating_one_while_reading_other() {
        let mut reg = Registry::new();
        let e = reg.create_entity().unwrap();
        reg.add_component(e, Position { x: 1.0, y: 1.0 }).unwrap();
        reg.add_component(e, Velocity { dx: 0.5, dy: -1.0 }).unwrap();

        reg.with_store_pair::<Position, Velocity, _>(|positions, velocities| {
            for (entity, pos) in positions.iter_mut() {
                if let Ok(vel) = velocities.get(entity) {
                    pos.x += vel.dx;
                    pos.y += vel.dy;
                }
            }
        });

        assert_eq!(
            reg.get_component::<Position>(e),
            Ok(&Position { x: 1.5, y: 0.0 })
        );
        assert_eq!(reg.store_count(), 2);
    }

    #[test]
    #[should_panic(expected = "two distinct component types")]
    fn store_pair_with_same_type_panics() {
        let mut reg = Registry::new();
        reg.with_store_pair::<Health, Health, _>(|_, _| ());
    }

    #[test]
    fn store_pair_keeps_both_stores_when_closure_panics() {
        let mut reg = Registry::new();
        let e = reg.create_entity().unwrap();
        reg.add_component(e, Position { x: 1.0, y: 1.0 }).unwrap();
        reg.add_component(e, Velocity { dx: 0.5, dy: -1.0 }).unwrap();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            reg.with_store_pair::<Position, Velocity, ()>(|_, _| panic!("update failed"));
        }));
        assert!(outcome.is_err());

        assert_eq!(reg.store_count(), 2);
        assert_eq!(
            reg.get_component::<Velocity>(e),
            Ok(&Velocity { dx: 0.5, dy: -1.0 })
        );
        assert_eq!(
            reg.get_component::<Position>(e),
            Ok(&Position { x: 1.0, y: 1.0 })
        );
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: RegistryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, RegistryConfig::default());
        let cfg: RegistryConfig = serde_json::from_str(r#"{"max_entities": 64}"#).unwrap();
        assert_eq!(cfg.max_entities, Some(64));
    }

    #[test]
    fn component_names_are_sorted() {
        let mut reg = Registry::new();
        reg.store::<Velocity>();
        reg.store::<Health>();
        reg.store::<Position>();
        assert_eq!(reg.component_names(), vec!["Health", "Position", "Velocity"]);
    }
}
