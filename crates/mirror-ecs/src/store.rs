//! Sparse-set component storage.
//!
//! A [`ComponentStore<T>`] pairs a [`SparseIndex`] with two packed arrays of
//! equal length: `dense` (the owning [`EntityId`] of each slot) and `data`
//! (the component values). Lookup goes `entity.index() -> sparse -> slot`
//! and then checks `dense[slot] == entity`, so a stale handle whose index has
//! been reused is never mistaken for the live one.
//!
//! Removal is a swap-remove: the last slot moves into the hole. That keeps
//! insert, lookup and removal O(1) but means **dense order is not stable**
//! across removals. Treat iteration order as unordered and use [`EntityId`],
//! never slot position, as the handle that survives mutation.

use std::any::Any;
use std::fmt;

use crate::component::{short_type_name, Component};
use crate::entity::EntityId;
use crate::sparse::SparseIndex;
use crate::EcsError;

// ---------------------------------------------------------------------------
// ComponentStore
// ---------------------------------------------------------------------------

/// Storage for every component of type `T`, keyed by [`EntityId`].
///
/// # Invariants
///
/// - `dense.len() == data.len()`
/// - for every slot `i`, `sparse[dense[i].index()] == Some(i)`
/// - the number of present sparse slots equals `dense.len()`
///
/// [`check_invariants`](Self::check_invariants) verifies all three.
pub struct ComponentStore<T> {
    sparse: SparseIndex,
    dense: Vec<EntityId>,
    data: Vec<T>,
}

impl<T> Default for ComponentStore<T> {
    fn default() -> Self {
        Self {
            sparse: SparseIndex::new(),
            dense: Vec::new(),
            data: Vec::new(),
        }
    }
}

impl<T> ComponentStore<T> {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store whose sparse index refuses entity indices above
    /// `max_index`.
    pub fn with_max_index(max_index: u32) -> Self {
        Self {
            sparse: SparseIndex::with_max_index(max_index),
            dense: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Dense slot of `entity`, if this store holds a value for exactly that
    /// handle (index *and* generation).
    #[inline]
    fn slot_of(&self, entity: EntityId) -> Option<usize> {
        self.sparse
            .get(entity.index())
            .filter(|&slot| self.dense[slot] == entity)
    }

    fn not_found(entity: EntityId) -> EcsError {
        EcsError::not_found::<T>(entity)
    }

    /// Associate `value` with `entity`.
    ///
    /// If `entity` already has a value here it is replaced in place (no new
    /// dense slot) and the old value is returned. A value left behind by an
    /// older generation of the same index is overwritten in its slot and
    /// dropped; the result is then `Ok(None)`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidEntity`] if the entity's index is held by a
    ///   newer generation of that index.
    /// - [`EcsError::CapacityExceeded`] if the index is past the store's
    ///   bound.
    pub fn insert(&mut self, entity: EntityId, value: T) -> Result<Option<T>, EcsError> {
        if let Some(slot) = self.sparse.get(entity.index()) {
            let occupant = self.dense[slot];
            if occupant == entity {
                return Ok(Some(std::mem::replace(&mut self.data[slot], value)));
            }
            if occupant.generation() > entity.generation() {
                return Err(EcsError::InvalidEntity { entity });
            }
            self.dense[slot] = entity;
            self.data[slot] = value;
            return Ok(None);
        }

        let slot = self.dense.len();
        self.sparse.set(entity.index(), slot)?;
        self.dense.push(entity);
        self.data.push(value);
        debug_assert_eq!(self.dense.len(), self.data.len());
        Ok(None)
    }

    /// Shared reference to `entity`'s value.
    ///
    /// # Errors
    ///
    /// [`EcsError::NotFound`] if `entity` has no value in this store
    /// (including when it is past the sparse bound).
    pub fn get(&self, entity: EntityId) -> Result<&T, EcsError> {
        match self.slot_of(entity) {
            Some(slot) => Ok(&self.data[slot]),
            None => Err(Self::not_found(entity)),
        }
    }

    /// Mutable reference to `entity`'s value.
    ///
    /// # Errors
    ///
    /// [`EcsError::NotFound`], as for [`get`](Self::get).
    pub fn get_mut(&mut self, entity: EntityId) -> Result<&mut T, EcsError> {
        match self.slot_of(entity) {
            Some(slot) => Ok(&mut self.data[slot]),
            None => Err(Self::not_found(entity)),
        }
    }

    /// Remove and return `entity`'s value.
    ///
    /// The last dense slot is moved into the vacated one and its sparse entry
    /// repointed. When the removed value already sits in the last slot
    /// nothing moves.
    ///
    /// # Errors
    ///
    /// [`EcsError::NotFound`], as for [`get`](Self::get).
    pub fn remove(&mut self, entity: EntityId) -> Result<T, EcsError> {
        let slot = self.slot_of(entity).ok_or_else(|| Self::not_found(entity))?;
        let last = self.dense.len() - 1;

        self.dense.swap_remove(slot);
        let value = self.data.swap_remove(slot);

        if slot != last {
            let moved = self.dense[slot];
            self.sparse.relocate(moved.index(), slot);
        }
        self.sparse.clear(entity.index());

        debug_assert_eq!(self.dense.len(), self.data.len());
        Ok(value)
    }

    /// Whether `entity` has a value in this store.
    #[inline]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.slot_of(entity).is_some()
    }

    /// The handle, of whatever generation, holding a value at `index`.
    pub fn occupant(&self, index: u32) -> Option<EntityId> {
        self.sparse.get(index).map(|slot| self.dense[slot])
    }

    /// Number of stored values.
    #[inline]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Whether the store holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Drop every value. The sparse bound is kept.
    pub fn clear(&mut self) {
        self.dense.clear();
        self.data.clear();
        self.sparse.clear_all();
    }

    /// Owners of the stored values, in dense order.
    pub fn entities(&self) -> &[EntityId] {
        &self.dense
    }

    /// Stored values, in dense order.
    pub fn values(&self) -> &[T] {
        &self.data
    }

    /// Stored values, mutably, in dense order.
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// `(entity, &value)` pairs in dense order.
    pub fn iter(&self) -> Iter<'_, T> {
        self.dense.iter().copied().zip(self.data.iter())
    }

    /// `(entity, &mut value)` pairs in dense order.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        self.dense.iter().copied().zip(self.data.iter_mut())
    }

    /// The store's sparse index.
    pub fn sparse(&self) -> &SparseIndex {
        &self.sparse
    }

    /// Verify the sparse/dense invariants. `O(sparse bound + len)`.
    ///
    /// Meant for tests and debugging; normal operation keeps these
    /// invariants by construction.
    pub fn check_invariants(&self) -> bool {
        if self.dense.len() != self.data.len() {
            return false;
        }
        let dense_ok = self
            .dense
            .iter()
            .enumerate()
            .all(|(slot, e)| self.sparse.get(e.index()) == Some(slot));
        let sparse_ok = self
            .sparse
            .iter_present()
            .all(|(index, slot)| slot < self.dense.len() && self.dense[slot].index() == index);
        dense_ok && sparse_ok
    }
}

/// Iterator returned by [`ComponentStore::iter`].
pub type Iter<'a, T> =
    std::iter::Zip<std::iter::Copied<std::slice::Iter<'a, EntityId>>, std::slice::Iter<'a, T>>;

/// Iterator returned by [`ComponentStore::iter_mut`].
pub type IterMut<'a, T> =
    std::iter::Zip<std::iter::Copied<std::slice::Iter<'a, EntityId>>, std::slice::IterMut<'a, T>>;

impl<'a, T> IntoIterator for &'a ComponentStore<T> {
    type Item = (EntityId, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut ComponentStore<T> {
    type Item = (EntityId, &'a mut T);
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T: fmt::Debug> fmt::Debug for ComponentStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// ErasedStore -- type-erased view used by the registry
// ---------------------------------------------------------------------------

/// Object-safe view of a [`ComponentStore`] whose component type is not
/// known at the call site.
///
/// The registry keeps one `Box<dyn ErasedStore>` per component type. Entity
/// destruction goes through [`remove_entity`](Self::remove_entity); typed
/// access downcasts through [`as_any`](Self::as_any).
pub trait ErasedStore: Send + Sync {
    /// Short type name of the stored component.
    fn component_name(&self) -> &'static str;

    /// Whether `entity` has a value in this store.
    fn contains(&self, entity: EntityId) -> bool;

    /// Drop `entity`'s value if present. Returns whether anything was
    /// removed.
    fn remove_entity(&mut self, entity: EntityId) -> bool;

    /// The handle holding a value at `index`, of whatever generation.
    fn occupant(&self, index: u32) -> Option<EntityId>;

    /// Number of stored values.
    fn len(&self) -> usize;

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStore for ComponentStore<T> {
    fn component_name(&self) -> &'static str {
        short_type_name(std::any::type_name::<T>())
    }

    fn contains(&self, entity: EntityId) -> bool {
        ComponentStore::contains(self, entity)
    }

    fn remove_entity(&mut self, entity: EntityId) -> bool {
        self.remove(entity).is_ok()
    }

    fn occupant(&self, index: u32) -> Option<EntityId> {
        ComponentStore::occupant(self, index)
    }

    fn len(&self) -> usize {
        ComponentStore::len(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
