//! Entity identifiers and allocation.
//!
//! An [`EntityId`] is a 64-bit handle that packs a *generation* counter in the
//! high 32 bits and an *index* in the low 32 bits. The index is what the
//! sparse index of every component store is addressed by; the generation is
//! bumped each time an index is recycled so that a handle kept past
//! [`Registry::destroy_entity`](crate::registry::Registry::destroy_entity)
//! never aliases the entity that later reuses its index.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::EcsError;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational entity identifier.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Construct an `EntityId` from an index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The index portion (low 32 bits). Addresses sparse index slots.
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation portion (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Hands out [`EntityId`]s and owns the authoritative set of live ones.
///
/// Freed indices go to the back of a FIFO queue, so an index is reused only
/// after every index freed before it. Combined with the generation bump this
/// keeps stale handles from colliding with fresh ones for as long as possible.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    /// Current generation for each index slot.
    generations: Vec<u32>,
    /// Whether the slot is currently alive.
    alive: Vec<bool>,
    /// Recyclable indices, oldest first.
    free_indices: VecDeque<u32>,
    /// Number of live entities.
    live: usize,
    /// Upper bound on the number of distinct indices, if any.
    max_entities: Option<u32>,
}

impl EntityAllocator {
    /// Create a new, unbounded allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an allocator that never hands out more than `max_entities`
    /// distinct indices.
    pub fn with_max_entities(max_entities: u32) -> Self {
        Self {
            max_entities: Some(max_entities),
            ..Self::default()
        }
    }

    /// Allocate an [`EntityId`].
    ///
    /// A recycled index is preferred (its generation was bumped on
    /// deallocation). Otherwise a new index is appended.
    ///
    /// # Errors
    ///
    /// [`EcsError::CapacityExceeded`] when no index is free and the
    /// configured maximum has been reached.
    pub fn allocate(&mut self) -> Result<EntityId, EcsError> {
        if let Some(index) = self.free_indices.pop_front() {
            self.alive[index as usize] = true;
            self.live += 1;
            return Ok(EntityId::new(index, self.generations[index as usize]));
        }

        let next = self.generations.len();
        let limit = self.max_entities.unwrap_or(u32::MAX);
        if next >= limit as usize {
            return Err(EcsError::CapacityExceeded {
                requested: next as u64,
                max: limit as u64,
            });
        }

        let index = next as u32;
        self.generations.push(0);
        self.alive.push(true);
        self.live += 1;
        Ok(EntityId::new(index, 0))
    }

    /// Deallocate an entity, bumping the generation for its index so that
    /// outstanding handles become stale.
    ///
    /// Returns `false` (and changes nothing) if `id` is not currently alive.
    pub fn deallocate(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let idx = id.index() as usize;
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_indices.push_back(id.index());
        self.live -= 1;
        true
    }

    /// Returns `true` if `id` is alive and its generation is current.
    pub fn is_alive(&self, id: EntityId) -> bool {
        let idx = id.index() as usize;
        idx < self.generations.len() && self.alive[idx] && self.generations[idx] == id.generation()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no entity is alive.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of distinct indices ever handed out (live or free).
    pub fn index_bound(&self) -> usize {
        self.generations.len()
    }

    /// The configured maximum, if any.
    pub fn max_entities(&self) -> Option<u32> {
        self.max_entities
    }

    /// Live entities in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.alive
            .iter()
            .zip(&self.generations)
            .enumerate()
            .filter(|(_, (alive, _))| **alive)
            .map(|(idx, (_, &gen))| EntityId::new(idx as u32, gen))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_unique_ids() {
        let mut alloc = EntityAllocator::new();
        let ids: Vec<EntityId> = (0..100).map(|_| alloc.allocate().unwrap()).collect();
        let mut indices: Vec<u32> = ids.iter().map(|id| id.index()).collect();
        indices.sort();
        indices.dedup();
        assert_eq!(indices.len(), 100);
        assert_eq!(alloc.len(), 100);
    }

    #[test]
    fn recycled_index_gets_next_generation() {
        let mut alloc = EntityAllocator::new();
        let e0 = alloc.allocate().unwrap();
        assert!(alloc.deallocate(e0));
        let e1 = alloc.allocate().unwrap();
        assert_eq!(e1.index(), e0.index());
        assert_eq!(e1.generation(), 1);
        assert!(!alloc.is_alive(e0), "stale handle must not be alive");
        assert!(alloc.is_alive(e1));
    }

    #[test]
    fn free_list_is_fifo() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate().unwrap();
        let b = alloc.allocate().unwrap();
        alloc.deallocate(b);
        alloc.deallocate(a);
        assert_eq!(alloc.allocate().unwrap().index(), b.index());
        assert_eq!(alloc.allocate().unwrap().index(), a.index());
    }

    #[test]
    fn double_deallocate_returns_false() {
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate().unwrap();
        assert!(alloc.deallocate(e));
        assert!(!alloc.deallocate(e));
        assert_eq!(alloc.len(), 0);
    }

    #[test]
    fn never_allocated_is_not_alive() {
        let alloc = EntityAllocator::new();
        assert!(!alloc.is_alive(EntityId::new(7, 0)));
    }

    #[test]
    fn capacity_limit_is_enforced() {
        let mut alloc = EntityAllocator::with_max_entities(2);
        let a = alloc.allocate().unwrap();
        alloc.allocate().unwrap();
        assert!(matches!(
            alloc.allocate(),
            Err(EcsError::CapacityExceeded { requested: 2, max: 2 })
        ));

        // Recycling stays within the bound.
        alloc.deallocate(a);
        assert!(alloc.allocate().is_ok());
    }

    #[test]
    fn iter_yields_live_ids_in_index_order() {
        let mut alloc = EntityAllocator::new();
        let ids: Vec<_> = (0..4).map(|_| alloc.allocate().unwrap()).collect();
        alloc.deallocate(ids[1]);
        let live: Vec<_> = alloc.iter().collect();
        assert_eq!(live, vec![ids[0], ids[2], ids[3]]);
    }

    #[test]
    fn entity_id_packs_index_and_generation() {
        let id = EntityId::new(42, 7);
        assert_eq!(id.index(), 42);
        assert_eq!(id.generation(), 7);
        assert_eq!(EntityId::from_raw(id.to_raw()), id);
        assert_eq!(format!("{id}"), "42v7");
        assert_eq!(format!("{id:?}"), "EntityId(42v7)");
    }
}
