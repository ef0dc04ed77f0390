//! Sparse index: entity index -> dense slot.
//!
//! The sparse side of a sparse set. It is addressed directly by
//! [`EntityId::index`](crate::entity::EntityId::index), grows to cover the
//! highest index seen, and never shrinks: erasing only marks a slot absent.

use crate::EcsError;

/// Maps entity indices to positions in a store's dense arrays.
#[derive(Debug, Clone, Default)]
pub struct SparseIndex {
    slots: Vec<Option<usize>>,
    /// Highest index `set` accepts, if bounded.
    max_index: Option<u32>,
}

impl SparseIndex {
    /// An empty, unbounded index.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty index that refuses to grow past `max_index`.
    pub fn with_max_index(max_index: u32) -> Self {
        Self {
            slots: Vec::new(),
            max_index: Some(max_index),
        }
    }

    /// The dense slot recorded for `index`, or `None` if absent or out of
    /// bounds.
    #[inline]
    pub fn get(&self, index: u32) -> Option<usize> {
        self.slots.get(index as usize).copied().flatten()
    }

    /// Whether `index` is within bounds and has a slot.
    #[inline]
    pub fn is_present(&self, index: u32) -> bool {
        self.get(index).is_some()
    }

    /// Record `slot` for `index`, growing the index with absent slots as
    /// needed.
    ///
    /// # Errors
    ///
    /// [`EcsError::CapacityExceeded`] if `index` is past the configured
    /// maximum.
    pub fn set(&mut self, index: u32, slot: usize) -> Result<(), EcsError> {
        if let Some(max) = self.max_index {
            if index > max {
                return Err(EcsError::CapacityExceeded {
                    requested: index as u64,
                    max: max as u64,
                });
            }
        }
        let idx = index as usize;
        if idx >= self.slots.len() {
            self.slots.resize(idx + 1, None);
        }
        self.slots[idx] = Some(slot);
        Ok(())
    }

    /// Repoint an index that is already present. Used by swap-remove, which
    /// never needs to grow.
    #[inline]
    pub(crate) fn relocate(&mut self, index: u32, slot: usize) {
        let entry = &mut self.slots[index as usize];
        debug_assert!(entry.is_some(), "relocating absent sparse slot {index}");
        *entry = Some(slot);
    }

    /// Mark `index` absent. Out-of-bounds indices are ignored.
    pub fn clear(&mut self, index: u32) {
        if let Some(entry) = self.slots.get_mut(index as usize) {
            *entry = None;
        }
    }

    /// Mark every slot absent, keeping the allocated bound.
    pub fn clear_all(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Current bound: one past the highest index ever set.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the index has never grown.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of present slots. Linear in [`len`](Self::len).
    pub fn present_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// `(index, slot)` for every present slot.
    pub(crate) fn iter_present(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.map(|s| (idx as u32, s)))
    }
}
