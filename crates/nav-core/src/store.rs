//! Index-stable slot storage.
//!
//! Every inserted value gets a [`Handle`] that keeps pointing at that value
//! until the handle itself is removed. Freed slots are recycled LIFO, but a
//! recycled slot is always handed out under a fresh generation, so an old
//! handle never starts resolving again.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, copyable reference to a value in a [`StableIndexStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Handle {
    index: u32,
    generation: u64,
}

impl Handle {
    /// Slot position inside the store.
    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn generation(self) -> u64 {
        self.generation
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
enum Slot<T> {
    Occupied { generation: u64, value: T },
    Free { next_free: Option<u32> },
}

/// Dense array of slots with an intrusive free list.
#[derive(Debug, Clone)]
pub struct StableIndexStore<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    count: usize,
    next_generation: u64,
}

impl<T> Default for StableIndexStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StableIndexStore<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            count: 0,
            next_generation: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    /// Store `value`, reusing the most recently freed slot when there is one.
    pub fn insert(&mut self, value: T) -> Handle {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.count += 1;

        if let Some(index) = self.free_head {
            let slot = &mut self.slots[index as usize];
            if let Slot::Free { next_free } = *slot {
                self.free_head = next_free;
            }
            *slot = Slot::Occupied { generation, value };
            return Handle { index, generation };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot::Occupied { generation, value });
        Handle { index, generation }
    }

    /// Remove the value behind `handle`.
    ///
    /// Removing a stale or out-of-range handle is a no-op returning `None`.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        if !self.contains(handle) {
            return None;
        }
        let slot = std::mem::replace(
            &mut self.slots[handle.index()],
            Slot::Free {
                next_free: self.free_head,
            },
        );
        self.free_head = Some(handle.index);
        self.count -= 1;
        match slot {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Free { .. } => None,
        }
    }

    pub fn contains(&self, handle: Handle) -> bool {
        matches!(
            self.slots.get(handle.index()),
            Some(Slot::Occupied { generation, .. }) if *generation == handle.generation
        )
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        match self.slots.get(handle.index()) {
            Some(Slot::Occupied { generation, value }) if *generation == handle.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        match self.slots.get_mut(handle.index()) {
            Some(Slot::Occupied { generation, value }) if *generation == handle.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    /// Occupied entries in slot order. Restarting the iterator starts over.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { generation, value } => Some((
                    Handle {
                        index: index as u32,
                        generation: *generation,
                    },
                    value,
                )),
                Slot::Free { .. } => None,
            })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle, &mut T)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { generation, value } => Some((
                    Handle {
                        index: index as u32,
                        generation: *generation,
                    },
                    value,
                )),
                Slot::Free { .. } => None,
            })
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.iter().map(|(handle, _)| handle)
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// One past the highest slot index ever used.
    pub fn high_water(&self) -> usize {
        self.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Drop every value. All outstanding handles become invalid.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_head = None;
        self.count = 0;
    }
}
