//! Instance pool with generational handles
//!
//! Freed slots are recycled by later inserts; a handle to a freed slot
//! carries an older generation and resolves to nothing.

use crate::core::{Error, Result};

/// Handle to a pooled instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceHandle {
    index: u32,
    generation: u32,
}

impl InstanceHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Growable pool of instances.
///
/// # Thread Safety
///
/// Not thread-safe. The pool belongs to the owning thread's scene builder.
pub struct InstancePool<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    live: usize,
    recycled: u64,
}

impl<T> Default for InstancePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InstancePool<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            live: 0,
            recycled: 0,
        }
    }

    /// Store a value, reusing a freed slot when one exists
    pub fn insert(&mut self, value: T) -> InstanceHandle {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            self.recycled += 1;
            return InstanceHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        InstanceHandle {
            index,
            generation: 0,
        }
    }

    /// Free a slot and return its value
    pub fn remove(&mut self, handle: InstanceHandle) -> Result<T> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .ok_or(Error::InstanceNotFound)?;
        let value = slot.value.take().ok_or(Error::InstanceNotFound)?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        self.live -= 1;
        Ok(value)
    }

    pub fn get(&self, handle: InstanceHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: InstanceHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_mut())
    }

    pub fn contains(&self, handle: InstanceHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Live instances
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Slots allocated so far, live or free
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Inserts that reused a freed slot
    pub fn recycled_count(&self) -> u64 {
        self.recycled
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.value.as_ref().map(|v| {
                (
                    InstanceHandle {
                        index: i as u32,
                        generation: s.generation,
                    },
                    v,
                )
            })
        })
    }
}
