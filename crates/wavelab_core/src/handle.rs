//! Generational entity handles.
//!
//! The simulation owns its entities and may destroy or recycle them at any
//! tick. Anything that refers to an entity across ticks (removal Ops,
//! outcome classification, protected-entity sampling) holds an
//! [`EntityHandle`]: a slot index paired with the identity tag the slot had
//! when the handle was issued. A handle is valid only while the slot still
//! carries that tag, so a recycled slot never aliases an old reference.

use serde::{Deserialize, Serialize};

/// Identity tag of an entity. Unique for the lifetime of a simulation.
pub type IdentityTag = u32;

/// Weak reference to a simulation-owned entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityHandle {
    slot: u32,
    tag: IdentityTag,
}

impl EntityHandle {
    /// Create a handle from raw parts.
    #[must_use]
    pub const fn new(slot: u32, tag: IdentityTag) -> Self {
        Self { slot, tag }
    }

    /// Slot index inside the owning arena.
    #[must_use]
    pub const fn slot(self) -> u32 {
        self.slot
    }

    /// Identity tag captured when the handle was issued.
    #[must_use]
    pub const fn tag(self) -> IdentityTag {
        self.tag
    }
}

/// Monotonic identity tag source shared by every arena of one simulation.
#[derive(Debug, Clone)]
pub struct TagSource {
    next: IdentityTag,
}

impl TagSource {
    /// Start issuing tags at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Issue the next tag.
    pub fn issue(&mut self) -> IdentityTag {
        let tag = self.next;
        self.next = self.next.wrapping_add(1).max(1);
        tag
    }
}

impl Default for TagSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    tag: IdentityTag,
    value: Option<T>,
}

/// Slot arena with free-list reuse.
///
/// Removing an entity frees its slot for the next insertion; the new
/// occupant gets a fresh tag, which invalidates every handle to the old one.
#[derive(Debug, Clone)]
pub struct Slots<T> {
    entries: Vec<Entry<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Slots<T> {
    /// Create an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Insert a value under the given tag and return its handle.
    pub fn insert(&mut self, tag: IdentityTag, value: T) -> EntityHandle {
        self.len += 1;
        if let Some(slot) = self.free.pop() {
            let entry = &mut self.entries[slot as usize];
            entry.tag = tag;
            entry.value = Some(value);
            return EntityHandle::new(slot, tag);
        }

        let slot = self.entries.len() as u32;
        self.entries.push(Entry {
            tag,
            value: Some(value),
        });
        EntityHandle::new(slot, tag)
    }

    /// Remove the entity behind a handle. Stale handles remove nothing.
    pub fn remove(&mut self, handle: EntityHandle) -> Option<T> {
        let entry = self.entries.get_mut(handle.slot as usize)?;
        if entry.tag != handle.tag {
            return None;
        }
        let value = entry.value.take()?;
        self.free.push(handle.slot);
        self.len -= 1;
        Some(value)
    }

    /// Check whether the handle still refers to a live entity.
    #[must_use]
    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Get the entity behind a handle.
    #[must_use]
    pub fn get(&self, handle: EntityHandle) -> Option<&T> {
        self.entries
            .get(handle.slot as usize)
            .filter(|entry| entry.tag == handle.tag)
            .and_then(|entry| entry.value.as_ref())
    }

    /// Get a mutable reference to the entity behind a handle.
    pub fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut T> {
        self.entries
            .get_mut(handle.slot as usize)
            .filter(|entry| entry.tag == handle.tag)
            .and_then(|entry| entry.value.as_mut())
    }

    /// Handles of all live entities in slot order.
    #[must_use]
    pub fn handles(&self) -> Vec<EntityHandle> {
        self.iter().map(|(handle, _)| handle).collect()
    }

    /// Iterate live entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, &T)> {
        self.entries.iter().enumerate().filter_map(|(slot, entry)| {
            entry
                .value
                .as_ref()
                .map(|value| (EntityHandle::new(slot as u32, entry.tag), value))
        })
    }

    /// Iterate live entities mutably in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityHandle, &mut T)> {
        self.entries.iter_mut().enumerate().filter_map(|(slot, entry)| {
            let tag = entry.tag;
            entry
                .value
                .as_mut()
                .map(|value| (EntityHandle::new(slot as u32, tag), value))
        })
    }

    /// Number of live entities.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check if the arena is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove every entity. Slots are kept for reuse.
    pub fn clear(&mut self) {
        self.free.clear();
        for (slot, entry) in self.entries.iter_mut().enumerate().rev() {
            entry.value = None;
            self.free.push(slot as u32);
        }
        self.len = 0;
    }
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self::new()
    }
}
