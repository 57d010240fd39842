use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Handle returned by the arena allocator.
///
/// The generation is bumped every time a slot is freed, so a handle kept
/// after its value was removed never resolves to the slot's next occupant.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ArenaHandle<T> {
    index: u32,
    generation: u32,
    #[serde(skip)]
    _marker: PhantomData<fn() -> T>,
}

impl<T> ArenaHandle<T> {
    fn new(index: usize, generation: u32) -> Self {
        Self {
            index: index as u32,
            generation,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

// Manual impls: the derives would require `T` itself to be Copy/Eq/...
impl<T> Clone for ArenaHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArenaHandle<T> {}

impl<T> PartialEq for ArenaHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for ArenaHandle<T> {}

impl<T> Hash for ArenaHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for ArenaHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot arena with free-list reuse and generation-checked handles.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    entries: Vec<Slot<T>>,
    free: Vec<usize>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn allocate(&mut self, value: T) -> ArenaHandle<T> {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.entries[index];
            slot.value = Some(value);
            return ArenaHandle::new(index, slot.generation);
        }
        let handle = ArenaHandle::new(self.entries.len(), 0);
        self.entries.push(Slot {
            generation: 0,
            value: Some(value),
        });
        handle
    }

    pub fn remove(&mut self, handle: ArenaHandle<T>) -> Option<T> {
        let slot = self.entries.get_mut(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index());
        self.len -= 1;
        Some(value)
    }

    pub fn contains(&self, handle: ArenaHandle<T>) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: ArenaHandle<T>) -> Option<&T> {
        self.entries
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: ArenaHandle<T>) -> Option<&mut T> {
        self.entries
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Live entries with their handles, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ArenaHandle<T>, &T)> {
        self.entries.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (ArenaHandle::new(index, slot.generation), value))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ArenaHandle<T>, &mut T)> {
        self.entries
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| {
                let generation = slot.generation;
                slot.value
                    .as_mut()
                    .map(|value| (ArenaHandle::new(index, generation), value))
            })
    }

    pub fn handles(&self) -> Vec<ArenaHandle<T>> {
        self.iter().map(|(handle, _)| handle).collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        for (index, slot) in self.entries.iter_mut().enumerate() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index);
            }
        }
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_roundtrip() {
        let mut arena = Arena::new();
        let handle_a = arena.allocate("hello");
        let handle_b = arena.allocate("world");
        assert_eq!(arena.get(handle_a), Some(&"hello"));
        assert_eq!(arena.get(handle_b), Some(&"world"));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn stale_handle_does_not_resolve_after_reuse() {
        let mut arena = Arena::new();
        let old = arena.allocate(1);
        assert_eq!(arena.remove(old), Some(1));
        let new = arena.allocate(2);
        assert_eq!(old.index(), new.index());
        assert_ne!(old, new);
        assert_eq!(arena.get(old), None);
        assert_eq!(arena.get(new), Some(&2));
        assert_eq!(arena.remove(old), None);
    }

    #[test]
    fn clear_invalidates_everything() {
        let mut arena = Arena::new();
        let a = arena.allocate('a');
        arena.allocate('b');
        arena.clear();
        assert!(arena.is_empty());
        assert!(!arena.contains(a));
        assert_eq!(arena.iter().count(), 0);
    }
}
