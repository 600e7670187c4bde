use std::marker::PhantomData;
use crate::error::PhysicsError;
use crate::Result;

/// A typed index into an [`Arena`]. The generation detects use of a
/// handle after its slot has been recycled.
pub trait ArenaHandle: Copy + std::fmt::Debug {
    /// Human readable name of the stored object, used in error messages
    const KIND: &'static str;

    fn from_raw_parts(index: u32, generation: u32) -> Self;

    fn index(&self) -> usize;

    fn generation(&self) -> u32;
}

/// Declares a generational handle type
macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl $crate::core::storage::ArenaHandle for $name {
            const KIND: &'static str = $kind;

            #[inline]
            fn from_raw_parts(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            #[inline]
            fn index(&self) -> usize {
                self.index as usize
            }

            #[inline]
            fn generation(&self) -> u32 {
                self.generation
            }
        }
    };
}

pub(crate) use define_handle;

#[derive(Debug, Clone)]
struct Entry<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage with a free list. Removed slots are recycled, and
/// iteration always visits live values in slot order.
#[derive(Debug, Clone)]
pub struct Arena<H, T> {
    entries: Vec<Entry<T>>,
    free: Vec<u32>,
    len: usize,
    _marker: PhantomData<H>,
}

impl<H: ArenaHandle, T> Default for Arena<H, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ArenaHandle, T> Arena<H, T> {
    /// Creates a new empty arena
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Adds an item and returns its handle
    pub fn insert(&mut self, value: T) -> H {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.value = Some(value);
            return H::from_raw_parts(index, entry.generation);
        }

        let index = self.entries.len() as u32;
        self.entries.push(Entry { generation: 0, value: Some(value) });
        H::from_raw_parts(index, 0)
    }

    /// Returns the handle the next `insert` will produce
    pub fn next_handle(&self) -> H {
        match self.free.last() {
            Some(&index) => H::from_raw_parts(index, self.entries[index as usize].generation),
            None => H::from_raw_parts(self.entries.len() as u32, 0),
        }
    }

    /// Gets a reference to an item by its handle
    pub fn get(&self, handle: H) -> Option<&T> {
        self.entries
            .get(handle.index())
            .filter(|e| e.generation == handle.generation())
            .and_then(|e| e.value.as_ref())
    }

    /// Gets a mutable reference to an item by its handle
    pub fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        self.entries
            .get_mut(handle.index())
            .filter(|e| e.generation == handle.generation())
            .and_then(|e| e.value.as_mut())
    }

    /// Gets an item by its handle, returning an error if not found
    pub fn fetch(&self, handle: H) -> Result<&T> {
        self.get(handle).ok_or_else(|| {
            PhysicsError::ResourceNotFound(format!("{} with handle {:?} not found", H::KIND, handle))
        })
    }

    /// Gets a mutable item by its handle, returning an error if not found
    pub fn fetch_mut(&mut self, handle: H) -> Result<&mut T> {
        self.get_mut(handle).ok_or_else(|| {
            PhysicsError::ResourceNotFound(format!("{} with handle {:?} not found", H::KIND, handle))
        })
    }

    /// Mutable access to two distinct items at once
    pub fn get2_mut(&mut self, a: H, b: H) -> Option<(&mut T, &mut T)> {
        if a.index() == b.index() || !self.contains(a) || !self.contains(b) {
            return None;
        }

        let (lo, hi, swapped) = if a.index() < b.index() {
            (a.index(), b.index(), false)
        } else {
            (b.index(), a.index(), true)
        };
        let (head, tail) = self.entries.split_at_mut(hi);
        let first = head[lo].value.as_mut()?;
        let second = tail[0].value.as_mut()?;
        if swapped {
            Some((second, first))
        } else {
            Some((first, second))
        }
    }

    /// Returns true if the handle refers to a live item
    pub fn contains(&self, handle: H) -> bool {
        self.get(handle).is_some()
    }

    /// Removes an item, invalidating its handle
    pub fn remove(&mut self, handle: H) -> Option<T> {
        let entry = self.entries.get_mut(handle.index())?;
        if entry.generation != handle.generation() {
            return None;
        }
        let value = entry.value.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(handle.index() as u32);
        self.len -= 1;
        Some(value)
    }

    /// Returns the number of live items
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Removes every item
    pub fn clear(&mut self) {
        self.entries.clear();
        self.free.clear();
        self.len = 0;
    }

    /// Handles of all live items in slot order
    pub fn handles(&self) -> Vec<H> {
        self.iter().map(|(h, _)| h).collect()
    }

    /// Iterates over live items in slot order
    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> + '_ {
        self.entries.iter().enumerate().filter_map(|(i, e)| {
            e.value.as_ref().map(|v| (H::from_raw_parts(i as u32, e.generation), v))
        })
    }

    /// Iterates mutably over live items in slot order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (H, &mut T)> + '_ {
        self.entries.iter_mut().enumerate().filter_map(|(i, e)| {
            let generation = e.generation;
            e.value.as_mut().map(|v| (H::from_raw_parts(i as u32, generation), v))
        })
    }

    /// Iterates over live values in slot order
    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.entries.iter().filter_map(|e| e.value.as_ref())
    }

    /// Iterates mutably over live values in slot order
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.entries.iter_mut().filter_map(|e| e.value.as_mut())
    }
}

impl<H: ArenaHandle, T> std::ops::Index<H> for Arena<H, T> {
    type Output = T;

    fn index(&self, handle: H) -> &T {
        match self.get(handle) {
            Some(value) => value,
            None => panic!("stale {} handle {:?}", H::KIND, handle),
        }
    }
}

impl<H: ArenaHandle, T> std::ops::IndexMut<H> for Arena<H, T> {
    fn index_mut(&mut self, handle: H) -> &mut T {
        match self.get_mut(handle) {
            Some(value) => value,
            None => panic!("stale {} handle {:?}", H::KIND, handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    define_handle!(TestHandle, "Item");

    #[test]
    fn recycled_slots_reject_stale_handles() {
        let mut arena: Arena<TestHandle, &str> = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.remove(a), Some("a"));
        assert!(arena.get(a).is_none());

        let c = arena.insert("c");
        assert_eq!(c.index(), a.index());
        assert_ne!(c, a);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(c), Some(&"c"));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.handles(), vec![c, b]);
    }

    #[test]
    fn get2_mut_returns_requested_order() {
        let mut arena: Arena<TestHandle, i32> = Arena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);
        let (x, y) = arena.get2_mut(b, a).unwrap();
        assert_eq!((*x, *y), (2, 1));
        assert!(arena.get2_mut(a, a).is_none());
    }
}
