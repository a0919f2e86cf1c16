//! Generation-checked slab storage for blocks and files.
//!
//! Every slot carries a generation counter that is bumped when its entry is
//! removed. An [`ArenaId`] records the generation it was issued with, so an id
//! that outlives its entry resolves to `None` instead of aliasing whatever
//! reuses the slot.

use crate::error::Result;

/// Index into an [`Arena`], valid only for the generation it was issued with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaId {
    slot: u32,
    generation: u32,
}

impl ArenaId {
    /// Slot position inside the arena.
    pub fn slot(&self) -> usize {
        self.slot as usize
    }
}

#[derive(Debug)]
enum Entry<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32, next_free: Option<u32> },
}

/// Slab of `T` values addressed by [`ArenaId`].
#[derive(Debug)]
pub struct Arena<T> {
    entries: Vec<Entry<T>>,
    free_head: Option<u32>,
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
            free_head: None,
            len: 0,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Store a value, reusing a vacant slot when one exists.
    ///
    /// Fails with `OutOfMemory` if the slot vector cannot grow; the arena is
    /// left unchanged in that case.
    pub fn insert(&mut self, value: T) -> Result<ArenaId> {
        if let Some(slot) = self.free_head {
            let entry = &mut self.entries[slot as usize];
            let (generation, next_free) = match entry {
                Entry::Vacant {
                    generation,
                    next_free,
                } => (*generation, *next_free),
                Entry::Occupied { .. } => unreachable!("free list points at an occupied slot"),
            };
            *entry = Entry::Occupied { generation, value };
            self.free_head = next_free;
            self.len += 1;
            return Ok(ArenaId { slot, generation });
        }

        self.entries.try_reserve(1)?;
        let slot = self.entries.len() as u32;
        self.entries.push(Entry::Occupied {
            generation: 0,
            value,
        });
        self.len += 1;
        Ok(ArenaId {
            slot,
            generation: 0,
        })
    }

    pub fn get(&self, id: ArenaId) -> Option<&T> {
        match self.entries.get(id.slot as usize)? {
            Entry::Occupied { generation, value } if *generation == id.generation => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: ArenaId) -> Option<&mut T> {
        match self.entries.get_mut(id.slot as usize)? {
            Entry::Occupied { generation, value } if *generation == id.generation => Some(value),
            _ => None,
        }
    }

    /// Remove and return the entry for `id`, invalidating every copy of it.
    pub fn remove(&mut self, id: ArenaId) -> Option<T> {
        let entry = self.entries.get_mut(id.slot as usize)?;
        match entry {
            Entry::Occupied { generation, .. } if *generation == id.generation => {}
            _ => return None,
        }

        let vacant = Entry::Vacant {
            generation: id.generation.wrapping_add(1),
            next_free: self.free_head,
        };
        let Entry::Occupied { value, .. } = std::mem::replace(entry, vacant) else {
            unreachable!("entry checked as occupied above");
        };
        self.free_head = Some(id.slot);
        self.len -= 1;
        Some(value)
    }

    /// Drop every entry and release the slot storage.
    pub fn clear(&mut self) {
        self.entries = Vec::new();
        self.free_head = None;
        self.len = 0;
    }
}
