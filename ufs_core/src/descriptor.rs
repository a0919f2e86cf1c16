//! File descriptors and the slot table that hands them out.

use crate::block::BlockId;
use crate::error::{Error, Result};
use crate::file::FileId;
use std::collections::BTreeSet;
use std::fmt;

/// Handle returned by `open`: an index into the descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fd(pub usize);

impl Fd {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of the next byte a descriptor reads or writes.
///
/// `block` is a lookup key into the block arena, never an owner. `None` means
/// the cursor has not touched the chain yet and sits at the start of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub block: Option<BlockId>,
    pub offset: usize,
}

impl Cursor {
    pub fn unset() -> Self {
        Self::default()
    }

    pub fn at(block: BlockId, offset: usize) -> Self {
        Self {
            block: Some(block),
            offset,
        }
    }

    pub fn is_unset(&self) -> bool {
        self.block.is_none()
    }
}

/// An open handle on a file with its own cursor.
#[derive(Debug)]
pub struct Descriptor {
    pub(crate) file: FileId,
    pub(crate) cursor: Cursor,
}

impl Descriptor {
    pub fn new(file: FileId) -> Self {
        Self {
            file,
            cursor: Cursor::unset(),
        }
    }

    pub fn file(&self) -> FileId {
        self.file
    }
}

/// Sparse slot array of descriptors.
///
/// `allocate` hands out the lowest free index; when every slot is taken the
/// table doubles its capacity (minimum 1).
#[derive(Debug, Default)]
pub struct DescriptorTable {
    slots: Vec<Option<Descriptor>>,
    free: BTreeSet<usize>,
    active: usize,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open descriptors.
    pub fn active(&self) -> usize {
        self.active
    }

    /// Bind a new descriptor to `file` and return its handle.
    pub fn allocate(&mut self, file: FileId) -> Result<Fd> {
        if self.free.is_empty() {
            self.grow()?;
        }
        let index = self
            .free
            .pop_first()
            .ok_or_else(|| Error::out_of_memory("descriptor table has no free slot"))?;

        self.slots[index] = Some(Descriptor::new(file));
        self.active += 1;
        Ok(Fd(index))
    }

    fn grow(&mut self) -> Result<()> {
        let old = self.slots.len();
        let new = if old == 0 { 1 } else { old * 2 };
        self.slots.try_reserve_exact(new - old)?;
        self.slots.resize_with(new, || None);
        self.free.extend(old..new);
        tracing::trace!(capacity = new, "grew descriptor table");
        Ok(())
    }

    pub fn get(&self, fd: Fd) -> Result<&Descriptor> {
        self.slots
            .get(fd.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::bad_descriptor(fd.0))
    }

    pub fn get_mut(&mut self, fd: Fd) -> Result<&mut Descriptor> {
        self.slots
            .get_mut(fd.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::bad_descriptor(fd.0))
    }

    /// Free the slot for `fd`, returning the descriptor that occupied it.
    pub fn release(&mut self, fd: Fd) -> Result<Descriptor> {
        let descriptor = self
            .slots
            .get_mut(fd.0)
            .and_then(Option::take)
            .ok_or_else(|| Error::bad_descriptor(fd.0))?;
        self.free.insert(fd.0);
        self.active -= 1;
        Ok(descriptor)
    }

    /// Descriptors bound to `file`.
    pub fn bound_to(&mut self, file: FileId) -> impl Iterator<Item = &mut Descriptor> {
        self.slots
            .iter_mut()
            .flatten()
            .filter(move |descriptor| descriptor.file == file)
    }

    /// Drop every descriptor and release the slot storage.
    pub fn clear(&mut self) {
        self.slots = Vec::new();
        self.free.clear();
        self.active = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;

    fn file_ids(n: usize) -> Vec<FileId> {
        let mut arena = Arena::new();
        (0..n).map(|i| FileId(arena.insert(i).unwrap())).collect()
    }

    #[test]
    fn test_allocate_sequential() {
        let files = file_ids(1);
        let mut table = DescriptorTable::new();

        assert_eq!(table.allocate(files[0]).unwrap(), Fd(0));
        assert_eq!(table.allocate(files[0]).unwrap(), Fd(1));
        assert_eq!(table.allocate(files[0]).unwrap(), Fd(2));
        assert_eq!(table.active(), 3);
    }

    #[test]
    fn test_capacity_doubles() {
        let files = file_ids(1);
        let mut table = DescriptorTable::new();
        assert_eq!(table.slots.len(), 0);

        table.allocate(files[0]).unwrap();
        assert_eq!(table.slots.len(), 1);
        table.allocate(files[0]).unwrap();
        assert_eq!(table.slots.len(), 2);
        table.allocate(files[0]).unwrap();
        assert_eq!(table.slots.len(), 4);
        table.allocate(files[0]).unwrap();
        assert_eq!(table.slots.len(), 4);
        table.allocate(files[0]).unwrap();
        assert_eq!(table.slots.len(), 8);
    }

    #[test]
    fn test_lowest_free_slot_reused() {
        let files = file_ids(1);
        let mut table = DescriptorTable::new();
        for _ in 0..4 {
            table.allocate(files[0]).unwrap();
        }

        table.release(Fd(2)).unwrap();
        table.release(Fd(1)).unwrap();

        assert_eq!(table.allocate(files[0]).unwrap(), Fd(1));
        assert_eq!(table.allocate(files[0]).unwrap(), Fd(2));
        assert_eq!(table.allocate(files[0]).unwrap(), Fd(4));
    }

    #[test]
    fn test_release_twice_fails() {
        let files = file_ids(1);
        let mut table = DescriptorTable::new();
        let fd = table.allocate(files[0]).unwrap();

        assert!(table.release(fd).is_ok());
        assert_eq!(table.release(fd).unwrap_err(), Error::bad_descriptor(0));
        assert_eq!(table.active(), 0);
    }

    #[test]
    fn test_out_of_range() {
        let mut table = DescriptorTable::new();
        assert!(table.get(Fd(5)).is_err());
        assert!(table.get_mut(Fd(5)).is_err());
        assert!(table.release(Fd(5)).is_err());
    }

    #[test]
    fn test_new_descriptor_cursor_unset() {
        let files = file_ids(1);
        let mut table = DescriptorTable::new();
        let fd = table.allocate(files[0]).unwrap();

        let descriptor = table.get(fd).unwrap();
        assert_eq!(descriptor.file(), files[0]);
        assert!(descriptor.cursor.is_unset());
    }

    #[test]
    fn test_bound_to() {
        let files = file_ids(2);
        let mut table = DescriptorTable::new();
        table.allocate(files[0]).unwrap();
        table.allocate(files[1]).unwrap();
        table.allocate(files[0]).unwrap();

        assert_eq!(table.bound_to(files[0]).count(), 2);
        assert_eq!(table.bound_to(files[1]).count(), 1);
    }
}
