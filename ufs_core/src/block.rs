//! Fixed-capacity data blocks.

use crate::arena::ArenaId;
use crate::error::Result;

/// Id of a block in the engine's block arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub(crate) ArenaId);

/// One segment of a file's byte stream.
///
/// `data.len()` is the occupied length; the buffer is reserved up front for
/// the full capacity so appends within a block never reallocate.
#[derive(Debug)]
pub struct Block {
    data: Vec<u8>,
    capacity: usize,
    pub(crate) prev: Option<BlockId>,
    pub(crate) next: Option<BlockId>,
}

impl Block {
    /// Allocate an empty block, reporting allocation failure as `OutOfMemory`.
    pub fn new(capacity: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)?;
        Ok(Self {
            data,
            capacity,
            prev: None,
            next: None,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid bytes.
    pub fn occupied(&self) -> usize {
        self.data.len()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() == self.capacity
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn next(&self) -> Option<BlockId> {
        self.next
    }

    /// Copy `src` into the block at `offset`, overwriting valid bytes and
    /// extending the occupied length past them. Stops at capacity.
    ///
    /// `offset` must not exceed the occupied length. Returns the number of
    /// bytes copied.
    pub fn write_at(&mut self, offset: usize, src: &[u8]) -> usize {
        debug_assert!(offset <= self.data.len());
        let n = src.len().min(self.capacity - offset);
        let overlap = n.min(self.data.len() - offset);

        self.data[offset..offset + overlap].copy_from_slice(&src[..overlap]);
        self.data.extend_from_slice(&src[overlap..n]);
        n
    }

    /// Copy valid bytes starting at `offset` into `dst`. Returns the number
    /// of bytes copied.
    pub fn read_at(&self, offset: usize, dst: &mut [u8]) -> usize {
        if offset >= self.data.len() {
            return 0;
        }
        let n = dst.len().min(self.data.len() - offset);
        dst[..n].copy_from_slice(&self.data[offset..offset + n]);
        n
    }

    /// Shrink the occupied length to `len`.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Append `len` zero bytes, bounded by the remaining capacity.
    pub fn zero_fill(&mut self, len: usize) -> usize {
        let n = len.min(self.capacity - self.data.len());
        self.data.resize(self.data.len() + n, 0);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_block_is_empty() {
        let block = Block::new(8).unwrap();
        assert_eq!(block.capacity(), 8);
        assert_eq!(block.occupied(), 0);
        assert!(!block.is_full());
        assert!(block.next().is_none());
        assert!(block.prev.is_none());
    }

    #[test]
    fn test_write_stops_at_capacity() {
        let mut block = Block::new(4).unwrap();
        let n = block.write_at(0, b"abcdef");
        assert_eq!(n, 4);
        assert_eq!(block.bytes(), b"abcd");
        assert!(block.is_full());
    }

    #[test]
    fn test_write_overwrites_then_extends() {
        let mut block = Block::new(8).unwrap();
        block.write_at(0, b"abcd");

        let n = block.write_at(2, b"XYZW");
        assert_eq!(n, 4);
        assert_eq!(block.bytes(), b"abXYZW");
    }

    #[test]
    fn test_overwrite_inside_keeps_high_water_mark() {
        let mut block = Block::new(8).unwrap();
        block.write_at(0, b"abcdef");

        block.write_at(1, b"X");
        assert_eq!(block.bytes(), b"aXcdef");
        assert_eq!(block.occupied(), 6);
    }

    #[test]
    fn test_read_at() {
        let mut block = Block::new(8).unwrap();
        block.write_at(0, b"hello");

        let mut buf = [0u8; 10];
        assert_eq!(block.read_at(1, &mut buf), 4);
        assert_eq!(&buf[..4], b"ello");
        assert_eq!(block.read_at(5, &mut buf), 0);
    }

    #[test]
    fn test_truncate_and_zero_fill() {
        let mut block = Block::new(6).unwrap();
        block.write_at(0, b"abcd");
        block.truncate(2);
        assert_eq!(block.bytes(), b"ab");

        assert_eq!(block.zero_fill(10), 4);
        assert_eq!(block.bytes(), b"ab\0\0\0\0");
    }

    #[test]
    fn test_huge_block_reports_out_of_memory() {
        assert!(Block::new(usize::MAX).is_err());
    }
}
