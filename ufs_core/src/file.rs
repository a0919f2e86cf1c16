//! Files and their block chains.

use crate::arena::{Arena, ArenaId};
use crate::block::{Block, BlockId};
use crate::descriptor::Cursor;
use crate::error::{Error, Result};
use serde::Serialize;

/// Id of a file in the file table's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub(crate) ArenaId);

/// A named byte stream stored as a chain of blocks.
#[derive(Debug)]
pub struct File {
    name: String,
    head: Option<BlockId>,
    tail: Option<BlockId>,
    /// Open descriptors bound to this file.
    pub(crate) refs: usize,
    /// Set by `delete` while descriptors are still open.
    pub(crate) deleted: bool,
    size: u64,
    blocks: usize,
}

/// Snapshot of a file's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStat {
    pub name: String,
    pub size: u64,
    pub blocks: usize,
    pub refs: usize,
    pub deleted: bool,
}

impl File {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            head: None,
            tail: None,
            refs: 0,
            deleted: false,
            size: 0,
            blocks: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn head(&self) -> Option<BlockId> {
        self.head
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn block_count(&self) -> usize {
        self.blocks
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn stat(&self) -> FileStat {
        FileStat {
            name: self.name.clone(),
            size: self.size,
            blocks: self.blocks,
            refs: self.refs,
            deleted: self.deleted,
        }
    }

    /// Record bytes appended past the previous end of the stream.
    pub(crate) fn grew(&mut self, bytes: usize) {
        self.size += bytes as u64;
    }

    /// Walk the chain from head to tail.
    pub fn chain<'a>(&self, blocks: &'a Arena<Block>) -> impl Iterator<Item = (BlockId, &'a Block)> {
        std::iter::successors(
            self.head
                .and_then(|id| blocks.get(id.0).map(|block| (id, block))),
            move |(_, block)| {
                block
                    .next
                    .and_then(|id| blocks.get(id.0).map(|next| (id, next)))
            },
        )
    }

    /// Allocate a new empty block and link it as the tail.
    ///
    /// On failure the chain is untouched.
    pub(crate) fn append_block(
        &mut self,
        blocks: &mut Arena<Block>,
        capacity: usize,
    ) -> Result<BlockId> {
        let mut block = Block::new(capacity)?;
        block.prev = self.tail;
        let id = BlockId(blocks.insert(block)?);

        match self.tail {
            Some(tail) => {
                let tail = blocks
                    .get_mut(tail.0)
                    .ok_or_else(|| Error::stale_handle(format!("tail of {}", self.name)))?;
                tail.next = Some(id);
            }
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.blocks += 1;

        tracing::trace!(file = %self.name, blocks = self.blocks, "appended block");
        Ok(id)
    }

    /// Free every block in the chain. Returns the number of blocks released.
    pub(crate) fn release_blocks(&mut self, blocks: &mut Arena<Block>) -> usize {
        let mut released = 0;
        let mut cursor = self.head;
        while let Some(id) = cursor {
            cursor = match blocks.remove(id.0) {
                Some(block) => block.next,
                None => None,
            };
            released += 1;
        }

        self.head = None;
        self.tail = None;
        self.size = 0;
        self.blocks = 0;
        released
    }

    /// Cursor addressing byte `pos` of the stream, clamped to the end.
    pub fn locate(&self, blocks: &Arena<Block>, pos: u64) -> Cursor {
        let mut start = 0u64;
        let mut last = Cursor::unset();
        for (id, block) in self.chain(blocks) {
            let end = start + block.occupied() as u64;
            if pos <= end {
                return Cursor::at(id, (pos - start) as usize);
            }
            last = Cursor::at(id, block.occupied());
            start = end;
        }
        last
    }

    /// Absolute stream position of `cursor`, or `None` if its block is not
    /// part of this chain.
    pub fn position(&self, blocks: &Arena<Block>, cursor: &Cursor) -> Option<u64> {
        let target = match cursor.block {
            Some(id) => id,
            None => return Some(0),
        };
        let mut start = 0u64;
        for (id, block) in self.chain(blocks) {
            if id == target {
                return Some(start + cursor.offset as u64);
            }
            start += block.occupied() as u64;
        }
        None
    }

    /// Cut the stream down to `new_size` bytes, freeing trailing blocks.
    pub(crate) fn truncate(&mut self, blocks: &mut Arena<Block>, new_size: u64) -> Result<()> {
        if new_size >= self.size {
            return Ok(());
        }
        if new_size == 0 {
            self.release_blocks(blocks);
            return Ok(());
        }

        let keep = self.locate(blocks, new_size);
        let last = keep
            .block
            .ok_or_else(|| Error::stale_handle(format!("truncation point of {}", self.name)))?;

        let block = blocks
            .get_mut(last.0)
            .ok_or_else(|| Error::stale_handle(format!("block of {}", self.name)))?;
        block.truncate(keep.offset);
        let mut doomed = block.next.take();

        while let Some(id) = doomed {
            doomed = blocks.remove(id.0).and_then(|block| block.next);
            self.blocks -= 1;
        }

        self.tail = Some(last);
        self.size = new_size;
        Ok(())
    }

    /// Append `len` zero bytes, filling the tail before adding blocks.
    ///
    /// On allocation failure the bytes added so far are kept.
    pub(crate) fn extend_zeroed(
        &mut self,
        blocks: &mut Arena<Block>,
        capacity: usize,
        len: u64,
    ) -> Result<()> {
        let mut remaining = len;
        while remaining > 0 {
            let tail = match self.tail {
                Some(id) if blocks.get(id.0).is_some_and(|b| !b.is_full()) => id,
                _ => self.append_block(blocks, capacity)?,
            };
            let block = blocks
                .get_mut(tail.0)
                .ok_or_else(|| Error::stale_handle(format!("tail of {}", self.name)))?;
            let want = usize::try_from(remaining).unwrap_or(usize::MAX);
            let n = block.zero_fill(want);
            self.grew(n);
            remaining -= n as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(capacity: usize, data: &[u8]) -> (File, Arena<Block>) {
        let mut blocks = Arena::new();
        let mut file = File::new("f");
        for chunk in data.chunks(capacity) {
            let id = file.append_block(&mut blocks, capacity).unwrap();
            let n = blocks.get_mut(id.0).unwrap().write_at(0, chunk);
            file.grew(n);
        }
        (file, blocks)
    }

    fn contents(file: &File, blocks: &Arena<Block>) -> Vec<u8> {
        file.chain(blocks)
            .flat_map(|(_, block)| block.bytes().to_vec())
            .collect()
    }

    #[test]
    fn test_new_file_is_empty() {
        let file = File::new("a");
        assert_eq!(file.name(), "a");
        assert_eq!(file.size(), 0);
        assert_eq!(file.block_count(), 0);
        assert!(file.head().is_none());
        assert!(file.tail.is_none());
    }

    #[test]
    fn test_append_links_chain() {
        let (file, blocks) = filled(4, b"abcdefghij");
        assert_eq!(file.block_count(), 3);
        assert_eq!(file.size(), 10);

        let ids: Vec<BlockId> = file.chain(&blocks).map(|(id, _)| id).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids.first().copied(), file.head());
        assert_eq!(ids.last().copied(), file.tail);
        assert_eq!(blocks.get(ids[1].0).unwrap().prev, Some(ids[0]));
        assert_eq!(contents(&file, &blocks), b"abcdefghij");
    }

    #[test]
    fn test_release_blocks() {
        let (mut file, mut blocks) = filled(4, b"abcdefghij");
        assert_eq!(file.release_blocks(&mut blocks), 3);
        assert_eq!(blocks.len(), 0);
        assert_eq!(file.size(), 0);
        assert!(file.head().is_none());
    }

    #[test]
    fn test_locate_and_position() {
        let (file, blocks) = filled(4, b"abcdefghij");

        let cursor = file.locate(&blocks, 5);
        assert_eq!(cursor.offset, 1);
        assert_eq!(file.position(&blocks, &cursor), Some(5));

        // Positions past the end clamp to the tail.
        let end = file.locate(&blocks, 100);
        assert_eq!(end.block, file.tail);
        assert_eq!(file.position(&blocks, &end), Some(10));

        assert_eq!(file.position(&blocks, &Cursor::unset()), Some(0));
    }

    #[test]
    fn test_truncate_frees_trailing_blocks() {
        let (mut file, mut blocks) = filled(4, b"abcdefghij");
        file.truncate(&mut blocks, 5).unwrap();

        assert_eq!(file.size(), 5);
        assert_eq!(file.block_count(), 2);
        assert_eq!(blocks.len(), 2);
        assert_eq!(contents(&file, &blocks), b"abcde");
        let tail = blocks.get(file.tail.unwrap().0).unwrap();
        assert!(tail.next().is_none());
    }

    #[test]
    fn test_truncate_on_block_boundary() {
        let (mut file, mut blocks) = filled(4, b"abcdefghij");
        file.truncate(&mut blocks, 8).unwrap();

        assert_eq!(file.block_count(), 2);
        assert_eq!(contents(&file, &blocks), b"abcdefgh");
    }

    #[test]
    fn test_truncate_to_zero() {
        let (mut file, mut blocks) = filled(4, b"abcdefghij");
        file.truncate(&mut blocks, 0).unwrap();
        assert_eq!(file.block_count(), 0);
        assert_eq!(blocks.len(), 0);
    }

    #[test]
    fn test_extend_zeroed() {
        let (mut file, mut blocks) = filled(4, b"abc");
        file.extend_zeroed(&mut blocks, 4, 6).unwrap();

        assert_eq!(file.size(), 9);
        assert_eq!(file.block_count(), 3);
        assert_eq!(contents(&file, &blocks), b"abc\0\0\0\0\0\0");
    }

    #[test]
    fn test_stat() {
        let (mut file, _blocks) = filled(4, b"abcdef");
        file.refs = 2;
        let stat = file.stat();
        assert_eq!(
            stat,
            FileStat {
                name: "f".to_string(),
                size: 6,
                blocks: 2,
                refs: 2,
                deleted: false,
            }
        );
    }
}
