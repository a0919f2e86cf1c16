//! Name index and storage for all files.

use crate::arena::Arena;
use crate::block::Block;
use crate::error::{Error, Result};
use crate::file::{File, FileId};
use std::collections::HashMap;

/// All files held by an engine.
///
/// A file stays in `files` until it is reclaimed, but it is only reachable by
/// name while it is in `names`. `unlink` drops the name first so a deleted
/// file can linger for its open descriptors without blocking a new file of
/// the same name.
#[derive(Debug, Default)]
pub struct FileTable {
    files: Arena<File>,
    names: HashMap<String, FileId>,
}

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files in storage, linked or not.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn lookup(&self, name: &str) -> Option<FileId> {
        self.names.get(name).copied()
    }

    /// Insert a new empty file under `name`.
    ///
    /// The caller checks that `name` is free. On failure nothing is inserted.
    pub fn create(&mut self, name: &str) -> Result<FileId> {
        self.names.try_reserve(1)?;
        let id = FileId(self.files.insert(File::new(name))?);
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn get(&self, id: FileId) -> Result<&File> {
        self.files
            .get(id.0)
            .ok_or_else(|| Error::stale_handle(format!("file slot {}", id.0.slot())))
    }

    pub fn get_mut(&mut self, id: FileId) -> Result<&mut File> {
        self.files
            .get_mut(id.0)
            .ok_or_else(|| Error::stale_handle(format!("file slot {}", id.0.slot())))
    }

    /// Detach `name` from the index, leaving the file in storage.
    pub fn unlink(&mut self, name: &str) -> Result<FileId> {
        self.names
            .remove(name)
            .ok_or_else(|| Error::no_such_file(name))
    }

    /// Free a file and all its blocks.
    pub fn reclaim(&mut self, id: FileId, blocks: &mut Arena<Block>) -> Option<File> {
        let mut file = self.files.remove(id.0)?;
        if self.names.get(file.name()) == Some(&id) {
            self.names.remove(file.name());
        }
        let released = file.release_blocks(blocks);
        tracing::debug!(file = %file.name(), blocks = released, "reclaimed file");
        Some(file)
    }

    /// Names of files reachable by name, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop every file and its blocks.
    pub fn clear(&mut self, blocks: &mut Arena<Block>) {
        self.names.clear();
        self.files.clear();
        blocks.clear();
    }
}
