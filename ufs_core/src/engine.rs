//! The public file API: open, write, read, close, delete.

use crate::arena::Arena;
use crate::block::Block;
use crate::config::Config;
use crate::descriptor::{Cursor, DescriptorTable, Fd};
use crate::digest::Digest;
use crate::error::{Error, ErrorKind, Result};
use crate::file::{File, FileStat};
use crate::file_table::FileTable;
use tracing::debug;

bitflags::bitflags! {
    /// Flags accepted by [`Engine::open`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OpenFlags: u32 {
        /// Create the file if no file of that name exists.
        const CREATE = 1;
    }
}

/// An in-memory file store.
///
/// Every operation returns an explicit `Result` and also records its outcome,
/// readable through [`Engine::last_error`] until the next call.
#[derive(Debug)]
pub struct Engine {
    config: Config,
    blocks: Arena<Block>,
    files: FileTable,
    fds: DescriptorTable,
    last_error: ErrorKind,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an engine with the default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            blocks: Arena::new(),
            files: FileTable::new(),
            fds: DescriptorTable::new(),
            last_error: ErrorKind::NoError,
        }
    }

    /// Create an engine with a validated custom configuration.
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Outcome of the most recent operation.
    pub fn last_error(&self) -> ErrorKind {
        self.last_error
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        self.last_error = match &result {
            Ok(_) => ErrorKind::NoError,
            Err(err) => err.kind(),
        };
        result
    }

    /// Open `name`, creating it when `flags` contains `CREATE`.
    ///
    /// The returned descriptor starts at the beginning of the file.
    pub fn open(&mut self, name: &str, flags: OpenFlags) -> Result<Fd> {
        let result = self.open_inner(name, flags);
        self.record(result)
    }

    fn open_inner(&mut self, name: &str, flags: OpenFlags) -> Result<Fd> {
        let (id, created) = match self.files.lookup(name) {
            Some(id) => (id, false),
            None if flags.contains(OpenFlags::CREATE) => (self.files.create(name)?, true),
            None => return Err(Error::no_such_file(name)),
        };

        let fd = match self.fds.allocate(id) {
            Ok(fd) => fd,
            Err(err) => {
                if created {
                    self.files.reclaim(id, &mut self.blocks);
                }
                return Err(err);
            }
        };

        let file = self.files.get_mut(id)?;
        file.refs += 1;
        debug!(file = name, %fd, created, refs = file.refs, "opened file");
        Ok(fd)
    }

    /// Write `data` at the descriptor's cursor and advance it.
    ///
    /// If a failure stops the write after some bytes went in, the count
    /// written so far is returned and the failure is only reported through
    /// [`Engine::last_error`].
    pub fn write(&mut self, fd: Fd, data: &[u8]) -> Result<usize> {
        let mut written = 0;
        let outcome = self.write_chain(fd, data, &mut written);

        match outcome {
            Ok(()) => self.record(Ok(written)),
            Err(err) if written > 0 => {
                debug!(%fd, written, error = %err, "short write");
                self.last_error = err.kind();
                Ok(written)
            }
            Err(err) => self.record(Err(err)),
        }
    }

    fn write_chain(&mut self, fd: Fd, data: &[u8], written: &mut usize) -> Result<()> {
        let block_size = self.config.block_size;
        let limit = self.config.max_file_size;

        let descriptor = self.fds.get_mut(fd)?;
        let file = self.files.get_mut(descriptor.file)?;
        let blocks = &mut self.blocks;

        if data.is_empty() {
            return Ok(());
        }

        let at_limit = |file: &File| limit.is_some_and(|limit| file.size() >= limit);
        let too_large = |file: &File| Error::file_too_large(file.name(), limit.unwrap_or(0));

        if descriptor.cursor.is_unset() {
            let head = match file.head() {
                Some(head) => head,
                None if at_limit(file) => return Err(too_large(file)),
                None => file.append_block(blocks, block_size)?,
            };
            descriptor.cursor = Cursor::at(head, 0);
        }

        while *written < data.len() {
            let id = descriptor
                .cursor
                .block
                .ok_or_else(|| Error::stale_handle(format!("cursor of fd {}", fd)))?;
            let offset = descriptor.cursor.offset;
            let block = blocks
                .get(id.0)
                .ok_or_else(|| Error::stale_handle(format!("cursor block of fd {}", fd)))?;

            if offset == block.capacity() {
                let next = match block.next() {
                    Some(next) => next,
                    None if at_limit(file) => return Err(too_large(file)),
                    None => file.append_block(blocks, block_size)?,
                };
                descriptor.cursor = Cursor::at(next, 0);
                continue;
            }

            let remaining = &data[*written..];
            let chunk = remaining.len().min(block.capacity() - offset);
            let overlap = chunk.min(block.occupied() - offset);
            let mut take = chunk;
            if let Some(limit) = limit {
                let room = limit.saturating_sub(file.size());
                if ((chunk - overlap) as u64) > room {
                    take = overlap + room as usize;
                }
            }
            if take == 0 {
                return Err(too_large(file));
            }

            let block = blocks
                .get_mut(id.0)
                .ok_or_else(|| Error::stale_handle(format!("cursor block of fd {}", fd)))?;
            let before = block.occupied();
            let n = block.write_at(offset, &remaining[..take]);
            file.grew(block.occupied() - before);
            descriptor.cursor.offset += n;
            *written += n;

            if take < chunk {
                return Err(too_large(file));
            }
        }

        Ok(())
    }

    /// Read up to `buf.len()` bytes from the descriptor's cursor and advance
    /// it. Returns 0 at end of file.
    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        let result = self.read_inner(fd, buf);
        self.record(result)
    }

    /// Read up to `max` bytes into a new vector.
    pub fn read_vec(&mut self, fd: Fd, max: usize) -> Result<Vec<u8>> {
        let result = self.read_vec_inner(fd, max);
        self.record(result)
    }

    fn read_vec_inner(&mut self, fd: Fd, max: usize) -> Result<Vec<u8>> {
        let size = {
            let descriptor = self.fds.get(fd)?;
            self.files.get(descriptor.file)?.size()
        };
        let len = usize::try_from(size).map_or(max, |size| size.min(max));

        let mut buf = Vec::new();
        buf.try_reserve_exact(len)?;
        buf.resize(len, 0);
        let n = self.read_inner(fd, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn read_inner(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        let descriptor = self.fds.get_mut(fd)?;
        let file = self.files.get(descriptor.file)?;

        if descriptor.cursor.is_unset() {
            match file.head() {
                Some(head) => descriptor.cursor = Cursor::at(head, 0),
                None => return Ok(0),
            }
        }

        let mut read = 0;
        while read < buf.len() {
            let id = descriptor
                .cursor
                .block
                .ok_or_else(|| Error::stale_handle(format!("cursor of fd {}", fd)))?;
            let block = self
                .blocks
                .get(id.0)
                .ok_or_else(|| Error::stale_handle(format!("cursor block of fd {}", fd)))?;

            if descriptor.cursor.offset >= block.occupied() {
                match block.next() {
                    Some(next) => {
                        descriptor.cursor = Cursor::at(next, 0);
                        continue;
                    }
                    None => break,
                }
            }

            let n = block.read_at(descriptor.cursor.offset, &mut buf[read..]);
            descriptor.cursor.offset += n;
            read += n;
        }

        Ok(read)
    }

    /// Close a descriptor. Reclaims the file if it was deleted and this was
    /// its last descriptor.
    pub fn close(&mut self, fd: Fd) -> Result<()> {
        let result = self.close_inner(fd);
        self.record(result)
    }

    fn close_inner(&mut self, fd: Fd) -> Result<()> {
        let descriptor = self.fds.release(fd)?;
        let id = descriptor.file();
        let file = self.files.get_mut(id)?;
        file.refs = file.refs.saturating_sub(1);

        if file.refs == 0 && file.is_deleted() {
            self.files.reclaim(id, &mut self.blocks);
        }
        Ok(())
    }

    /// Remove `name` from the namespace.
    ///
    /// Storage is freed now if no descriptor is open on the file, otherwise
    /// when the last one closes.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let result = self.delete_inner(name);
        self.record(result)
    }

    fn delete_inner(&mut self, name: &str) -> Result<()> {
        let id = self.files.unlink(name)?;
        let file = self.files.get_mut(id)?;

        if file.refs > 0 {
            file.deleted = true;
            debug!(file = name, refs = file.refs, "deferred delete");
        } else {
            self.files.reclaim(id, &mut self.blocks);
        }
        Ok(())
    }

    /// Set the size of the descriptor's file, truncating or zero-extending.
    ///
    /// Cursors left past the new end are moved back to it.
    pub fn resize(&mut self, fd: Fd, new_size: u64) -> Result<()> {
        let result = self.resize_inner(fd, new_size);
        self.record(result)
    }

    fn resize_inner(&mut self, fd: Fd, new_size: u64) -> Result<()> {
        let id = self.fds.get(fd)?.file();
        let file = self.files.get_mut(id)?;

        if let Some(limit) = self.config.max_file_size
            && new_size > limit
        {
            return Err(Error::file_too_large(file.name(), limit));
        }

        if new_size >= file.size() {
            let grow = new_size - file.size();
            return file.extend_zeroed(&mut self.blocks, self.config.block_size, grow);
        }

        let positions: Vec<Option<u64>> = self
            .fds
            .bound_to(id)
            .map(|descriptor| {
                if descriptor.cursor.is_unset() {
                    None
                } else {
                    Some(file.position(&self.blocks, &descriptor.cursor).unwrap_or(0))
                }
            })
            .collect();

        file.truncate(&mut self.blocks, new_size)?;

        for (descriptor, position) in self.fds.bound_to(id).zip(positions) {
            descriptor.cursor = match position {
                None => Cursor::unset(),
                Some(pos) => file.locate(&self.blocks, pos.min(new_size)),
            };
        }
        debug!(file = file.name(), new_size, "truncated file");
        Ok(())
    }

    /// Move the descriptor's cursor back to the start of its file.
    pub fn rewind(&mut self, fd: Fd) -> Result<()> {
        let result = self
            .fds
            .get_mut(fd)
            .map(|descriptor| descriptor.cursor = Cursor::unset());
        self.record(result)
    }

    /// Metadata of the file currently named `name`.
    pub fn stat(&mut self, name: &str) -> Result<FileStat> {
        let result = match self.files.lookup(name) {
            Some(id) => self.files.get(id).map(File::stat),
            None => Err(Error::no_such_file(name)),
        };
        self.record(result)
    }

    /// Metadata of the file bound to `fd`, whether or not it is still named.
    pub fn fstat(&mut self, fd: Fd) -> Result<FileStat> {
        let result = self
            .fds
            .get(fd)
            .and_then(|descriptor| self.files.get(descriptor.file()))
            .map(File::stat);
        self.record(result)
    }

    /// BLAKE3 digest of the whole file bound to `fd`. No cursor moves.
    pub fn digest(&mut self, fd: Fd) -> Result<Digest> {
        let result = self
            .fds
            .get(fd)
            .and_then(|descriptor| self.files.get(descriptor.file()))
            .map(|file| Digest::of_file(file, &self.blocks));
        self.record(result)
    }

    /// Names of all files present, sorted.
    pub fn list(&self) -> Vec<String> {
        self.files.names()
    }

    /// Number of open descriptors.
    pub fn open_count(&self) -> usize {
        self.fds.active()
    }

    /// Number of files in storage, including deleted ones still held open.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Number of blocks allocated across all files.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Release every file, block and descriptor. The engine is empty and
    /// usable afterwards.
    pub fn destroy(&mut self) {
        debug!(
            files = self.files.len(),
            blocks = self.blocks.len(),
            descriptors = self.fds.active(),
            "destroying engine"
        );
        self.fds.clear();
        self.files.clear(&mut self.blocks);
        self.last_error = ErrorKind::NoError;
    }
}
