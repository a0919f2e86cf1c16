//! # UFS Core
//!
//! An in-memory file store with POSIX-like descriptors.
//!
//! Files live in a flat namespace and store their bytes as a chain of
//! fixed-size blocks. Every descriptor returned by `open` carries its own
//! cursor, so several descriptors on one file read and write independently.
//!
//! ## Features
//!
//! - `open`/`write`/`read`/`close`/`delete` over named files
//! - Lowest-free-slot descriptor reuse
//! - Deferred deletion: storage outlives `delete` until the last close
//! - Enforced, configurable maximum file size
//! - Truncate/extend, stat and BLAKE3 content digests
//!
//! ## Example
//!
//! ```
//! use ufs_core::{Engine, OpenFlags};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut engine = Engine::new();
//!
//! let fd = engine.open("notes", OpenFlags::CREATE)?;
//! engine.write(fd, b"hello")?;
//! engine.close(fd)?;
//!
//! let fd = engine.open("notes", OpenFlags::empty())?;
//! assert_eq!(engine.read_vec(fd, 16)?, b"hello");
//!
//! engine.delete("notes")?;
//! engine.close(fd)?;
//! # Ok(())
//! # }
//! ```

mod arena;
mod block;
mod config;
mod descriptor;
mod digest;
mod engine;
mod error;
mod file;
mod file_table;

pub use config::{Config, DEFAULT_BLOCK_SIZE, DEFAULT_MAX_FILE_SIZE};
pub use descriptor::Fd;
pub use digest::Digest;
pub use engine::{Engine, OpenFlags};
pub use error::{Error, ErrorKind, Result};
pub use file::FileStat;
