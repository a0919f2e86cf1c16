//! Engine configuration.

use crate::error::{Error, Result};

/// Default block capacity in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Default maximum file size: 100 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Tunables for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Capacity of every block in bytes.
    pub block_size: usize,
    /// Upper bound on a file's size. `None` disables the check.
    pub max_file_size: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            max_file_size: Some(DEFAULT_MAX_FILE_SIZE),
        }
    }
}

impl Config {
    /// Set the block capacity.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set (or with `None`, lift) the maximum file size.
    pub fn with_max_file_size(mut self, max_file_size: Option<u64>) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Check that the settings describe a usable engine.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::invalid_config("block size must be non-zero"));
        }
        if u32::try_from(self.block_size).is_err() {
            return Err(Error::invalid_config(format!(
                "block size {} exceeds {} bytes",
                self.block_size,
                u32::MAX
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.block_size, 512);
        assert_eq!(config.max_file_size, Some(100 * 1024 * 1024));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = Config::default()
            .with_block_size(16)
            .with_max_file_size(None);
        assert_eq!(config.block_size, 16);
        assert_eq!(config.max_file_size, None);
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let config = Config::default().with_block_size(0);
        assert!(config.validate().is_err());
    }
}
