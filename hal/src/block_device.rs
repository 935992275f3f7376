//! Block device abstraction for the backing store
//!
//! Provides a minimal sector API for reading and writing fixed-size blocks.
//! The kernel uses one block per swapped-out virtual page, so the block
//! size of the backing store must equal the page size.

use thiserror::Error;

#[cfg(feature = "alloc")]
extern crate alloc;

/// Default block size (one 128-byte disk sector)
pub const BLOCK_SIZE: usize = 128;

/// Block device errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BlockError {
    /// Block index out of bounds
    #[error("block index out of bounds")]
    OutOfBounds,
    /// I/O error (hardware failure, timeout, etc.)
    #[error("I/O error")]
    IoError,
    /// Device not ready
    #[error("device not ready")]
    NotReady,
    /// Buffer does not match the block size
    #[error("invalid block size")]
    InvalidSize,
}

/// Block device trait
///
/// Implementers provide block-level read/write operations.
/// All operations work with fixed-size blocks of `block_size()` bytes.
pub trait BlockDevice {
    /// Get the total number of blocks on this device
    fn block_count(&self) -> u64;

    /// Get the block size
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    /// Read a block into the provided buffer
    ///
    /// # Errors
    /// Returns `BlockError::OutOfBounds` if block_idx >= block_count()
    /// Returns `BlockError::InvalidSize` if buffer is smaller than a block
    fn read_block(&mut self, block_idx: u64, buffer: &mut [u8]) -> Result<(), BlockError>;

    /// Write a block from the provided buffer
    ///
    /// # Errors
    /// Returns `BlockError::OutOfBounds` if block_idx >= block_count()
    /// Returns `BlockError::InvalidSize` if buffer is smaller than a block
    fn write_block(&mut self, block_idx: u64, buffer: &[u8]) -> Result<(), BlockError>;

    /// Flush any pending writes to persistent storage
    fn flush(&mut self) -> Result<(), BlockError> {
        Ok(())
    }
}

/// RAM disk - an in-memory block device
///
/// Serves as the simulated swap area. Tracks how many writes each block
/// has received so tests can observe which slots a load touched.
#[cfg(feature = "alloc")]
pub struct RamDisk {
    block_size: usize,
    blocks: alloc::vec::Vec<alloc::vec::Vec<u8>>,
    writes: alloc::vec::Vec<u32>,
}

#[cfg(feature = "alloc")]
impl RamDisk {
    /// Create a new RAM disk with the default block size
    pub fn new(block_count: usize) -> Self {
        Self::with_block_size(block_count, BLOCK_SIZE)
    }

    /// Create a new RAM disk with an explicit block size
    pub fn with_block_size(block_count: usize, block_size: usize) -> Self {
        Self {
            block_size,
            blocks: (0..block_count)
                .map(|_| alloc::vec![0u8; block_size])
                .collect(),
            writes: alloc::vec![0; block_count],
        }
    }

    /// Returns the raw contents of a block
    pub fn block(&self, block_idx: usize) -> Option<&[u8]> {
        self.blocks.get(block_idx).map(|b| b.as_slice())
    }

    /// Returns how many times a block has been written
    pub fn write_count(&self, block_idx: usize) -> u32 {
        self.writes.get(block_idx).copied().unwrap_or(0)
    }
}

#[cfg(feature = "alloc")]
impl BlockDevice for RamDisk {
    fn block_count(&self) -> u64 {
        self.blocks.len() as u64
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&mut self, block_idx: u64, buffer: &mut [u8]) -> Result<(), BlockError> {
        if block_idx >= self.block_count() {
            return Err(BlockError::OutOfBounds);
        }
        if buffer.len() < self.block_size {
            return Err(BlockError::InvalidSize);
        }

        let block = &self.blocks[block_idx as usize];
        buffer[..self.block_size].copy_from_slice(block);
        Ok(())
    }

    fn write_block(&mut self, block_idx: u64, buffer: &[u8]) -> Result<(), BlockError> {
        if block_idx >= self.block_count() {
            return Err(BlockError::OutOfBounds);
        }
        if buffer.len() < self.block_size {
            return Err(BlockError::InvalidSize);
        }

        let block_size = self.block_size;
        let block = &mut self.blocks[block_idx as usize];
        block.copy_from_slice(&buffer[..block_size]);
        self.writes[block_idx as usize] += 1;
        Ok(())
    }
}
