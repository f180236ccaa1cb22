//! BlockPool - reusable slot blocks for pool-rented queue storage
//!
//! Blocks are bucketed by power-of-two length. Renting rounds the requested
//! length up to the next power of two, so a rented block may be larger than
//! asked for; callers see the extra room as extra capacity.

use crate::error::{QueueError, Result};
use crate::insights;
use crate::storage::{new_slots, Slot};
use parking_lot::Mutex;
use std::sync::Arc;

/// Default largest block length the pool hands out
const DEFAULT_MAX_BLOCK_LEN: usize = 1 << 20;
/// Default number of idle blocks kept per size class
const DEFAULT_MAX_BLOCKS_PER_CLASS: usize = 8;

/// Configuration for a [`BlockPool`]
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Largest block length (in slots) the pool will rent (power of 2)
    pub max_block_len: usize,
    /// Idle blocks retained per size class; extra returns are freed
    pub max_blocks_per_class: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_block_len: DEFAULT_MAX_BLOCK_LEN,
            max_blocks_per_class: DEFAULT_MAX_BLOCKS_PER_CLASS,
        }
    }
}

impl PoolConfig {
    pub fn new(max_block_len: usize) -> Result<Self> {
        if max_block_len == 0 {
            return Err(QueueError::config("Max block length must be greater than 0"));
        }
        if !max_block_len.is_power_of_two() {
            return Err(QueueError::config("Max block length must be power of 2"));
        }

        Ok(Self {
            max_block_len,
            ..Default::default()
        })
    }

    pub fn with_max_blocks_per_class(mut self, max_blocks: usize) -> Result<Self> {
        if max_blocks == 0 {
            return Err(QueueError::config(
                "Blocks per class must be greater than 0",
            ));
        }
        self.max_blocks_per_class = max_blocks;
        Ok(self)
    }
}

struct PoolInner<T> {
    config: PoolConfig,
    /// Free lists indexed by log2(block length)
    classes: Mutex<Vec<Vec<Box<[Slot<T>]>>>>,
}

/// Shared pool of slot blocks. Cloning yields another handle to the same pool.
pub struct BlockPool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for BlockPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> BlockPool<T> {
    pub fn new(config: PoolConfig) -> Self {
        let classes = (0..usize::BITS).map(|_| Vec::new()).collect();
        Self {
            inner: Arc::new(PoolInner {
                config,
                classes: Mutex::new(classes),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Rent a block of at least `min_len` slots.
    ///
    /// The returned length is `min_len` rounded up to a power of two.
    pub fn rent(&self, min_len: usize) -> Result<Box<[Slot<T>]>> {
        if min_len == 0 {
            return Err(QueueError::pool("Block length must be greater than 0"));
        }
        let len = match min_len.checked_next_power_of_two() {
            Some(len) if len <= self.inner.config.max_block_len => len,
            _ => {
                return Err(QueueError::pool(format!(
                    "Block length {} exceeds pool maximum {}",
                    min_len, self.inner.config.max_block_len
                )))
            }
        };

        let class = len.trailing_zeros() as usize;
        let reused = self.inner.classes.lock()[class].pop();
        insights::record_pool_rent(len, reused.is_some());

        Ok(reused.unwrap_or_else(|| new_slots(len)))
    }

    /// Return a block. Any values it held must already be dropped or moved out.
    pub fn give_back(&self, block: Box<[Slot<T>]>) {
        let len = block.len();
        if !len.is_power_of_two() || len > self.inner.config.max_block_len {
            insights::record_pool_return(len, false);
            return;
        }

        let class = len.trailing_zeros() as usize;
        let mut classes = self.inner.classes.lock();
        let free = &mut classes[class];
        let retained = free.len() < self.inner.config.max_blocks_per_class;
        if retained {
            free.push(block);
        }
        drop(classes);
        insights::record_pool_return(len, retained);
    }

    /// Number of idle blocks currently held
    pub fn retained(&self) -> usize {
        self.inner.classes.lock().iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_creation() {
        let config = PoolConfig::new(1024).unwrap();
        assert_eq!(config.max_block_len, 1024);
        assert_eq!(config.max_blocks_per_class, DEFAULT_MAX_BLOCKS_PER_CLASS);
    }

    #[test]
    fn test_pool_config_invalid() {
        assert!(PoolConfig::new(0).is_err());
        assert!(PoolConfig::new(1000).is_err());
        assert!(PoolConfig::new(1024)
            .unwrap()
            .with_max_blocks_per_class(0)
            .is_err());
    }

    #[test]
    fn test_rent_rounds_up() {
        let pool = BlockPool::<u32>::new(PoolConfig::default());
        assert_eq!(pool.rent(5).unwrap().len(), 8);
        assert_eq!(pool.rent(8).unwrap().len(), 8);
        assert_eq!(pool.rent(1).unwrap().len(), 1);
    }

    #[test]
    fn test_rent_invalid() {
        let pool = BlockPool::<u32>::new(PoolConfig::new(64).unwrap());
        assert!(pool.rent(0).is_err());
        assert!(pool.rent(65).is_err());
        assert!(pool.rent(usize::MAX).is_err());
    }

    #[test]
    fn test_block_reuse() {
        let pool = BlockPool::<u32>::new(PoolConfig::default());
        let block = pool.rent(16).unwrap();
        let ptr = block.as_ptr();
        pool.give_back(block);
        assert_eq!(pool.retained(), 1);

        let again = pool.rent(9).unwrap();
        assert_eq!(again.as_ptr(), ptr);
        assert_eq!(pool.retained(), 0);
    }

    #[test]
    fn test_retention_limit() {
        let config = PoolConfig::new(64)
            .unwrap()
            .with_max_blocks_per_class(2)
            .unwrap();
        let pool = BlockPool::<u32>::new(config);
        let blocks: Vec<_> = (0..3).map(|_| pool.rent(4).unwrap()).collect();
        for block in blocks {
            pool.give_back(block);
        }
        assert_eq!(pool.retained(), 2);
    }

    #[test]
    fn test_foreign_block_discarded() {
        let pool = BlockPool::<u32>::new(PoolConfig::default());
        pool.give_back(new_slots(3));
        assert_eq!(pool.retained(), 0);
    }
}
