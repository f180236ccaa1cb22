use super::{Slot, Storage};
use crate::error::Result;
use crate::pool::BlockPool;

/// Slots rented from a [`BlockPool`]; returned to the pool on dispose.
///
/// The rented block can be longer than requested, so the queue capacity
/// (`len - 1`) may exceed the minimum asked for.
pub struct PooledStorage<T> {
    block: Option<Box<[Slot<T>]>>,
    pool: BlockPool<T>,
}

impl<T> PooledStorage<T> {
    /// Rent storage for at least `min_capacity` queued items.
    pub fn rent(pool: &BlockPool<T>, min_capacity: usize) -> Result<Self> {
        let block = pool.rent(min_capacity.saturating_add(1))?;
        Ok(Self {
            block: Some(block),
            pool: pool.clone(),
        })
    }
}

unsafe impl<T> Storage<T> for PooledStorage<T> {
    #[inline]
    fn slots(&self) -> &[Slot<T>] {
        self.block.as_deref().unwrap_or(&[])
    }

    fn dispose(&mut self) {
        if let Some(block) = self.block.take() {
            self.pool.give_back(block);
        }
    }

    fn kind(&self) -> &'static str {
        "pooled"
    }
}

impl<T> Drop for PooledStorage<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;

    #[test]
    fn test_pooled_capacity_rounds_up() {
        let pool = BlockPool::<u64>::new(PoolConfig::default());
        let storage = PooledStorage::rent(&pool, 5).unwrap();
        // 6 slots requested, 8 rented
        assert_eq!(storage.slots().len(), 8);
    }

    #[test]
    fn test_pooled_dispose_returns_block_once() {
        let pool = BlockPool::<u64>::new(PoolConfig::default());
        let mut storage = PooledStorage::rent(&pool, 7).unwrap();
        storage.dispose();
        assert_eq!(pool.retained(), 1);
        storage.dispose();
        drop(storage);
        assert_eq!(pool.retained(), 1);
    }

    #[test]
    fn test_pooled_drop_returns_block() {
        let pool = BlockPool::<u64>::new(PoolConfig::default());
        drop(PooledStorage::rent(&pool, 7).unwrap());
        assert_eq!(pool.retained(), 1);
    }
}
