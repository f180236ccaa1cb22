//! Bounded SPSC ring queue.
//!
//! - `SpscQueue<T, S>` - full producer + consumer surface
//! - `Writer<T, S>` - producer-only view, taken once per queue
//!
//! Constructors:
//! - `new()` - heap slots
//! - `pooled()` - slots rented from a `BlockPool`
//! - `mapped()` - mmap'd slots, optionally mlocked (unix)
//! - `with_storage()` / `with_items()` - any `Storage`

mod cursor;
mod queue;
mod ring;
mod sink;
mod writer;

pub use queue::{Snapshot, SpscQueue};
pub use sink::{BulkSink, Run};
pub use writer::Writer;

use crate::error::{QueueError, Result};

/// Default usable capacity
const DEFAULT_CAPACITY: usize = 64 * 1024 - 1;

/// Configuration for queue construction
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Usable capacity; the storage holds one extra slot
    pub capacity: usize,
    /// mlock mapped storage (ignored by heap and pooled storage)
    pub mlock: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            mlock: false,
        }
    }
}

impl QueueConfig {
    /// Create a new configuration with the specified usable capacity
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(QueueError::config("Queue capacity must be greater than 0"));
        }
        if capacity == usize::MAX {
            return Err(QueueError::config("Queue capacity overflows slot count"));
        }

        Ok(Self {
            capacity,
            ..Default::default()
        })
    }

    pub fn with_mlock(mut self, mlock: bool) -> Self {
        self.mlock = mlock;
        self
    }

    /// Storage length needed for this capacity
    pub fn slot_count(&self) -> usize {
        self.capacity + 1
    }
}
