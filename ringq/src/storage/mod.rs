//! Storage providers - where the ring's slots live.
//!
//! - `HeapStorage<T>` - boxed slice sized by the caller
//! - `PooledStorage<T>` - block rented from a [`BlockPool`](crate::BlockPool)
//! - `MappedStorage<T>` - anonymous mmap, optionally mlocked (unix)
//!
//! A storage holds raw slots only. Live values are owned by the queue, which
//! drops or moves them out before the storage is disposed.

mod heap;
#[cfg(unix)]
mod mapped;
mod pooled;

pub use heap::HeapStorage;
#[cfg(unix)]
pub use mapped::MappedStorage;
pub use pooled::PooledStorage;

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;

/// One ring slot. Initialized only while it holds a queued item.
pub type Slot<T> = UnsafeCell<MaybeUninit<T>>;

/// A fixed-length run of slots backing a queue.
///
/// # Safety
///
/// - `slots()` must return the same memory with the same length on every
///   call until `dispose()` runs; the queue keeps writing and reading through
///   it from two threads.
/// - `slots()` may be called concurrently from the producer and consumer
///   threads, even when the type is not `Sync`.
/// - `dispose()` must be idempotent. It must not drop slot contents.
pub unsafe trait Storage<T> {
    /// Contiguous slots; the queue's usable capacity is `len - 1`.
    fn slots(&self) -> &[Slot<T>];

    /// Release owned resources. Later calls are no-ops.
    fn dispose(&mut self);

    /// Short name for diagnostics.
    fn kind(&self) -> &'static str {
        "custom"
    }
}

pub(crate) fn new_slots<T>(len: usize) -> Box<[Slot<T>]> {
    (0..len)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice()
}
