//! Writer - producer-only view of an `SpscQueue`.

use super::ring::RingCore;
use crate::error::Result;
use crate::storage::{HeapStorage, Storage};
use std::fmt;
use std::sync::Arc;

/// The producer side of an [`SpscQueue`](super::SpscQueue), handed out once
/// per queue by [`SpscQueue::writer`](super::SpscQueue::writer).
///
/// Only producer operations exist on this type, so the thread that owns it
/// cannot reach the consumer side by mistake.
pub struct Writer<T, S: Storage<T> = HeapStorage<T>> {
    core: Arc<RingCore<T, S>>,
}

impl<T, S: Storage<T>> Writer<T, S> {
    pub(crate) fn new(core: Arc<RingCore<T, S>>) -> Self {
        Self { core }
    }

    /// Usable capacity (storage length - 1)
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// Add one item, handing it back if the queue is full.
    #[inline]
    pub fn try_add(&mut self, item: T) -> std::result::Result<(), T> {
        // Safety: a Writer is the only producer of its queue.
        unsafe { self.core.try_add(item) }
    }

    /// Add one item or fail with [`QueueError::Full`](crate::QueueError::Full).
    /// The item is dropped on failure; use `try_add` to get it back.
    #[inline]
    pub fn add(&mut self, item: T) -> Result<()> {
        unsafe { self.core.add(item) }
    }

    /// Add as many leading `items` as fit. Returns how many were added.
    pub fn add_at_most(&mut self, items: &[T]) -> usize
    where
        T: Clone,
    {
        unsafe { self.core.add_at_most(items) }
    }

    /// Add all of `items` or none of them.
    pub fn add_slice(&mut self, items: &[T]) -> Result<()>
    where
        T: Clone,
    {
        unsafe { self.core.add_slice(items) }
    }

    /// Spin, yielding the thread, until `item` is added.
    pub fn wait_add(&mut self, item: T) {
        self.wait_add_with(item, std::thread::yield_now)
    }

    /// Spin until `item` is added, calling `yield_now` between attempts.
    pub fn wait_add_with<Y: FnMut()>(&mut self, item: T, yield_now: Y) {
        unsafe { wait_add(&*self.core, item, yield_now) }
    }
}

/// # Safety
///
/// Caller holds the producer role.
pub(crate) unsafe fn wait_add<T, S, Y>(core: &RingCore<T, S>, mut item: T, mut yield_now: Y)
where
    S: Storage<T>,
    Y: FnMut(),
{
    loop {
        match core.try_add(item) {
            Ok(()) => return,
            Err(back) => {
                item = back;
                yield_now();
            }
        }
    }
}

impl<T, S: Storage<T>> fmt::Debug for Writer<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("capacity", &self.capacity())
            .field("len", &self.core.count())
            .finish()
    }
}
