//! Drain-to-sink contract.
//!
//! `SpscQueue::drain_into` offers the sink contiguous runs of queued items.
//! A run moves items out of the ring only as the sink pulls them; the count
//! pulled is what the sink took. Items left in the run stay queued.

use crate::storage::Slot;
use std::iter::FusedIterator;
use std::marker::PhantomData;

/// An acceptor of bulk-drained items.
pub trait BulkSink<T> {
    /// How many more items this sink will take. Zero stops a drain.
    fn remaining(&self) -> usize;

    /// Take as many items of `run` as fit, by pulling them from it. Never
    /// offered more than `remaining()`. Taking fewer than offered ends the
    /// drain.
    fn accept(&mut self, run: Run<'_, T>);
}

/// Unbounded: drains everything visible.
impl<T> BulkSink<T> for Vec<T> {
    fn remaining(&self) -> usize {
        usize::MAX - self.len()
    }

    fn accept(&mut self, run: Run<'_, T>) {
        self.extend(run);
    }
}

/// A contiguous run of queued items, moved out on iteration.
pub struct Run<'a, T> {
    slots: &'a [Slot<T>],
    taken: &'a mut usize,
    _marker: PhantomData<T>,
}

impl<'a, T> Run<'a, T> {
    /// Every slot in `slots` must hold an initialized value that the run may
    /// take ownership of. `taken` counts the items moved out so far.
    pub(crate) unsafe fn new(slots: &'a [Slot<T>], taken: &'a mut usize) -> Self {
        debug_assert_eq!(*taken, 0);
        Self {
            slots,
            taken,
            _marker: PhantomData,
        }
    }
}

impl<T> Iterator for Run<'_, T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        let slot = self.slots.get(*self.taken)?;
        *self.taken += 1;
        Some(unsafe { (*slot.get()).assume_init_read() })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.slots.len() - *self.taken;
        (left, Some(left))
    }
}

impl<T> ExactSizeIterator for Run<'_, T> {}
impl<T> FusedIterator for Run<'_, T> {}
