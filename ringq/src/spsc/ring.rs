//! RingCore - the SPSC ring algorithm over a storage and two padded cursors.
//!
//! Methods are split by role. Producer methods may only be called from the
//! single producer, consumer methods only from the single consumer; the
//! `SpscQueue` and `Writer` handles enforce this, which is why the methods
//! here are `unsafe`.
//!
//! Ordering: a side publishes its own cursor with `Release` after touching
//! the slots, and observes the other side's cursor with `Acquire` before
//! touching them. Side-private fields use `Relaxed`.

use super::cursor::{self, CursorState};
use super::sink::{BulkSink, Run};
use crate::bulk;
use crate::error::{QueueError, Result};
use crate::insights;
use crate::storage::{Slot, Storage};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) struct RingCore<T, S: Storage<T>> {
    cursors: CursorState,
    storage: S,
    disposed: AtomicBool,
    _marker: PhantomData<T>,
}

// Safety: the producer and consumer never touch the same slot concurrently;
// slot ownership is handed over through the release/acquire cursor pairs.
unsafe impl<T: Send, S: Storage<T> + Send> Send for RingCore<T, S> {}
unsafe impl<T: Send, S: Storage<T> + Send> Sync for RingCore<T, S> {}

impl<T, S: Storage<T>> RingCore<T, S> {
    /// Caller guarantees `storage.slots().len() >= 2`.
    pub(crate) fn new(storage: S) -> Self {
        debug_assert!(storage.slots().len() >= 2);
        Self {
            cursors: CursorState::new(),
            storage,
            disposed: AtomicBool::new(false),
            _marker: PhantomData,
        }
    }

    #[inline(always)]
    fn slots(&self) -> &[Slot<T>] {
        self.storage.slots()
    }

    /// Storage length `L`.
    #[inline(always)]
    fn slot_count(&self) -> usize {
        self.slots().len()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slot_count() - 1
    }

    pub(crate) fn storage_kind(&self) -> &'static str {
        self.storage.kind()
    }

    /// Items currently queued, as seen from either side.
    #[inline]
    pub(crate) fn count(&self) -> usize {
        let read = self.cursors.consumer.read.load(Ordering::Acquire);
        let write = self.cursors.producer.write.load(Ordering::Acquire);
        cursor::readable_items(read, write).min(self.capacity())
    }

    // ========================================================================
    // Producer side
    // ========================================================================

    /// Free slots, refreshing the cached read cursor only if the cached view
    /// shows fewer than `wanted`.
    #[inline]
    unsafe fn writable(&self, wanted: usize) -> usize {
        let p = &self.cursors.producer;
        let write = p.write.load(Ordering::Relaxed);
        let free = cursor::writable_items(p.cached_read.load(Ordering::Relaxed), write, self.slot_count());
        if free >= wanted {
            return free;
        }
        let read = self.cursors.consumer.read.load(Ordering::Acquire);
        p.cached_read.store(read, Ordering::Relaxed);
        cursor::writable_items(read, write, self.slot_count())
    }

    /// Cache-then-confirm fullness check for `n` items.
    #[inline]
    unsafe fn has_room(&self, n: usize) -> bool {
        let p = &self.cursors.producer;
        let write = p.write.load(Ordering::Relaxed);
        if !cursor::is_full(p.cached_read.load(Ordering::Relaxed), write, self.slot_count(), n) {
            return true;
        }
        let read = self.cursors.consumer.read.load(Ordering::Acquire);
        p.cached_read.store(read, Ordering::Relaxed);
        !cursor::is_full(read, write, self.slot_count(), n)
    }

    /// Advance and publish the write cursor.
    #[inline(always)]
    unsafe fn publish_write(&self, n: usize) {
        if n == 0 {
            return;
        }
        let p = &self.cursors.producer;
        let (next, lower_bound) = cursor::advance(
            p.write.load(Ordering::Relaxed),
            p.lower_bound.load(Ordering::Relaxed),
            self.slot_count(),
            n,
        );
        p.lower_bound.store(lower_bound, Ordering::Relaxed);
        p.write.store(next, Ordering::Release);
    }

    #[inline(always)]
    unsafe fn write_position(&self) -> usize {
        let p = &self.cursors.producer;
        cursor::position(p.write.load(Ordering::Relaxed), p.lower_bound.load(Ordering::Relaxed))
    }

    /// # Safety
    ///
    /// Caller holds the producer role.
    #[inline]
    pub(crate) unsafe fn try_add(&self, item: T) -> std::result::Result<(), T> {
        if !self.has_room(1) {
            return Err(item);
        }
        let pos = self.write_position();
        debug_assert!(pos < self.slot_count(), "try_add: pos {} out of range", pos);
        (*self.slots().get_unchecked(pos).get()).write(item);
        self.publish_write(1);
        Ok(())
    }

    /// # Safety
    ///
    /// Caller holds the producer role.
    #[inline]
    pub(crate) unsafe fn add(&self, item: T) -> Result<()> {
        self.try_add(item).map_err(|_| {
            insights::record_full(1, 0);
            QueueError::Full {
                requested: 1,
                free: 0,
            }
        })
    }

    /// # Safety
    ///
    /// Caller holds the producer role.
    pub(crate) unsafe fn add_at_most(&self, items: &[T]) -> usize
    where
        T: Clone,
    {
        let n = items.len().min(self.writable(items.len()));
        if n > 0 {
            self.write_run(&items[..n]);
        }
        n
    }

    /// # Safety
    ///
    /// Caller holds the producer role.
    pub(crate) unsafe fn add_slice(&self, items: &[T]) -> Result<()>
    where
        T: Clone,
    {
        if items.is_empty() {
            return Ok(());
        }
        if !self.has_room(items.len()) {
            let free = self.writable(items.len());
            insights::record_full(items.len(), free);
            return Err(QueueError::Full {
                requested: items.len(),
                free,
            });
        }
        self.write_run(items);
        Ok(())
    }

    /// Copy `items` in as one or two contiguous runs and publish them.
    /// Room for all of them has been checked. If a clone panics, the items
    /// already written are published.
    unsafe fn write_run(&self, items: &[T])
    where
        T: Clone,
    {
        let slots = self.slots();
        let pos = self.write_position();
        let (first, second) = cursor::split(pos, items.len(), slots.len());

        let mut guard = WriteGuard::new(self);
        bulk::write_cloned(&slots[pos..pos + first], &items[..first], &mut guard.produced);
        if second > 0 {
            bulk::write_cloned(&slots[..second], &items[first..], &mut guard.produced);
        }
    }

    // ========================================================================
    // Consumer side
    // ========================================================================

    /// Readable items, refreshing the cached write cursor only if the cached
    /// view shows fewer than `wanted`.
    #[inline]
    unsafe fn readable(&self, wanted: usize) -> usize {
        let c = &self.cursors.consumer;
        let read = c.read.load(Ordering::Relaxed);
        let available = cursor::readable_items(read, c.cached_write.load(Ordering::Relaxed));
        if available >= wanted {
            return available;
        }
        self.refresh_readable()
    }

    /// Always re-read the producer cursor.
    #[inline]
    unsafe fn refresh_readable(&self) -> usize {
        let c = &self.cursors.consumer;
        let write = self.cursors.producer.write.load(Ordering::Acquire);
        c.cached_write.store(write, Ordering::Relaxed);
        cursor::readable_items(c.read.load(Ordering::Relaxed), write)
    }

    /// Cache-then-confirm emptiness check for `n` items.
    #[inline]
    unsafe fn has_items(&self, n: usize) -> bool {
        let c = &self.cursors.consumer;
        let read = c.read.load(Ordering::Relaxed);
        if !cursor::is_empty(read, c.cached_write.load(Ordering::Relaxed), n) {
            return true;
        }
        let write = self.cursors.producer.write.load(Ordering::Acquire);
        c.cached_write.store(write, Ordering::Relaxed);
        !cursor::is_empty(read, write, n)
    }

    /// Advance and publish the read cursor.
    #[inline(always)]
    unsafe fn publish_read(&self, n: usize) {
        if n == 0 {
            return;
        }
        let c = &self.cursors.consumer;
        let (next, lower_bound) = cursor::advance(
            c.read.load(Ordering::Relaxed),
            c.lower_bound.load(Ordering::Relaxed),
            self.slot_count(),
            n,
        );
        c.lower_bound.store(lower_bound, Ordering::Relaxed);
        c.read.store(next, Ordering::Release);
    }

    #[inline(always)]
    fn read_position(&self) -> usize {
        let c = &self.cursors.consumer;
        cursor::position(c.read.load(Ordering::Relaxed), c.lower_bound.load(Ordering::Relaxed))
    }

    /// # Safety
    ///
    /// Caller holds the consumer role.
    #[inline]
    pub(crate) unsafe fn try_peek(&self) -> Option<&T> {
        if !self.has_items(1) {
            return None;
        }
        let slot = self.slots().get_unchecked(self.read_position());
        Some((*slot.get()).assume_init_ref())
    }

    /// # Safety
    ///
    /// Caller holds the consumer role.
    #[inline]
    pub(crate) unsafe fn try_dequeue(&self) -> Option<T> {
        if !self.has_items(1) {
            return None;
        }
        let slot = self.slots().get_unchecked(self.read_position());
        let item = (*slot.get()).assume_init_read();
        self.publish_read(1);
        Some(item)
    }

    /// # Safety
    ///
    /// Caller holds the consumer role.
    pub(crate) unsafe fn peek_range_at_most(&self, dst: &mut [T]) -> usize
    where
        T: Clone,
    {
        let n = dst.len().min(self.readable(dst.len()));
        if n == 0 {
            return 0;
        }
        let slots = self.slots();
        let pos = self.read_position();
        let (first, second) = cursor::split(pos, n, slots.len());

        bulk::clone_out(&slots[pos..pos + first], &mut dst[..first]);
        if second > 0 {
            bulk::clone_out(&slots[..second], &mut dst[first..n]);
        }
        n
    }

    /// # Safety
    ///
    /// Caller holds the consumer role.
    pub(crate) unsafe fn dequeue_range_at_most(&self, dst: &mut [T]) -> usize {
        let n = dst.len().min(self.readable(dst.len()));
        self.move_run(&mut dst[..n]);
        n
    }

    /// # Safety
    ///
    /// Caller holds the consumer role.
    pub(crate) unsafe fn dequeue_range_exact(&self, dst: &mut [T]) -> Result<()> {
        if !self.has_items(dst.len()) {
            let available = self.readable(dst.len());
            insights::record_underflow(dst.len(), available);
            return Err(QueueError::Underflow {
                requested: dst.len(),
                available,
            });
        }
        self.move_run(dst);
        Ok(())
    }

    /// Move `dst.len()` readable items out, as one or two runs.
    unsafe fn move_run(&self, dst: &mut [T]) {
        if dst.is_empty() {
            return;
        }
        let slots = self.slots();
        let pos = self.read_position();
        let (first, second) = cursor::split(pos, dst.len(), slots.len());

        let mut guard = ReadGuard::new(self);
        bulk::move_out(&slots[pos..pos + first], &mut dst[..first], &mut guard.consumed);
        if second > 0 {
            bulk::move_out(&slots[..second], &mut dst[first..], &mut guard.consumed);
        }
    }

    /// # Safety
    ///
    /// Caller holds the consumer role.
    pub(crate) unsafe fn discard_head_at_most(&self, count: usize) -> usize {
        let n = count.min(self.readable(count));
        self.drop_head(n);
        n
    }

    /// # Safety
    ///
    /// Caller holds the consumer role.
    pub(crate) unsafe fn discard_head(&self, count: usize) -> Result<()> {
        if !self.has_items(count) {
            let available = self.readable(count);
            insights::record_underflow(count, available);
            return Err(QueueError::Underflow {
                requested: count,
                available,
            });
        }
        self.drop_head(count);
        Ok(())
    }

    /// # Safety
    ///
    /// Caller holds the consumer role.
    pub(crate) unsafe fn clear(&self) -> usize {
        let n = self.refresh_readable();
        self.drop_head(n);
        n
    }

    unsafe fn drop_head(&self, n: usize) {
        if n == 0 {
            return;
        }
        let slots = self.slots();
        let pos = self.read_position();
        let (first, second) = cursor::split(pos, n, slots.len());

        let mut guard = ReadGuard::new(self);
        bulk::drop_run(&slots[pos..pos + first], &mut guard.consumed);
        if second > 0 {
            bulk::drop_run(&slots[..second], &mut guard.consumed);
        }
    }

    /// Offer visible items to `sink` until it is full, takes less than it
    /// was offered, or nothing more is visible, yielding between passes.
    /// Items the sink leaves stay queued.
    ///
    /// # Safety
    ///
    /// Caller holds the consumer role.
    pub(crate) unsafe fn drain_into<K, Y>(&self, sink: &mut K, mut yield_now: Y) -> usize
    where
        K: BulkSink<T> + ?Sized,
        Y: FnMut(),
    {
        let mut total = 0;
        loop {
            let room = sink.remaining();
            if room == 0 {
                break;
            }
            let n = self.refresh_readable().min(room);
            if n == 0 {
                break;
            }

            let slots = self.slots();
            let pos = self.read_position();
            let (first, second) = cursor::split(pos, n, slots.len());

            let taken = self.offer(sink, &slots[pos..pos + first]);
            total += taken;
            if taken < first {
                break;
            }
            if second > 0 {
                let taken = self.offer(sink, &slots[..second]);
                total += taken;
                if taken < second {
                    break;
                }
            }

            yield_now();
        }
        total
    }

    /// Offer one contiguous run; publishes exactly what the sink pulled,
    /// also on unwind.
    unsafe fn offer<K>(&self, sink: &mut K, run: &[Slot<T>]) -> usize
    where
        K: BulkSink<T> + ?Sized,
    {
        let mut guard = ReadGuard::new(self);
        sink.accept(Run::new(run, &mut guard.consumed));
        guard.consumed
    }

    // ========================================================================
    // Shared reads (consumer-owned handle, `&self`)
    // ========================================================================

    /// Read cursor position and number of visible items. Does not touch the
    /// cursor caches.
    #[inline]
    fn visible(&self) -> (usize, usize) {
        let c = &self.cursors.consumer;
        let read = c.read.load(Ordering::Relaxed);
        let write = self.cursors.producer.write.load(Ordering::Acquire);
        (self.read_position(), cursor::readable_items(read, write))
    }

    /// # Safety
    ///
    /// Caller holds the consumer role; the returned reference must not
    /// outlive the next consumer-side mutation.
    pub(crate) unsafe fn get(&self, index: usize) -> Option<&T> {
        let (pos, available) = self.visible();
        if index >= available {
            return None;
        }
        let mut at = pos + index;
        if at >= self.slot_count() {
            at -= self.slot_count();
        }
        Some((*self.slots().get_unchecked(at).get()).assume_init_ref())
    }

    /// Clone every visible item, oldest first.
    ///
    /// # Safety
    ///
    /// Caller holds the consumer role.
    pub(crate) unsafe fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        let (pos, n) = self.visible();
        let slots = self.slots();
        let (first, second) = cursor::split(pos, n, slots.len());

        let mut out = Vec::with_capacity(n);
        for slot in slots[pos..pos + first].iter().chain(&slots[..second]) {
            out.push((*slot.get()).assume_init_ref().clone());
        }
        out
    }

    /// Drop queued items and dispose the storage, once.
    fn release(&mut self) {
        if self
            .disposed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        // Exclusive access: no handle is left, so every published item is ours.
        let read = self.cursors.consumer.read.load(Ordering::Acquire);
        let write = self.cursors.producer.write.load(Ordering::Acquire);
        let n = cursor::readable_items(read, write);
        unsafe { self.drop_head(n) };

        self.storage.dispose();
        insights::record_disposed(n);
    }
}

impl<T, S: Storage<T>> Drop for RingCore<T, S> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Publishes `produced` write slots when dropped, including on unwind.
struct WriteGuard<'a, T, S: Storage<T>> {
    core: &'a RingCore<T, S>,
    produced: usize,
}

impl<'a, T, S: Storage<T>> WriteGuard<'a, T, S> {
    fn new(core: &'a RingCore<T, S>) -> Self {
        Self { core, produced: 0 }
    }
}

impl<T, S: Storage<T>> Drop for WriteGuard<'_, T, S> {
    fn drop(&mut self) {
        unsafe { self.core.publish_write(self.produced) };
    }
}

/// Publishes `consumed` read slots when dropped, including on unwind.
struct ReadGuard<'a, T, S: Storage<T>> {
    core: &'a RingCore<T, S>,
    consumed: usize,
}

impl<'a, T, S: Storage<T>> ReadGuard<'a, T, S> {
    fn new(core: &'a RingCore<T, S>) -> Self {
        Self { core, consumed: 0 }
    }
}

impl<T, S: Storage<T>> Drop for ReadGuard<'_, T, S> {
    fn drop(&mut self) {
        unsafe { self.core.publish_read(self.consumed) };
    }
}
