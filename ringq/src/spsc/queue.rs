//! SpscQueue - the public façade over `RingCore`.
//!
//! The queue itself is the consumer. It is also the producer until
//! [`SpscQueue::writer`] moves the producer role into a [`Writer`] for
//! another thread; from then on producer calls on the queue panic.

use super::ring::RingCore;
use super::sink::BulkSink;
use super::writer::{self, Writer};
use super::QueueConfig;
use crate::error::{QueueError, Result};
use crate::insights;
use crate::pool::BlockPool;
#[cfg(unix)]
use crate::storage::MappedStorage;
use crate::storage::{HeapStorage, PooledStorage, Storage};
use std::cell::Cell;
use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::ops::Index;
use std::sync::Arc;

/// Bounded lock-free single-producer single-consumer queue.
///
/// Capacity is the storage length minus one. Items come out in the order
/// they went in.
pub struct SpscQueue<T, S: Storage<T> = HeapStorage<T>> {
    core: Arc<RingCore<T, S>>,
    owns_producer: bool,
    // `get` hands out `&T`, so sharing the queue needs `T: Sync`.
    _not_sync: PhantomData<Cell<()>>,
}

unsafe impl<T: Send + Sync, S: Storage<T> + Send> Sync for SpscQueue<T, S> {}

impl<T> SpscQueue<T, HeapStorage<T>> {
    /// Create with heap slots. Usable capacity is `slot_count - 1`.
    pub fn new(slot_count: usize) -> Result<Self> {
        if slot_count < 2 {
            return Err(QueueError::config("Slot count must be at least 2"));
        }
        Self::with_storage(HeapStorage::new(slot_count))
    }

    pub fn from_config(config: &QueueConfig) -> Result<Self> {
        Self::with_storage(HeapStorage::new(config.slot_count()))
    }
}

impl<T> SpscQueue<T, PooledStorage<T>> {
    /// Create with slots rented from `pool`. Capacity is at least
    /// `min_capacity` and may be larger.
    pub fn pooled(pool: &BlockPool<T>, min_capacity: usize) -> Result<Self> {
        Self::with_storage(PooledStorage::rent(pool, min_capacity)?)
    }
}

#[cfg(unix)]
impl<T> SpscQueue<T, MappedStorage<T>> {
    /// Create with memory-mapped slots (mlocked if `config.mlock`).
    pub fn mapped(config: &QueueConfig) -> Result<Self> {
        Self::with_storage(MappedStorage::new(config)?)
    }
}

impl<T, S: Storage<T>> SpscQueue<T, S> {
    pub fn with_storage(storage: S) -> Result<Self> {
        if storage.slots().len() < 2 {
            return Err(QueueError::config("Storage must hold at least 2 slots"));
        }
        let core = RingCore::new(storage);
        insights::record_created(core.capacity(), core.storage_kind());

        Ok(Self {
            core: Arc::new(core),
            owns_producer: true,
            _not_sync: PhantomData,
        })
    }

    /// Create over `storage`, pre-seeded with `items`.
    pub fn with_items<I>(storage: S, items: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
    {
        let queue = Self::with_storage(storage)?;
        let mut items = items.into_iter();
        let mut seeded = 0;
        for item in items.by_ref() {
            // Safety: nobody else can hold the producer role yet.
            if unsafe { queue.core.try_add(item) }.is_err() {
                let requested = seeded + 1 + items.count();
                insights::record_full(requested, queue.capacity());
                return Err(QueueError::Full {
                    requested,
                    free: queue.capacity(),
                });
            }
            seeded += 1;
        }
        Ok(queue)
    }

    /// Move the producer role into a [`Writer`]. Returns `None` after the
    /// first call.
    pub fn writer(&mut self) -> Option<Writer<T, S>> {
        if !self.owns_producer {
            return None;
        }
        self.owns_producer = false;
        Some(Writer::new(Arc::clone(&self.core)))
    }

    /// Usable capacity (storage length - 1)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// Items currently queued. May already be stale if a writer is active.
    #[inline]
    pub fn count(&self) -> usize {
        self.core.count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Release this handle. Storage is disposed once the last handle (this
    /// queue or its writer) is gone.
    pub fn dispose(self) {
        drop(self);
    }

    #[inline]
    fn producer(&self) -> &RingCore<T, S> {
        assert!(
            self.owns_producer,
            "producer side of this queue was handed to a Writer"
        );
        &self.core
    }

    // ========================================================================
    // Producer side
    // ========================================================================

    /// Add one item, handing it back if the queue is full.
    ///
    /// # Panics
    ///
    /// If the producer role was moved into a [`Writer`]; the same holds for
    /// every producer method below.
    #[inline]
    pub fn try_add(&mut self, item: T) -> std::result::Result<(), T> {
        // Safety: `producer()` checked we hold the role, `&mut self` keeps
        // it on one thread.
        unsafe { self.producer().try_add(item) }
    }

    /// Add one item or fail with [`QueueError::Full`]. The item is dropped on
    /// failure; use `try_add` to get it back.
    #[inline]
    pub fn add(&mut self, item: T) -> Result<()> {
        unsafe { self.producer().add(item) }
    }

    /// Add as many leading `items` as fit; returns how many were added.
    pub fn add_at_most(&mut self, items: &[T]) -> usize
    where
        T: Clone,
    {
        unsafe { self.producer().add_at_most(items) }
    }

    /// Add all of `items` or, on [`QueueError::Full`], none of them.
    pub fn add_slice(&mut self, items: &[T]) -> Result<()>
    where
        T: Clone,
    {
        unsafe { self.producer().add_slice(items) }
    }

    /// Spin, yielding the thread, until `item` is added. With no writer
    /// taken nothing else can make room, so only call this on a full queue
    /// from a `Writer`.
    pub fn wait_add(&mut self, item: T) {
        self.wait_add_with(item, std::thread::yield_now)
    }

    pub fn wait_add_with<Y: FnMut()>(&mut self, item: T, yield_now: Y) {
        unsafe { writer::wait_add(self.producer(), item, yield_now) }
    }

    // ========================================================================
    // Consumer side
    // ========================================================================

    /// Oldest item, without removing it.
    #[inline]
    pub fn try_peek(&mut self) -> Option<&T> {
        // Safety: the queue is the only consumer; `&mut self` keeps it on one
        // thread.
        unsafe { self.core.try_peek() }
    }

    /// Oldest item, or [`QueueError::Underflow`] when empty.
    pub fn peek(&mut self) -> Result<&T> {
        match unsafe { self.core.try_peek() } {
            Some(item) => Ok(item),
            None => Err(underflow(1, 0)),
        }
    }

    /// Clone up to `dst.len()` oldest items into `dst` without removing them.
    pub fn peek_range_at_most(&mut self, dst: &mut [T]) -> usize
    where
        T: Clone,
    {
        unsafe { self.core.peek_range_at_most(dst) }
    }

    #[inline]
    pub fn try_dequeue(&mut self) -> Option<T> {
        unsafe { self.core.try_dequeue() }
    }

    /// Remove the oldest item, or [`QueueError::Underflow`] when empty.
    pub fn dequeue(&mut self) -> Result<T> {
        unsafe { self.core.try_dequeue() }.ok_or_else(|| underflow(1, 0))
    }

    /// Move exactly `dst.len()` items into `dst`. On
    /// [`QueueError::Underflow`] nothing is removed.
    pub fn dequeue_range_exact(&mut self, dst: &mut [T]) -> Result<()> {
        unsafe { self.core.dequeue_range_exact(dst) }
    }

    /// Move up to `dst.len()` items into the front of `dst`; returns how many.
    pub fn dequeue_range_at_most(&mut self, dst: &mut [T]) -> usize {
        unsafe { self.core.dequeue_range_at_most(dst) }
    }

    /// Drain into `sink` until it is full, takes fewer items than it was
    /// offered, or nothing more is visible, yielding the thread between
    /// passes. Items added while draining are picked up too; items the sink
    /// did not take stay queued. Returns the number drained.
    pub fn drain_into<K>(&mut self, sink: &mut K) -> usize
    where
        K: BulkSink<T> + ?Sized,
    {
        self.drain_into_with(sink, std::thread::yield_now)
    }

    /// [`drain_into`](Self::drain_into) with a caller-supplied yield.
    pub fn drain_into_with<K, Y>(&mut self, sink: &mut K, yield_now: Y) -> usize
    where
        K: BulkSink<T> + ?Sized,
        Y: FnMut(),
    {
        unsafe { self.core.drain_into(sink, yield_now) }
    }

    /// Drop exactly `count` oldest items. On [`QueueError::Underflow`]
    /// nothing is removed.
    pub fn discard_head(&mut self, count: usize) -> Result<()> {
        unsafe { self.core.discard_head(count) }
    }

    /// Drop up to `count` oldest items; returns how many.
    pub fn discard_head_at_most(&mut self, count: usize) -> usize {
        unsafe { self.core.discard_head_at_most(count) }
    }

    /// Drop every visible item.
    pub fn clear(&mut self) {
        unsafe { self.core.clear() };
    }

    /// The `index`-th visible item, oldest first.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        // Safety: consumer mutations need `&mut self`, so the reference
        // cannot outlive the slot's contents.
        unsafe { self.core.get(index) }
    }

    /// Copy of the currently visible items. Later producer activity is not
    /// observed and the queue is left untouched.
    pub fn snapshot(&self) -> Snapshot<T>
    where
        T: Clone,
    {
        Snapshot {
            items: unsafe { self.core.snapshot() }.into_iter(),
        }
    }
}

fn underflow(requested: usize, available: usize) -> QueueError {
    insights::record_underflow(requested, available);
    QueueError::Underflow {
        requested,
        available,
    }
}

impl<T, S: Storage<T>> Index<usize> for SpscQueue<T, S> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(item) => item,
            None => panic!(
                "index out of bounds: the len is {} but the index is {}",
                self.count(),
                index
            ),
        }
    }
}

impl<T, S: Storage<T>> fmt::Debug for SpscQueue<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpscQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.count())
            .field("storage", &self.core.storage_kind())
            .finish()
    }
}

/// Point-in-time copy of a queue's visible items, oldest first.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    items: std::vec::IntoIter<T>,
}

impl<T> Snapshot<T> {
    pub fn as_slice(&self) -> &[T] {
        self.items.as_slice()
    }
}

impl<T> Iterator for Snapshot<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.items.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl<T> DoubleEndedIterator for Snapshot<T> {
    fn next_back(&mut self) -> Option<T> {
        self.items.next_back()
    }
}

impl<T> ExactSizeIterator for Snapshot<T> {}
impl<T> FusedIterator for Snapshot<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;
    use crate::spsc::Run;
    use std::rc::Rc;

    /// Takes at most `limit` items in total.
    struct CappedSink {
        items: Vec<u32>,
        limit: usize,
    }

    impl BulkSink<u32> for CappedSink {
        fn remaining(&self) -> usize {
            self.limit - self.items.len()
        }

        fn accept(&mut self, run: Run<'_, u32>) {
            self.items.extend(run);
        }
    }

    #[test]
    fn test_full_rejects_fourth() {
        let mut queue = SpscQueue::<char>::new(4).unwrap();
        assert_eq!(queue.capacity(), 3);
        queue.add('A').unwrap();
        queue.add('B').unwrap();
        queue.add('C').unwrap();
        assert_eq!(queue.try_add('D'), Err('D'));
        assert_eq!(queue.count(), 3);
        assert!(matches!(
            queue.add('D'),
            Err(QueueError::Full { requested: 1, .. })
        ));
    }

    #[test]
    fn test_dequeue_frees_a_slot() {
        let mut queue = SpscQueue::<char>::new(4).unwrap();
        queue.add_slice(&['A', 'B', 'C']).unwrap();
        assert_eq!(queue.dequeue().unwrap(), 'A');
        assert_eq!(queue.count(), 2);
        assert!(queue.try_add('D').is_ok());
        assert_eq!(queue.dequeue().unwrap(), 'B');
        assert_eq!(queue.dequeue().unwrap(), 'C');
        assert_eq!(queue.dequeue().unwrap(), 'D');
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn test_add_at_most_clamps() {
        let mut queue = SpscQueue::<u32>::new(4).unwrap();
        assert_eq!(queue.add_at_most(&[1, 2, 3, 4, 5]), 3);
        assert_eq!(queue.count(), 3);
        assert_eq!(queue.add_at_most(&[6]), 0);
    }

    #[test]
    fn test_dequeue_range_exact_underflow() {
        let mut queue = SpscQueue::<u32>::new(4).unwrap();
        queue.add_slice(&[1, 2, 3]).unwrap();
        let mut out = [0u32; 4];
        let err = queue.dequeue_range_exact(&mut out).unwrap_err();
        assert!(matches!(
            err,
            QueueError::Underflow {
                requested: 4,
                available: 3
            }
        ));
        assert_eq!(queue.count(), 3);
        assert_eq!(out, [0; 4]);
    }

    #[test]
    fn test_clear_empties() {
        let mut queue = SpscQueue::<u32>::new(4).unwrap();
        queue.add_slice(&[1, 2]).unwrap();
        queue.clear();
        assert_eq!(queue.count(), 0);
        assert!(queue.try_peek().is_none());
        assert!(queue.peek().is_err());
    }

    #[test]
    fn test_discard_head_at_most() {
        let mut queue = SpscQueue::<u32>::new(4).unwrap();
        queue.add_slice(&[1, 2, 3]).unwrap();
        assert_eq!(queue.discard_head_at_most(2), 2);
        assert_eq!(queue.count(), 1);
        assert_eq!(*queue.peek().unwrap(), 3);
        assert_eq!(queue.discard_head_at_most(5), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_discard_head_exact() {
        let mut queue = SpscQueue::<u32>::new(8).unwrap();
        queue.add_slice(&[1, 2, 3]).unwrap();
        assert!(queue.discard_head(4).is_err());
        assert_eq!(queue.count(), 3);
        queue.discard_head(2).unwrap();
        assert_eq!(queue.dequeue().unwrap(), 3);
    }

    #[test]
    fn test_add_slice_all_or_nothing() {
        let mut queue = SpscQueue::<u32>::new(4).unwrap();
        queue.add(1).unwrap();
        let err = queue.add_slice(&[2, 3, 4]).unwrap_err();
        assert!(matches!(
            err,
            QueueError::Full {
                requested: 3,
                free: 2
            }
        ));
        assert_eq!(queue.count(), 1);
        queue.add_slice(&[2, 3]).unwrap();
        assert_eq!(queue.count(), 3);
    }

    #[test]
    fn test_wraparound_roundtrip() {
        let mut queue = SpscQueue::<u64>::new(8).unwrap();
        let mut next_in = 0u64;
        let mut next_out = 0u64;
        let mut out = [0u64; 5];

        for round in 0..200 {
            let batch: Vec<u64> = (next_in..next_in + 6).collect();
            next_in += queue.add_at_most(&batch) as u64;

            let want = 1 + round % 5;
            let n = queue.dequeue_range_at_most(&mut out[..want]);
            for v in &out[..n] {
                assert_eq!(*v, next_out);
                next_out += 1;
            }
            assert!(queue.count() <= queue.capacity());
        }
        while let Some(v) = queue.try_dequeue() {
            assert_eq!(v, next_out);
            next_out += 1;
        }
        assert_eq!(next_in, next_out);
        assert!(next_in > 8 * 10);
    }

    #[test]
    fn test_peek_range_across_boundary() {
        let mut queue = SpscQueue::<u32>::new(4).unwrap();
        queue.add_slice(&[1, 2]).unwrap();
        queue.discard_head(2).unwrap();
        queue.add_slice(&[3, 4, 5]).unwrap();

        let mut out = [0u32; 5];
        assert_eq!(queue.peek_range_at_most(&mut out), 3);
        assert_eq!(&out[..3], &[3, 4, 5]);
        assert_eq!(queue.count(), 3);
    }

    #[test]
    fn test_get_and_index() {
        let mut queue = SpscQueue::<u32>::new(4).unwrap();
        queue.add_slice(&[7, 8]).unwrap();
        queue.dequeue().unwrap();
        queue.add_slice(&[9, 10]).unwrap();

        assert_eq!(queue.get(0), Some(&8));
        assert_eq!(queue[1], 9);
        assert_eq!(queue[2], 10);
        assert_eq!(queue.get(3), None);
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn test_index_out_of_bounds() {
        let queue = SpscQueue::<u32>::new(4).unwrap();
        let _ = queue[0];
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let mut queue = SpscQueue::<u32>::new(8).unwrap();
        queue.add_slice(&[1, 2, 3]).unwrap();
        let snapshot = queue.snapshot();
        queue.add(4).unwrap();
        queue.dequeue().unwrap();

        assert_eq!(snapshot.as_slice(), &[1, 2, 3]);
        assert_eq!(snapshot.rev().collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!(queue.count(), 3);
    }

    #[test]
    fn test_drain_into_vec() {
        let mut queue = SpscQueue::<u32>::new(4).unwrap();
        queue.add_slice(&[1, 2]).unwrap();
        queue.discard_head(2).unwrap();
        queue.add_slice(&[3, 4, 5]).unwrap();

        let mut sink = Vec::new();
        let mut yields = 0;
        assert_eq!(queue.drain_into_with(&mut sink, || yields += 1), 3);
        assert_eq!(sink, vec![3, 4, 5]);
        assert_eq!(yields, 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_into_capped_sink() {
        let mut queue = SpscQueue::<u32>::new(8).unwrap();
        queue.add_slice(&[1, 2, 3, 4, 5]).unwrap();

        let mut sink = CappedSink {
            items: Vec::new(),
            limit: 3,
        };
        assert_eq!(queue.drain_into(&mut sink), 3);
        assert_eq!(sink.items, vec![1, 2, 3]);
        assert_eq!(queue.count(), 2);
        assert_eq!(queue.drain_into(&mut sink), 0);
    }

    #[test]
    fn test_drain_picks_up_items_added_between_passes() {
        let mut queue = SpscQueue::<u32>::new(4).unwrap();
        let mut writer = queue.writer().unwrap();
        writer.add_slice(&[1, 2, 3]).unwrap();

        let mut pending = vec![6, 5, 4];
        let mut sink = Vec::new();
        let drained = queue.drain_into_with(&mut sink, || {
            if let Some(v) = pending.pop() {
                writer.add(v).unwrap();
            }
        });
        assert_eq!(drained, 6);
        assert_eq!(sink, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_writer_taken_once() {
        let mut queue = SpscQueue::<u32>::new(4).unwrap();
        let mut writer = queue.writer().unwrap();
        assert!(queue.writer().is_none());

        writer.add(1).unwrap();
        assert_eq!(writer.add_at_most(&[2, 3, 4]), 2);
        assert!(writer.try_add(5).is_err());
        assert_eq!(queue.dequeue().unwrap(), 1);
    }

    #[test]
    #[should_panic(expected = "handed to a Writer")]
    fn test_producer_call_after_writer_taken() {
        let mut queue = SpscQueue::<u32>::new(4).unwrap();
        let _writer = queue.writer();
        let _ = queue.try_add(1);
    }

    #[test]
    fn test_with_items() {
        let storage = HeapStorage::new(4);
        let mut queue = SpscQueue::with_items(storage, vec![1u32, 2]).unwrap();
        assert_eq!(queue.count(), 2);
        assert_eq!(queue.dequeue().unwrap(), 1);

        let err = SpscQueue::with_items(HeapStorage::new(4), 0u32..5).unwrap_err();
        assert!(matches!(
            err,
            QueueError::Full {
                requested: 5,
                free: 3
            }
        ));
    }

    #[test]
    fn test_with_items_counts_whole_request() {
        let err = SpscQueue::with_items(HeapStorage::new(4), (0u32..10).filter(|_| true))
            .unwrap_err();
        assert!(matches!(
            err,
            QueueError::Full {
                requested: 10,
                free: 3
            }
        ));
    }

    #[test]
    fn test_invalid_storage() {
        assert!(SpscQueue::<u32>::new(1).is_err());
        assert!(SpscQueue::<u32>::with_storage(HeapStorage::new(0)).is_err());
    }

    #[test]
    fn test_pooled_block_reused_after_dispose() {
        let pool = BlockPool::<u32>::new(PoolConfig::default());
        let mut queue = SpscQueue::pooled(&pool, 5).unwrap();
        assert_eq!(queue.capacity(), 7);
        queue.add_slice(&[1, 2, 3]).unwrap();
        queue.dispose();
        assert_eq!(pool.retained(), 1);

        let again = SpscQueue::pooled(&pool, 7).unwrap();
        assert_eq!(pool.retained(), 0);
        assert!(again.is_empty());
    }

    #[test]
    fn test_storage_outlives_queue_while_writer_alive() {
        let pool = BlockPool::<u32>::new(PoolConfig::default());
        let mut queue = SpscQueue::pooled(&pool, 3).unwrap();
        let writer = queue.writer().unwrap();
        queue.dispose();
        assert_eq!(pool.retained(), 0);
        drop(writer);
        assert_eq!(pool.retained(), 1);
    }

    #[test]
    fn test_items_dropped_exactly_once() {
        let value = Rc::new(());
        let mut queue = SpscQueue::<Rc<()>>::new(8).unwrap();
        for _ in 0..6 {
            queue.add(value.clone()).unwrap();
        }
        assert_eq!(Rc::strong_count(&value), 7);

        drop(queue.dequeue().unwrap());
        queue.discard_head(2).unwrap();
        let mut out = vec![Rc::new(()); 1];
        queue.dequeue_range_exact(&mut out).unwrap();
        assert_eq!(Rc::strong_count(&value), 4);

        drop(queue);
        assert_eq!(Rc::strong_count(&value), 2);
        drop(out);
        assert_eq!(Rc::strong_count(&value), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_mapped_queue() {
        let config = QueueConfig::new(15).unwrap();
        let mut queue = SpscQueue::<u64, MappedStorage<u64>>::mapped(&config).unwrap();
        assert_eq!(queue.capacity(), 15);
        for i in 0..100 {
            queue.add(i).unwrap();
            assert_eq!(queue.dequeue().unwrap(), i);
        }
    }

    #[test]
    fn test_debug_output() {
        let mut queue = SpscQueue::<u32>::new(4).unwrap();
        queue.add_slice(&[1, 2]).unwrap();
        let debug_output = format!("{:?}", queue);
        assert!(debug_output.contains("capacity: 3"));
        assert!(debug_output.contains("len: 2"));
        assert!(debug_output.contains("heap"));
    }
}
